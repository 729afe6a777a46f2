use criterion::{black_box, criterion_group, criterion_main, Criterion};
use logclump::cluster::{Agglomerative, Clustering, Kmeans};
use logclump::{estimate_threshold, pairwise_distance, Normalizer, TfidfVectorizer, Vectorizer};
use rand::prelude::*;

const TEMPLATES: [&str; 5] = [
    "NullReferenceException at 0x{h} in worker {n}",
    "Timeout after {n} seconds waiting for socket",
    "Assert.Equal() Failure: expected {n} but was {n}",
    "Access violation reading PID {n} [0x{h}]",
    "Thread: {n} [0x{h}] deadlocked at 10:{n}:00",
];

fn synthetic_messages(n: usize, rng: &mut StdRng) -> Vec<String> {
    (0..n)
        .map(|_| {
            let t = TEMPLATES[rng.random_range(0..TEMPLATES.len())];
            t.replace("{h}", &format!("{:x}", rng.random::<u32>()))
                .replace("{n}", &rng.random_range(10..60).to_string())
        })
        .collect()
}

fn bench_pipeline_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    let mut rng = StdRng::seed_from_u64(42);
    let raw = synthetic_messages(500, &mut rng);
    let normalizer = Normalizer::new();
    let normalized: Vec<String> = raw.iter().map(|m| normalizer.normalize(m)).collect();
    let vectors = TfidfVectorizer::new().vectorize(&normalized).unwrap();
    let matrix = pairwise_distance(&vectors).unwrap();

    group.bench_function("normalize_n500", |b| {
        b.iter(|| {
            for m in &raw {
                black_box(normalizer.normalize(black_box(m)));
            }
        })
    });
    group.bench_function("tfidf_n500", |b| {
        b.iter(|| TfidfVectorizer::new().vectorize(black_box(&normalized)).unwrap())
    });
    group.bench_function("pairwise_distance_n500", |b| {
        b.iter(|| pairwise_distance(black_box(&vectors)).unwrap())
    });
    group.bench_function("estimate_threshold_n500", |b| {
        b.iter(|| estimate_threshold(black_box(&matrix)).unwrap())
    });
    group.bench_function("agglomerative_n500", |b| {
        b.iter(|| {
            Agglomerative::new(0.3)
                .fit_predict_precomputed(black_box(&matrix))
                .unwrap()
        })
    });

    group.finish();
}

fn bench_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans");

    // Generate synthetic data
    let mut rng = StdRng::seed_from_u64(42);
    let n = 1000;
    let d = 16;
    let k = 10;

    let data: Vec<Vec<f32>> = (0..n)
        .map(|_| (0..d).map(|_| rng.random::<f32>()).collect())
        .collect();

    group.bench_function("fit_predict_n1000_d16_k10", |b| {
        b.iter(|| {
            let model = Kmeans::new(k).with_max_iter(10).with_seed(42);
            model.fit_predict(black_box(&data)).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline_stages, bench_kmeans);
criterion_main!(benches);
