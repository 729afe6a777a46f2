//! K-means with a fixed cluster count.
//!
//! k-means++ seeding (Arthur & Vassilvitskii, 2007) from a seeded [`StdRng`],
//! then Lloyd iterations until no assignment changes or `max_iter` is hit.
//! An empty cluster keeps its previous centroid.

use rand::prelude::*;

use super::metric::check_dims;
use super::traits::Clustering;
use super::util::{nearest, squared_euclidean};
use crate::error::{Error, Result};

/// K-means clusterer.
#[derive(Debug, Clone)]
pub struct Kmeans {
    k: usize,
    max_iter: usize,
    seed: u64,
}

/// Output of a k-means run.
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// Final centroids, indexed by label.
    pub centroids: Vec<Vec<f32>>,
    /// Label per input point, in `0..k`.
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
    /// Lloyd iterations performed.
    pub iterations: usize,
}

impl Kmeans {
    /// K-means with `k` clusters, seed 42 and at most 100 iterations.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            seed: 42,
        }
    }

    /// Seed for k-means++ initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Upper bound on Lloyd iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Run k-means and return centroids alongside the labels.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<KmeansFit> {
        let dim = check_dims(data)?;
        let n = data.len();
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }

        let mut centroids = self.init_centroids(data);
        let mut labels = vec![0usize; n];
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations += 1;

            let mut changed = false;
            for (i, point) in data.iter().enumerate() {
                let (c, _) = nearest(point, &centroids);
                if labels[i] != c {
                    labels[i] = c;
                    changed = true;
                }
            }
            if !changed && iter > 0 {
                break;
            }

            let mut sums = vec![vec![0.0f64; dim]; self.k];
            let mut counts = vec![0usize; self.k];
            for (point, &c) in data.iter().zip(&labels) {
                counts[c] += 1;
                for (s, &x) in sums[c].iter_mut().zip(point) {
                    *s += f64::from(x);
                }
            }
            for (c, sum) in sums.into_iter().enumerate() {
                if counts[c] == 0 {
                    continue;
                }
                let count = counts[c] as f64;
                centroids[c] = sum.into_iter().map(|s| (s / count) as f32).collect();
            }
        }

        // Centroids moved after the last assignment pass unless we converged.
        for (i, point) in data.iter().enumerate() {
            labels[i] = nearest(point, &centroids).0;
        }
        let inertia = data
            .iter()
            .zip(&labels)
            .map(|(p, &c)| f64::from(squared_euclidean(p, &centroids[c])))
            .sum();

        Ok(KmeansFit {
            centroids,
            labels,
            inertia,
            iterations,
        })
    }

    fn init_centroids(&self, data: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let n = data.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = Vec::with_capacity(self.k);
        centroids.push(data[rng.random_range(0..n)].clone());

        let mut d2: Vec<f64> = data
            .iter()
            .map(|p| f64::from(squared_euclidean(p, &centroids[0])))
            .collect();

        while centroids.len() < self.k {
            let total: f64 = d2.iter().sum();
            let next = if total > 0.0 {
                let target = rng.random::<f64>() * total;
                let mut acc = 0.0;
                let mut pick = n - 1;
                for (i, &w) in d2.iter().enumerate() {
                    acc += w;
                    if acc > target {
                        pick = i;
                        break;
                    }
                }
                pick
            } else {
                // Every point coincides with a centroid already.
                rng.random_range(0..n)
            };
            centroids.push(data[next].clone());
            let newest = &data[next];
            for (w, p) in d2.iter_mut().zip(data) {
                *w = w.min(f64::from(squared_euclidean(p, newest)));
            }
        }
        centroids
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![0.2, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
            vec![10.2, 10.0],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let fit = Kmeans::new(2).fit(&two_blobs()).unwrap();
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_eq!(fit.labels[4], fit.labels[5]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert_eq!(fit.centroids.len(), 2);
        assert!(fit.inertia < 0.2);
    }

    #[test]
    fn single_point_single_cluster() {
        let labels = Kmeans::new(1).fit_predict(&[vec![3.0, 4.0]]).unwrap();
        assert_eq!(labels, vec![0]);
    }

    #[test]
    fn deterministic_for_seed() {
        let data: Vec<Vec<f32>> = (0..40)
            .map(|i| vec![(i % 7) as f32, (i % 5) as f32 * 0.5])
            .collect();
        let a = Kmeans::new(3).with_seed(7).fit(&data).unwrap();
        let b = Kmeans::new(3).with_seed(7).fit(&data).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn k_equal_to_n_with_duplicates() {
        let data = vec![vec![1.0], vec![1.0], vec![1.0]];
        let labels = Kmeans::new(3).fit_predict(&data).unwrap();
        assert_eq!(labels.len(), 3);
        assert!(labels.iter().all(|&l| l < 3));
    }

    #[test]
    fn invalid_cluster_count() {
        let data = two_blobs();
        let err = Kmeans::new(0).fit(&data).unwrap_err();
        assert!(matches!(err, Error::InvalidClusterCount { requested: 0, .. }));
        let err = Kmeans::new(7).fit(&data).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(Kmeans::new(1).fit(&[]), Err(Error::EmptyInput)));
        assert!(matches!(
            Kmeans::new(1).fit(&[vec![0.0], vec![0.0, 1.0]]),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
