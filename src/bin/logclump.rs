//! logclump: group test-failure messages into near-duplicate classes.
//!
//! Reads a JSON array of message strings (or raw lines with `--lines`) from a
//! file or stdin, prints one summary line per cluster, and optionally writes a
//! JSON report and a per-cluster text export.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use logclump::{Linkage, Metric, Pipeline, PipelineConfig, Strategy, VectorizerKind};

/// Cluster test-failure messages by similarity.
#[derive(Parser, Debug)]
#[command(name = "logclump", version, about)]
struct Cli {
    /// Input file; stdin when omitted.
    input: Option<PathBuf>,

    /// Treat the input as one message per line instead of a JSON array.
    #[arg(long)]
    lines: bool,

    /// Pipeline config file (TOML).
    #[arg(long, env = "LOGCLUMP_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    vectorizer: Option<VectorizerArg>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Fixed distance threshold for the hierarchical strategy.
    #[arg(long)]
    threshold: Option<f32>,

    #[arg(long, value_enum)]
    linkage: Option<LinkageArg>,

    /// Neighborhood radius for DBSCAN.
    #[arg(long)]
    epsilon: Option<f32>,

    #[arg(long)]
    min_pts: Option<usize>,

    /// Distance for the density strategies.
    #[arg(long, value_enum)]
    metric: Option<MetricArg>,

    #[arg(long)]
    min_samples: Option<usize>,

    #[arg(long)]
    min_cluster_size: Option<usize>,

    /// Mean-shift kernel radius; estimated when omitted.
    #[arg(long)]
    bandwidth: Option<f32>,

    /// Number of clusters for k-means.
    #[arg(short, long)]
    k: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    top_terms: Option<usize>,

    /// Include member texts in the output.
    #[arg(short, long)]
    verbose: bool,

    /// Write the JSON report to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write one label-<id>.txt file per cluster into this directory.
    #[arg(long, env = "LOGCLUMP_EXPORT_DIR")]
    export_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VectorizerArg {
    Tfidf,
    Semantic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Hierarchical,
    Dbscan,
    Hdbscan,
    MeanShift,
    Kmeans,
}

impl From<&Strategy> for StrategyArg {
    fn from(s: &Strategy) -> Self {
        match s {
            Strategy::Hierarchical { .. } => StrategyArg::Hierarchical,
            Strategy::Dbscan { .. } => StrategyArg::Dbscan,
            Strategy::Hdbscan { .. } => StrategyArg::Hdbscan,
            Strategy::MeanShift { .. } => StrategyArg::MeanShift,
            Strategy::Kmeans { .. } => StrategyArg::Kmeans,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LinkageArg {
    Average,
    Single,
    Complete,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MetricArg {
    Euclidean,
    Cosine,
}

impl Cli {
    /// Apply command-line overrides on top of `config`.
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.vectorizer {
            config.vectorizer = match v {
                VectorizerArg::Tfidf => VectorizerKind::Tfidf,
                VectorizerArg::Semantic => VectorizerKind::Semantic,
            };
        }
        if let Some(t) = self.top_terms {
            config.top_terms = t;
        }
        config.verbose |= self.verbose;

        let linkage = self.linkage.map(|l| match l {
            LinkageArg::Average => Linkage::Average,
            LinkageArg::Single => Linkage::Single,
            LinkageArg::Complete => Linkage::Complete,
        });
        let metric = self.metric.map(|m| match m {
            MetricArg::Euclidean => Metric::Euclidean,
            MetricArg::Cosine => Metric::Cosine,
        });

        let base = config.strategy.clone();
        let kind = self.strategy.unwrap_or_else(|| StrategyArg::from(&base));
        config.strategy = match (kind, base) {
            (StrategyArg::Hierarchical, Strategy::Hierarchical { threshold, linkage: l }) => {
                Strategy::Hierarchical {
                    threshold: self.threshold.or(threshold),
                    linkage: linkage.unwrap_or(l),
                }
            }
            (StrategyArg::Hierarchical, _) => Strategy::Hierarchical {
                threshold: self.threshold,
                linkage: linkage.unwrap_or_default(),
            },
            (
                StrategyArg::Dbscan,
                Strategy::Dbscan {
                    epsilon,
                    min_pts,
                    metric: m,
                },
            ) => Strategy::Dbscan {
                epsilon: self.epsilon.unwrap_or(epsilon),
                min_pts: self.min_pts.unwrap_or(min_pts),
                metric: metric.unwrap_or(m),
            },
            (StrategyArg::Dbscan, _) => Strategy::Dbscan {
                epsilon: self.epsilon.unwrap_or(0.5),
                min_pts: self.min_pts.unwrap_or(2),
                metric: metric.unwrap_or_default(),
            },
            (
                StrategyArg::Hdbscan,
                Strategy::Hdbscan {
                    min_samples,
                    min_cluster_size,
                    metric: m,
                },
            ) => Strategy::Hdbscan {
                min_samples: self.min_samples.unwrap_or(min_samples),
                min_cluster_size: self.min_cluster_size.unwrap_or(min_cluster_size),
                metric: metric.unwrap_or(m),
            },
            (StrategyArg::Hdbscan, _) => Strategy::Hdbscan {
                min_samples: self.min_samples.unwrap_or(5),
                min_cluster_size: self.min_cluster_size.unwrap_or(5),
                metric: metric.unwrap_or_default(),
            },
            (StrategyArg::MeanShift, Strategy::MeanShift { bandwidth }) => Strategy::MeanShift {
                bandwidth: self.bandwidth.or(bandwidth),
            },
            (StrategyArg::MeanShift, _) => Strategy::MeanShift {
                bandwidth: self.bandwidth,
            },
            (StrategyArg::Kmeans, Strategy::Kmeans { k, seed, max_iter }) => Strategy::Kmeans {
                k: self.k.unwrap_or(k),
                seed: self.seed.unwrap_or(seed),
                max_iter,
            },
            (StrategyArg::Kmeans, _) => Strategy::Kmeans {
                k: self.k.unwrap_or(2),
                seed: self.seed.unwrap_or(42),
                max_iter: 100,
            },
        };
        config
    }
}

fn read_input(cli: &Cli) -> anyhow::Result<Vec<Vec<u8>>> {
    let bytes = match &cli.input {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read input: {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    if cli.lines {
        return Ok(bytes
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(<[u8]>::to_vec)
            .collect());
    }
    let messages: Vec<String> =
        serde_json::from_slice(&bytes).context("input is not a JSON array of strings")?;
    Ok(messages.into_iter().map(String::into_bytes).collect())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let config = cli.apply(base);
    info!(strategy = config.strategy.name(), "configuration resolved");

    let raw = read_input(&cli)?;
    let out = Pipeline::new(config).run(&raw)?;

    print!("{}", out.report);

    if let Some(path) = &cli.json {
        std::fs::write(path, out.report.to_json()?)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "wrote JSON report");
    }
    if let Some(dir) = &cli.export_dir {
        let files = out.report.write_text_export(dir)?;
        info!(dir = %dir.display(), files = files.len(), "wrote text export");
    }
    Ok(())
}
