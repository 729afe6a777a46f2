//! End-to-end clustering run: raw messages in, grouped failure classes out.
//!
//! ```text
//! raw bytes -> Normalizer -> Vectorizer -> [distance matrix -> threshold]
//!           -> clustering strategy -> Labeler -> ClusterReport
//! ```
//!
//! A run is a single synchronous batch with no shared state. Messages that are
//! not valid UTF-8 are skipped, logged and counted; every other failure is
//! returned unchanged.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cluster::{
    Agglomerative, Clustering, Dbscan, Hdbscan, Kmeans, Linkage, MeanShift, Metric, NOISE,
};
use crate::distance::{pairwise_distance, silhouette_score, DistanceMatrix};
use crate::error::{Error, Result};
use crate::label::{ClusterSummary, Labeler, DEFAULT_TOP_TERMS};
use crate::message::Message;
use crate::normalize::Normalizer;
use crate::report::ClusterReport;
use crate::threshold::estimate_threshold;
use crate::vectorize::{
    HashingEmbedder, SemanticVectorizer, SentenceEmbedder, TfidfVectorizer, Vectorizer,
};

/// Feature extraction used for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizerKind {
    /// TF-IDF over unigrams and bigrams.
    #[default]
    Tfidf,
    /// Sentence embeddings from the pipeline's embedder.
    Semantic,
}

/// Clustering strategy and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Agglomerative clustering cut at a distance threshold. Without a fixed
    /// threshold one is estimated from the pairwise distances.
    Hierarchical {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(default)]
        linkage: Linkage,
    },
    Dbscan {
        epsilon: f32,
        min_pts: usize,
        #[serde(default)]
        metric: Metric,
    },
    Hdbscan {
        min_samples: usize,
        min_cluster_size: usize,
        #[serde(default)]
        metric: Metric,
    },
    MeanShift {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bandwidth: Option<f32>,
    },
    Kmeans {
        k: usize,
        #[serde(default = "default_seed")]
        seed: u64,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
    },
}

fn default_seed() -> u64 {
    42
}

fn default_max_iter() -> usize {
    100
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Hierarchical {
            threshold: None,
            linkage: Linkage::Average,
        }
    }
}

impl Strategy {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Hierarchical { .. } => "hierarchical",
            Strategy::Dbscan { .. } => "dbscan",
            Strategy::Hdbscan { .. } => "hdbscan",
            Strategy::MeanShift { .. } => "mean_shift",
            Strategy::Kmeans { .. } => "kmeans",
        }
    }
}

/// Settings for one [`Pipeline`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub vectorizer: VectorizerKind,
    /// Include member texts in the report.
    pub verbose: bool,
    /// Terms per cluster summary.
    pub top_terms: usize,
    pub strategy: Strategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vectorizer: VectorizerKind::Tfidf,
            strategy: Strategy::default(),
            verbose: false,
            top_terms: DEFAULT_TOP_TERMS,
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Decodable input messages, in input order.
    pub messages: Vec<Message>,
    /// Normalized text of each entry in `messages`.
    pub normalized: Vec<String>,
    /// Cluster id of each entry in `messages`.
    pub assignment: Vec<usize>,
    pub summaries: BTreeMap<usize, ClusterSummary>,
    pub report: ClusterReport,
    /// Input indices of messages that were skipped as undecodable.
    pub skipped: Vec<usize>,
    /// Distance cutoff used by the hierarchical strategy.
    pub threshold: Option<f32>,
    pub silhouette: Option<f64>,
}

impl PipelineOutput {
    /// Cluster id of the message at input position `index`.
    pub fn cluster_of(&self, index: usize) -> Option<usize> {
        self.messages
            .binary_search_by_key(&index, |m| m.index)
            .ok()
            .map(|pos| self.assignment[pos])
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of non-noise clusters.
    pub fn n_clusters(&self) -> usize {
        self.report.n_clusters()
    }
}

/// Clustering pipeline bound to a configuration and, optionally, an embedder.
pub struct Pipeline<'m> {
    config: PipelineConfig,
    normalizer: Normalizer,
    embedder: Option<&'m dyn SentenceEmbedder>,
}

impl<'m> Pipeline<'m> {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            normalizer: Normalizer::default(),
            embedder: None,
        }
    }

    /// Replace the default placeholder rules.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Embedder for [`VectorizerKind::Semantic`]. Without one, a
    /// [`HashingEmbedder`] is used.
    pub fn with_embedder(mut self, embedder: &'m dyn SentenceEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cluster `raw`; message indices are positions in `raw`.
    pub fn run<M: AsRef<[u8]>>(&self, raw: &[M]) -> Result<PipelineOutput> {
        info!(
            messages = raw.len(),
            strategy = self.config.strategy.name(),
            "starting clustering run"
        );

        let mut messages = Vec::with_capacity(raw.len());
        let mut normalized = Vec::with_capacity(raw.len());
        let mut skipped = Vec::new();
        for (index, bytes) in raw.iter().enumerate() {
            let bytes = bytes.as_ref();
            match self.normalizer.normalize_bytes(bytes) {
                Ok(text) => {
                    messages.push(Message::new(index, String::from_utf8_lossy(bytes)));
                    normalized.push(text);
                }
                Err(err) => {
                    warn!(index, error = %err, "skipping message");
                    skipped.push(index);
                }
            }
        }
        if !skipped.is_empty() {
            warn!(skipped = skipped.len(), "skipped undecodable messages");
        }
        if normalized.is_empty() {
            return Err(Error::EmptyInput);
        }

        let vectors = self.vectorize(&normalized)?;
        debug!(
            vectors = vectors.len(),
            dim = vectors.first().map_or(0, Vec::len),
            "vectorized messages"
        );

        let mut cosine: Option<DistanceMatrix> = None;
        let mut threshold = None;
        let assignment = match &self.config.strategy {
            Strategy::Hierarchical {
                threshold: fixed,
                linkage,
            } => {
                let matrix = pairwise_distance(&vectors)?;
                let t = match fixed {
                    Some(t) => *t,
                    None => estimate_threshold(&matrix)?,
                };
                debug!(threshold = t, fixed = fixed.is_some(), "distance threshold");
                threshold = Some(t);
                let labels = Agglomerative::new(t)
                    .with_linkage(*linkage)
                    .fit_predict_precomputed(&matrix)?;
                cosine = Some(matrix);
                labels
            }
            Strategy::Dbscan {
                epsilon,
                min_pts,
                metric,
            } => Dbscan::new(*epsilon, *min_pts)
                .with_metric(*metric)
                .fit_predict(&vectors)?,
            Strategy::Hdbscan {
                min_samples,
                min_cluster_size,
                metric,
            } => Hdbscan::new()
                .with_min_samples(*min_samples)
                .with_min_cluster_size(*min_cluster_size)
                .with_metric(*metric)
                .fit_predict(&vectors)?,
            Strategy::MeanShift { bandwidth } => {
                let mut ms = MeanShift::new();
                if let Some(bw) = bandwidth {
                    ms = ms.with_bandwidth(*bw);
                }
                ms.fit_predict(&vectors)?
            }
            Strategy::Kmeans { k, seed, max_iter } => Kmeans::new(*k)
                .with_seed(*seed)
                .with_max_iter(*max_iter)
                .fit_predict(&vectors)?,
        };

        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        let summaries = Labeler::new()
            .with_top_k(self.config.top_terms)
            .label(&assignment, &texts)?;
        let real_clusters = summaries.keys().filter(|&&id| id != NOISE).count();

        let silhouette = if real_clusters >= 2 {
            let matrix = match cosine.take() {
                Some(m) => m,
                None => pairwise_distance(&vectors)?,
            };
            silhouette_score(&matrix, &assignment)
        } else {
            None
        };

        let report = ClusterReport::build(&assignment, &messages, &summaries, self.config.verbose)?
            .with_silhouette(silhouette)
            .with_skipped(skipped.len());

        info!(
            clusters = real_clusters,
            noise = assignment.iter().filter(|&&l| l == NOISE).count(),
            skipped = skipped.len(),
            "clustering run finished"
        );

        Ok(PipelineOutput {
            messages,
            normalized,
            assignment,
            summaries,
            report,
            skipped,
            threshold,
            silhouette,
        })
    }

    fn vectorize(&self, normalized: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.config.vectorizer {
            VectorizerKind::Tfidf => TfidfVectorizer::new().vectorize(normalized),
            VectorizerKind::Semantic => match self.embedder {
                Some(model) => SemanticVectorizer::new(model).vectorize(normalized),
                None => {
                    let fallback = HashingEmbedder::default();
                    SemanticVectorizer::new(&fallback).vectorize(normalized)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let config = PipelineConfig {
            vectorizer: VectorizerKind::Semantic,
            strategy: Strategy::Dbscan {
                epsilon: 0.4,
                min_pts: 3,
                metric: Metric::Cosine,
            },
            verbose: true,
            top_terms: 3,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [strategy]
            kind = "kmeans"
            k = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.vectorizer, VectorizerKind::Tfidf);
        assert_eq!(config.top_terms, 5);
        assert_eq!(
            config.strategy,
            Strategy::Kmeans {
                k: 4,
                seed: 42,
                max_iter: 100
            }
        );
        assert_eq!(
            PipelineConfig::from_toml_str("").unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn bad_config_is_a_configuration_error() {
        let err = PipelineConfig::from_toml_str("[strategy]\nkind = \"spectral\"").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn skips_undecodable_messages() {
        let raw: Vec<Vec<u8>> = vec![
            b"Timeout after 30 seconds".to_vec(),
            vec![0xff, 0xfe, 0x41],
            b"Timeout after 45 seconds".to_vec(),
        ];
        let config = PipelineConfig {
            strategy: Strategy::Kmeans {
                k: 1,
                seed: 42,
                max_iter: 100,
            },
            ..PipelineConfig::default()
        };
        let out = Pipeline::new(config).run(&raw).unwrap();
        assert_eq!(out.skipped, vec![1]);
        assert_eq!(out.skipped_count(), 1);
        assert_eq!(out.assignment.len(), 2);
        assert_eq!(out.cluster_of(2), Some(0));
        assert_eq!(out.cluster_of(1), None);
        assert_eq!(out.normalized[0], "Timeout after <number> seconds");
        assert_eq!(out.report.clusters[0].indices, vec![0, 2]);
    }

    #[test]
    fn all_undecodable_is_empty_input() {
        let raw = vec![vec![0xffu8]];
        let err = Pipeline::new(PipelineConfig::default()).run(&raw).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }

    #[test]
    fn fixed_threshold_skips_estimation() {
        let config = PipelineConfig {
            strategy: Strategy::Hierarchical {
                threshold: Some(0.5),
                linkage: Linkage::Average,
            },
            ..PipelineConfig::default()
        };
        let out = Pipeline::new(config).run(&["only one message"]).unwrap();
        assert_eq!(out.assignment, vec![0]);
        assert_eq!(out.threshold, Some(0.5));
        assert!(out.silhouette.is_none());
    }

    #[test]
    fn semantic_without_embedder_uses_hashing() {
        let config = PipelineConfig {
            vectorizer: VectorizerKind::Semantic,
            strategy: Strategy::Dbscan {
                epsilon: 0.05,
                min_pts: 2,
                metric: Metric::Cosine,
            },
            ..PipelineConfig::default()
        };
        let msgs = [
            "Connection refused",
            "Connection refused",
            "Assertion failed: expected true",
        ];
        let out = Pipeline::new(config).run(&msgs).unwrap();
        assert_eq!(out.assignment, vec![0, 0, NOISE]);
    }
}
