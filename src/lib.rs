//! Unsupervised clustering of test-failure messages.
//!
//! `logclump` groups thousands of free-text failure messages into classes of
//! near-duplicates so they can be triaged by cause rather than by occurrence.
//!
//! The stages, leaf first:
//! - [`normalize`]: mask volatile substrings (pids, thread ids, timestamps,
//!   addresses, numbers) with placeholder tokens
//! - [`vectorize`]: TF-IDF or sentence-embedding feature vectors
//! - [`distance`]: pairwise cosine distance matrix
//! - [`threshold`]: distance cutoff from a two-component Gaussian mixture
//! - [`cluster`]: agglomerative, DBSCAN, HDBSCAN, mean-shift and k-means
//! - [`label`] and [`report`]: per-cluster terms and grouped output
//!
//! [`Pipeline`] runs all of them from a [`PipelineConfig`].
//!
//! ```rust
//! use logclump::{Pipeline, PipelineConfig};
//!
//! let messages = [
//!     "NullReferenceException at 0x0041F2A0",
//!     "Timeout after 30 seconds",
//!     "NullReferenceException at 0x7FFE1000",
//!     "Timeout after 45 seconds",
//! ];
//! let out = Pipeline::new(PipelineConfig::default()).run(&messages).unwrap();
//! assert_eq!(out.assignment, vec![0, 1, 0, 1]);
//! ```

#![forbid(unsafe_code)]

pub mod cluster;
pub mod distance;
pub mod error;
pub mod label;
pub mod message;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod threshold;
pub mod tokenize;
pub mod vectorize;

pub use cluster::{
    Agglomerative, Clustering, Dbscan, Hdbscan, Kmeans, KmeansFit, Linkage, MeanShift,
    Metric, NOISE,
};
pub use distance::{pairwise_distance, DistanceMatrix};
pub use error::{Error, Result};
pub use label::{label, ClusterSummary, Labeler};
pub use message::Message;
pub use normalize::{Normalizer, PlaceholderRule};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, Strategy, VectorizerKind};
pub use report::{ClusterGroup, ClusterReport};
pub use threshold::{estimate_threshold, ThresholdEstimator};
pub use vectorize::{
    HashingEmbedder, SemanticVectorizer, SentenceEmbedder, TfidfVectorizer, Vectorizer,
};
