//! Clustering strategies for failure-message vectors.
//!
//! Every strategy returns one label per input point. Labels are dense
//! (`0..k`) except for the density-based strategies, which mark unreachable
//! points with [`NOISE`].
//!
//! ## Strategies
//!
//! ### Agglomerative (threshold cut)
//!
//! Bottom-up merging over a precomputed distance matrix, stopping once the
//! closest pair of clusters is farther apart than a threshold. Paired with
//! [`crate::threshold::estimate_threshold`] this needs no cluster count and
//! no radius: the cut is learned from the distance distribution itself.
//!
//! ### DBSCAN / HDBSCAN
//!
//! Density-based clustering that discovers the number of classes and leaves
//! one-off failures as noise. HDBSCAN replaces DBSCAN's global radius with a
//! hierarchy, which helps when some failure classes are far more repetitive
//! than others.
//!
//! ### Mean-shift
//!
//! Mode seeking with a flat kernel. The bandwidth can be estimated from
//! nearest-neighbor distances with [`estimate_bandwidth`].
//!
//! ### K-means
//!
//! Lloyd iterations from k-means++ seeds, for when the number of failure
//! classes is known:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use logclump::cluster::{Agglomerative, Clustering, Dbscan, Kmeans};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2).fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! let labels = Dbscan::new(0.5, 2).fit_predict(&data).unwrap();
//! assert_eq!(labels.len(), data.len());
//!
//! // Cosine distance: the first pair and the second pair point in nearly
//! // the same direction.
//! let data = vec![vec![1.0, 0.0], vec![2.0, 0.1], vec![0.0, 1.0], vec![0.1, 3.0]];
//! let labels = Agglomerative::new(0.1).fit_predict(&data).unwrap();
//! assert_eq!(labels, vec![0, 0, 1, 1]);
//! ```

mod agglomerative;
mod dbscan;
mod hdbscan;
mod kmeans;
mod mean_shift;
mod metric;
mod traits;
mod util;

pub use agglomerative::{Agglomerative, Linkage};
pub use dbscan::{Dbscan, NOISE};
pub use hdbscan::Hdbscan;
pub use kmeans::{Kmeans, KmeansFit};
pub use mean_shift::{estimate_bandwidth, MeanShift};
pub use metric::Metric;
pub use traits::Clustering;
