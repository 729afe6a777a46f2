//! DBSCAN: Density-Based Spatial Clustering of Applications with Noise.
//!
//! # The Algorithm (Ester et al., 1996)
//!
//! DBSCAN groups points by neighborhood density. For failure messages this
//! means: a message that has at least `min_pts - 1` other messages within
//! `epsilon` seeds a failure class, and the class grows through every message
//! reachable from it. Isolated one-off failures stay unclustered.
//!
//! ## Core Concepts
//!
//! - **Epsilon (ε)**: Maximum distance between two points to be neighbors.
//! - **MinPts**: Minimum neighbors within ε (the point itself included) for a
//!   point to be "core".
//! - **Border point**: Within ε of a core point but not core itself.
//! - **Noise point**: Neither core nor border; labeled [`NOISE`].
//!
//! ## Complexity
//!
//! O(n²) distance evaluations: neighborhoods are read from a precomputed
//! distance matrix.
//!
//! ## Limitations
//!
//! - Struggles with varying densities (see [`super::Hdbscan`])
//! - ε is dataset-dependent; for L2-normalized TF-IDF rows the Euclidean
//!   distance lies in `[0, 2]`, and ε around 0.5 is a reasonable start.

use super::metric::{check_dims, Metric};
use super::traits::Clustering;
use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};

/// Label assigned to points that belong to no cluster.
pub const NOISE: usize = usize::MAX;

// Internal label encoding.
// - UNCLASSIFIED: never assigned yet
// - NOISE_LABEL: visited, but not density-reachable from any core point (may be promoted later)
const UNCLASSIFIED: i32 = -2;
const NOISE_LABEL: i32 = -1;

/// DBSCAN clustering algorithm.
#[derive(Debug, Clone)]
pub struct Dbscan {
    /// Epsilon: maximum distance for neighborhood.
    epsilon: f32,
    /// Minimum points for core point classification.
    min_pts: usize,
    metric: Metric,
}

impl Dbscan {
    /// Create a new DBSCAN clusterer.
    ///
    /// # Arguments
    ///
    /// * `epsilon` - Maximum distance between two points to be neighbors.
    /// * `min_pts` - Minimum number of points to form a dense region.
    pub fn new(epsilon: f32, min_pts: usize) -> Self {
        Self {
            epsilon,
            min_pts,
            metric: Metric::Euclidean,
        }
    }

    /// Set epsilon (neighborhood radius).
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set minimum points for core classification.
    pub fn with_min_pts(mut self, min_pts: usize) -> Self {
        self.min_pts = min_pts;
        self
    }

    /// Set the distance used between feature vectors.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "epsilon",
                message: "must be positive",
            });
        }
        if self.min_pts == 0 {
            return Err(Error::InvalidParameter {
                name: "min_pts",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Find all neighbors within epsilon, excluding the point itself.
    fn region_query(&self, dists: &DistanceMatrix, point_idx: usize) -> Vec<usize> {
        dists
            .row(point_idx)
            .iter()
            .enumerate()
            .filter(|&(idx, &d)| idx != point_idx && d <= self.epsilon)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Expand cluster from a core point.
    fn expand_cluster(
        &self,
        dists: &DistanceMatrix,
        point_idx: usize,
        neighbors: &[usize],
        labels: &mut [i32],
        cluster_id: i32,
        visited: &mut [bool],
    ) {
        labels[point_idx] = cluster_id;

        // Use a queue for iterative expansion (avoid deep recursion)
        let mut to_process: Vec<usize> = neighbors.to_vec();

        while let Some(neighbor_idx) = to_process.pop() {
            // A point previously labeled noise can later become a border point,
            // so assign before checking `visited`.
            if labels[neighbor_idx] == UNCLASSIFIED || labels[neighbor_idx] == NOISE_LABEL {
                labels[neighbor_idx] = cluster_id;
            }

            if visited[neighbor_idx] {
                continue;
            }
            visited[neighbor_idx] = true;

            let neighbor_neighbors = self.region_query(dists, neighbor_idx);

            // MinPts includes the point itself
            if neighbor_neighbors.len() + 1 >= self.min_pts {
                for nn in neighbor_neighbors {
                    if !visited[nn] {
                        to_process.push(nn);
                    }
                }
            }
        }
    }

    /// Cluster from a precomputed distance matrix.
    pub fn fit_predict_precomputed(&self, dists: &DistanceMatrix) -> Result<Vec<usize>> {
        self.validate()?;
        let n = dists.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let mut labels = vec![UNCLASSIFIED; n];
        let mut visited = vec![false; n];
        let mut cluster_id: i32 = 0;

        for point_idx in 0..n {
            if visited[point_idx] {
                continue;
            }
            visited[point_idx] = true;

            let neighbors = self.region_query(dists, point_idx);

            if neighbors.len() + 1 < self.min_pts {
                // Not enough neighbors: mark as noise (might be border later)
                labels[point_idx] = NOISE_LABEL;
                continue;
            }

            self.expand_cluster(
                dists,
                point_idx,
                &neighbors,
                &mut labels,
                cluster_id,
                &mut visited,
            );
            cluster_id += 1;
        }

        Ok(labels
            .into_iter()
            .map(|l| if l >= 0 { l as usize } else { NOISE })
            .collect())
    }
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(0.5, 2)
    }
}

impl Clustering for Dbscan {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        self.validate()?;
        check_dims(data)?;
        let dists = self.metric.matrix(data)?;
        self.fit_predict_precomputed(&dists)
    }

    /// DBSCAN discovers clusters dynamically, so this returns 0.
    fn n_clusters(&self) -> usize {
        0
    }
}
