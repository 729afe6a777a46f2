//! Agglomerative clustering with a distance cutoff.
//!
//! Starts from singletons and repeatedly merges the two closest clusters while
//! their linkage distance is at most the threshold. Among equally close pairs
//! the one whose lower member index is smallest merges first (then the smaller
//! upper index). Cluster-to-cluster distances are maintained with the
//! Lance–Williams update, so the input matrix is read once.
//!
//! Each row keeps a cached nearest neighbor among higher slots; only rows whose
//! neighbor took part in a merge are rescanned, which keeps the common case
//! close to O(n²).

use serde::{Deserialize, Serialize};

use super::traits::Clustering;
use super::util::UnionFind;
use crate::distance::{pairwise_distance, DistanceMatrix};
use crate::error::{Error, Result};

/// How the distance between two clusters is derived from member distances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Mean over all cross pairs (UPGMA).
    #[default]
    Average,
    /// Closest cross pair.
    Single,
    /// Farthest cross pair.
    Complete,
}

impl Linkage {
    fn update(self, d_ak: f64, d_bk: f64, size_a: usize, size_b: usize) -> f64 {
        match self {
            Linkage::Average => {
                (size_a as f64 * d_ak + size_b as f64 * d_bk) / (size_a + size_b) as f64
            }
            Linkage::Single => d_ak.min(d_bk),
            Linkage::Complete => d_ak.max(d_bk),
        }
    }
}

/// Threshold-cut agglomerative clustering.
#[derive(Debug, Clone)]
pub struct Agglomerative {
    threshold: f32,
    linkage: Linkage,
}

impl Agglomerative {
    /// Merge clusters whose linkage distance is at most `threshold`.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            linkage: Linkage::Average,
        }
    }

    /// Set the linkage criterion.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(Error::InvalidParameter {
                name: "threshold",
                message: "must be finite and non-negative",
            });
        }
        Ok(())
    }

    /// Cluster from a precomputed distance matrix.
    ///
    /// Labels are dense and numbered in order of each cluster's first member.
    pub fn fit_predict_precomputed(&self, dists: &DistanceMatrix) -> Result<Vec<usize>> {
        self.validate()?;
        let n = dists.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let mut work: Vec<f32> = (0..n).flat_map(|i| dists.row(i).iter().copied()).collect();
        let mut active = vec![true; n];
        let mut size = vec![1usize; n];
        let mut nn: Vec<Option<(usize, f32)>> = (0..n)
            .map(|i| row_nearest(&work, n, &active, i))
            .collect();
        let mut uf = UnionFind::new(n);

        loop {
            let mut best: Option<(usize, usize, f32)> = None;
            for i in 0..n {
                if !active[i] {
                    continue;
                }
                if let Some((j, d)) = nn[i] {
                    if best.is_none_or(|(_, _, bd)| d < bd) {
                        best = Some((i, j, d));
                    }
                }
            }
            let Some((a, b, d)) = best else {
                break;
            };
            if d > self.threshold {
                break;
            }

            // `a < b`; the merged cluster keeps slot `a`, its lowest member.
            for k in 0..n {
                if !active[k] || k == a || k == b {
                    continue;
                }
                let merged = self.linkage.update(
                    f64::from(work[a * n + k]),
                    f64::from(work[b * n + k]),
                    size[a],
                    size[b],
                ) as f32;
                work[a * n + k] = merged;
                work[k * n + a] = merged;
            }
            active[b] = false;
            size[a] += size[b];
            nn[b] = None;
            uf.union(a, b);

            for i in 0..n {
                if !active[i] {
                    continue;
                }
                let stale = i == a || matches!(nn[i], Some((j, _)) if j == a || j == b);
                if stale {
                    nn[i] = row_nearest(&work, n, &active, i);
                } else if i < a {
                    let d_ia = work[i * n + a];
                    if let Some((j, d)) = nn[i] {
                        if d_ia < d || (d_ia == d && a < j) {
                            nn[i] = Some((a, d_ia));
                        }
                    }
                }
            }
        }

        tracing::debug!(
            items = n,
            clusters = active.iter().filter(|&&x| x).count(),
            threshold = self.threshold,
            "agglomerative clustering finished"
        );
        Ok(uf.labels())
    }
}

/// Nearest active slot above `i`; ties go to the lower slot.
fn row_nearest(work: &[f32], n: usize, active: &[bool], i: usize) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for j in (i + 1)..n {
        if !active[j] {
            continue;
        }
        let d = work[i * n + j];
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((j, d));
        }
    }
    best
}

impl Clustering for Agglomerative {
    /// Clusters feature vectors under cosine distance.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        self.validate()?;
        let dists = pairwise_distance(data)?;
        self.fit_predict_precomputed(&dists)
    }

    fn n_clusters(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f32]]) -> DistanceMatrix {
        DistanceMatrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn interleaved_groups_at_zero_threshold() {
        // Items 0, 1, 3 are identical; so are 2, 4, 5.
        let groups = [0, 0, 1, 0, 1, 1];
        let rows: Vec<Vec<f32>> = (0..6)
            .map(|i| {
                (0..6)
                    .map(|j| if groups[i] == groups[j] { 0.0 } else { 1.0 })
                    .collect()
            })
            .collect();
        let m = DistanceMatrix::from_rows(&rows).unwrap();
        let labels = Agglomerative::new(0.0).fit_predict_precomputed(&m).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 0, 1, 1]);
    }

    #[test]
    fn pair_at_exact_threshold_merges() {
        let m = matrix(&[&[0.0, 0.4], &[0.4, 0.0]]);
        assert_eq!(
            Agglomerative::new(0.4).fit_predict_precomputed(&m).unwrap(),
            vec![0, 0]
        );
        assert_eq!(
            Agglomerative::new(0.39).fit_predict_precomputed(&m).unwrap(),
            vec![0, 1]
        );
    }

    #[test]
    fn ties_merge_lowest_pair_first() {
        // (0,1) and (1,2) tie; merging (0,1) first leaves 2 out under
        // average or complete linkage.
        let m = matrix(&[&[0.0, 1.0, 1.5], &[1.0, 0.0, 1.0], &[1.5, 1.0, 0.0]]);
        for linkage in [Linkage::Average, Linkage::Complete] {
            let labels = Agglomerative::new(1.2)
                .with_linkage(linkage)
                .fit_predict_precomputed(&m)
                .unwrap();
            assert_eq!(labels, vec![0, 0, 1], "{linkage:?}");
        }
        let labels = Agglomerative::new(1.2)
            .with_linkage(Linkage::Single)
            .fit_predict_precomputed(&m)
            .unwrap();
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn average_linkage_uses_cluster_sizes() {
        // After {0,1} merges, d({0,1}, 2) = (0.2 + 0.6) / 2 = 0.4.
        let m = matrix(&[&[0.0, 0.1, 0.2], &[0.1, 0.0, 0.6], &[0.2, 0.6, 0.0]]);
        let merged = Agglomerative::new(0.4).fit_predict_precomputed(&m).unwrap();
        assert_eq!(merged, vec![0, 0, 0]);
        let split = Agglomerative::new(0.35).fit_predict_precomputed(&m).unwrap();
        assert_eq!(split, vec![0, 0, 1]);
    }

    #[test]
    fn everything_apart_stays_singleton() {
        let m = matrix(&[&[0.0, 1.0, 1.0], &[1.0, 0.0, 1.0], &[1.0, 1.0, 0.0]]);
        let labels = Agglomerative::new(0.5).fit_predict_precomputed(&m).unwrap();
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn vectors_use_cosine_distance() {
        let data = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, 3.0],
        ];
        let labels = Agglomerative::new(0.1).fit_predict(&data).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1]);
    }

    #[test]
    fn single_item() {
        let m = matrix(&[&[0.0]]);
        assert_eq!(
            Agglomerative::new(0.3).fit_predict_precomputed(&m).unwrap(),
            vec![0]
        );
    }

    #[test]
    fn invalid_threshold() {
        let m = matrix(&[&[0.0]]);
        assert!(Agglomerative::new(-0.1).fit_predict_precomputed(&m).is_err());
        assert!(Agglomerative::new(f32::NAN).fit_predict_precomputed(&m).is_err());
    }
}
