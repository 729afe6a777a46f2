//! HDBSCAN: Hierarchical Density-Based Spatial Clustering of Applications with Noise.
//!
//! HDBSCAN (Campello, Moulavi, Sander 2013) removes DBSCAN's global epsilon.
//! Failure corpora are rarely uniform (one flaky test can produce hundreds of
//! near-identical messages while a real regression produces a dozen varied
//! ones), so a single radius tends to either merge or shatter classes.
//!
//! # Algorithm Outline
//!
//! 1. **Core distance**: distance to the `min_samples`-th nearest neighbor.
//! 2. **Mutual reachability**: `mrd(i, j) = max(core[i], core[j], d(i, j))`.
//! 3. **MST** over mutual reachability (Prim, O(n²)).
//! 4. **Single-linkage tree** from the MST edges in ascending order.
//! 5. **Condensed tree**: walk the hierarchy from the top; a side smaller than
//!    `min_cluster_size` falls out of its parent as points instead of
//!    splitting it.
//! 6. **Stability selection**: keep the non-overlapping set of clusters that
//!    maximizes `Σ size · (λ_event - λ_birth)`, with `λ = 1 / distance`.
//!
//! Points not inside a selected cluster are labeled [`NOISE`].

use super::metric::{check_dims, Metric};
use super::traits::Clustering;
use super::util::{self, UnionFind};
use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};

use super::dbscan::NOISE;

const MIN_DISTANCE: f64 = 1e-12;

/// HDBSCAN clustering algorithm.
#[derive(Debug, Clone)]
pub struct Hdbscan {
    min_samples: usize,
    min_cluster_size: usize,
    metric: Metric,
}

impl Default for Hdbscan {
    fn default() -> Self {
        Self {
            min_samples: 5,
            min_cluster_size: 5,
            metric: Metric::Euclidean,
        }
    }
}

impl Hdbscan {
    /// Create a new HDBSCAN clusterer with default parameters.
    ///
    /// Defaults: `min_samples = 5`, `min_cluster_size = 5`, Euclidean metric.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `min_samples` (k for core distance computation).
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Set `min_cluster_size` (minimum points for a cluster to persist).
    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.min_cluster_size = min_cluster_size;
        self
    }

    /// Set the distance used between feature vectors.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1",
            });
        }
        if self.min_cluster_size < 2 {
            return Err(Error::InvalidParameter {
                name: "min_cluster_size",
                message: "must be at least 2",
            });
        }
        Ok(())
    }

    /// Cluster from a precomputed distance matrix.
    pub fn fit_predict_precomputed(&self, dists: &DistanceMatrix) -> Result<Vec<usize>> {
        self.validate()?;
        let n = dists.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let core = core_distances(dists, self.min_samples);
        let mut mst = util::prim_mst(n, |i, j| dists.get(i, j).max(core[i]).max(core[j]));
        mst.sort_by(|a, b| a.2.total_cmp(&b.2));

        Ok(extract_clusters(&mst, n, self.min_cluster_size))
    }
}

impl Clustering for Hdbscan {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        self.validate()?;
        check_dims(data)?;
        let dists = self.metric.matrix(data)?;
        self.fit_predict_precomputed(&dists)
    }

    fn n_clusters(&self) -> usize {
        0
    }
}

fn core_distances(dists: &DistanceMatrix, min_samples: usize) -> Vec<f32> {
    let n = dists.len();
    if n == 1 {
        return vec![0.0];
    }
    let k = min_samples.min(n - 1);
    (0..n)
        .map(|i| {
            let mut row: Vec<f32> = dists
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &d)| d)
                .collect();
            row.sort_by(|a, b| a.total_cmp(b));
            row[k - 1]
        })
        .collect()
}

/// Single-linkage dendrogram over the sorted MST. Internal node `n + k`
/// joins `left[k]` and `right[k]` at distance `dist[k]`.
struct Dendrogram {
    n: usize,
    left: Vec<usize>,
    right: Vec<usize>,
    dist: Vec<f32>,
    size: Vec<usize>,
}

impl Dendrogram {
    fn build(mst: &[(usize, usize, f32)], n: usize) -> Self {
        let mut uf = UnionFind::new(n);
        let mut node_of: Vec<usize> = (0..n).collect();
        let mut tree = Self {
            n,
            left: Vec::with_capacity(n.saturating_sub(1)),
            right: Vec::with_capacity(n.saturating_sub(1)),
            dist: Vec::with_capacity(n.saturating_sub(1)),
            size: Vec::with_capacity(n.saturating_sub(1)),
        };
        for &(u, v, d) in mst {
            let ru = uf.find(u);
            let rv = uf.find(v);
            if ru == rv {
                continue;
            }
            let (a, b) = (node_of[ru], node_of[rv]);
            let size = tree.node_size(a) + tree.node_size(b);
            tree.size.push(size);
            tree.left.push(a);
            tree.right.push(b);
            tree.dist.push(d);
            let root = uf.union_roots(ru, rv);
            node_of[root] = n + tree.left.len() - 1;
        }
        tree
    }

    fn node_size(&self, node: usize) -> usize {
        if node < self.n {
            1
        } else {
            self.size[node - self.n]
        }
    }

    fn root(&self) -> usize {
        self.n + self.left.len() - 1
    }

    /// Points under `node`.
    fn points(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.node_size(node));
        let mut stack = vec![node];
        while let Some(x) = stack.pop() {
            if x < self.n {
                out.push(x);
            } else {
                stack.push(self.right[x - self.n]);
                stack.push(self.left[x - self.n]);
            }
        }
        out
    }
}

/// One row of the condensed tree: either a point leaving `parent`
/// (`size == 1`, `child < n`) or a child cluster splitting off (`child >= n`).
struct Condensed {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

/// Walk the dendrogram from the root. A split where both sides reach
/// `min_cluster_size` creates two child clusters; otherwise the small side's
/// points fall out and the big side keeps the parent's id. Children always
/// get higher ids than their parent; the root is `n`.
fn condense(tree: &Dendrogram, min_cluster_size: usize) -> (Vec<Condensed>, usize) {
    let n = tree.n;
    let mut rows = Vec::new();
    let mut next_id = n + 1;
    let mut stack = vec![(tree.root(), n)];

    while let Some((node, cluster)) = stack.pop() {
        let k = node - n;
        // Duplicates sit at distance 0; a finite cap keeps stabilities finite.
        let lambda = 1.0 / f64::from(tree.dist[k]).max(MIN_DISTANCE);
        let sides = [tree.left[k], tree.right[k]];
        let big = sides.map(|s| tree.node_size(s) >= min_cluster_size);

        for (side, is_big) in sides.into_iter().zip(big) {
            if !is_big {
                rows.extend(tree.points(side).into_iter().map(|p| Condensed {
                    parent: cluster,
                    child: p,
                    lambda,
                    size: 1,
                }));
                continue;
            }
            let owner = if big[0] && big[1] {
                let id = next_id;
                next_id += 1;
                rows.push(Condensed {
                    parent: cluster,
                    child: id,
                    lambda,
                    size: tree.node_size(side),
                });
                id
            } else {
                cluster
            };
            // min_cluster_size >= 2, so a big side is never a single point.
            if side >= n {
                stack.push((side, owner));
            }
        }
    }

    (rows, next_id - n)
}

fn extract_clusters(mst: &[(usize, usize, f32)], n: usize, min_cluster_size: usize) -> Vec<usize> {
    if n == 1 {
        return vec![NOISE];
    }

    let tree = Dendrogram::build(mst, n);
    let (rows, num_clusters) = condense(&tree, min_cluster_size);

    // A cluster is born when it first appears as a child; the root at lambda 0.
    let mut birth = vec![0.0f64; num_clusters];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); num_clusters];
    let mut parent_of = vec![usize::MAX; num_clusters];
    for row in rows.iter().filter(|r| r.child >= n) {
        birth[row.child - n] = row.lambda;
        children[row.parent - n].push(row.child - n);
        parent_of[row.child - n] = row.parent - n;
    }

    let mut stability = vec![0.0f64; num_clusters];
    for row in &rows {
        let c = row.parent - n;
        stability[c] += row.size as f64 * (row.lambda - birth[c]);
    }

    // Children have higher ids than parents, so descending ids is bottom-up.
    // The root is never selected; a parent wins ties against its children.
    let mut selected = vec![true; num_clusters];
    selected[0] = false;
    let mut best = stability.clone();
    for c in (1..num_clusters).rev() {
        let below: f64 = children[c].iter().map(|&ch| best[ch]).sum();
        if !children[c].is_empty() && below > stability[c] {
            selected[c] = false;
            best[c] = below;
        } else {
            let mut stack = children[c].clone();
            while let Some(d) = stack.pop() {
                selected[d] = false;
                stack.extend(children[d].iter().copied());
            }
        }
    }

    // Each point falls out of exactly one cluster; walk up to the selected ancestor.
    let mut raw = vec![NOISE; n];
    for row in rows.iter().filter(|r| r.child < n) {
        let mut c = row.parent - n;
        loop {
            if selected[c] {
                raw[row.child] = c;
                break;
            }
            match parent_of[c] {
                usize::MAX => break,
                p => c = p,
            }
        }
    }

    // Dense labels in order of first member.
    let mut dense = vec![usize::MAX; num_clusters];
    let mut next = 0;
    raw.into_iter()
        .map(|c| {
            if c == NOISE {
                return NOISE;
            }
            if dense[c] == usize::MAX {
                dense[c] = next;
                next += 1;
            }
            dense[c]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cluster(center: &[f32], n: usize, spread: f32) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                center
                    .iter()
                    .enumerate()
                    .map(|(d, &c)| c + spread * ((i * 7 + d * 13) % 11) as f32 / 11.0 - spread / 2.0)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn two_well_separated_clusters() {
        let mut data = make_cluster(&[0.0, 0.0], 20, 0.5);
        data.extend(make_cluster(&[20.0, 20.0], 20, 0.5));

        let labels = Hdbscan::new()
            .with_min_samples(3)
            .with_min_cluster_size(10)
            .fit_predict(&data)
            .unwrap();

        assert_eq!(labels.len(), 40);
        let l0 = labels[0];
        assert_ne!(l0, NOISE);
        assert!(labels[1..20].iter().all(|&l| l == l0));
        let l20 = labels[20];
        assert_ne!(l20, NOISE);
        assert!(labels[21..40].iter().all(|&l| l == l20));
        assert_ne!(l0, l20);
    }

    #[test]
    fn clusters_with_different_densities() {
        let mut data = make_cluster(&[0.0, 0.0], 30, 0.3);
        data.extend(make_cluster(&[50.0, 50.0], 30, 3.0));

        let labels = Hdbscan::new()
            .with_min_samples(3)
            .with_min_cluster_size(5)
            .fit_predict(&data)
            .unwrap();

        let dense = labels[..30].iter().filter(|&&l| l != NOISE).count();
        let sparse = labels[30..].iter().filter(|&&l| l != NOISE).count();
        assert!(dense >= 20, "dense cluster assigned {dense}");
        assert!(sparse >= 15, "sparse cluster assigned {sparse}");
    }

    #[test]
    fn all_noise_when_min_cluster_size_unreachable() {
        let data = vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![20.0, 20.0]];
        let labels = Hdbscan::new()
            .with_min_samples(2)
            .with_min_cluster_size(100)
            .fit_predict(&data)
            .unwrap();
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn non_noise_labels_meet_min_cluster_size() {
        let mut data = make_cluster(&[0.0, 0.0], 25, 0.5);
        data.extend(make_cluster(&[30.0, 30.0], 25, 0.5));
        data.push(vec![15.0, 15.0]);

        let min_cluster_size = 5;
        let labels = Hdbscan::new()
            .with_min_samples(3)
            .with_min_cluster_size(min_cluster_size)
            .fit_predict(&data)
            .unwrap();

        let mut counts = std::collections::HashMap::new();
        for &l in labels.iter().filter(|&&l| l != NOISE) {
            *counts.entry(l).or_insert(0usize) += 1;
        }
        for (&label, &count) in &counts {
            assert!(count >= min_cluster_size, "label {label} has {count} points");
        }
    }

    #[test]
    fn exact_duplicates_form_clusters() {
        let mut data = vec![vec![1.0, 0.0]; 5];
        data.extend(vec![vec![0.0, 1.0]; 5]);
        let labels = Hdbscan::new()
            .with_min_samples(2)
            .with_min_cluster_size(3)
            .with_metric(Metric::Cosine)
            .fit_predict(&data)
            .unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn stable_parent_beats_its_children() {
        // Each group of four splits into two pairs at 0.15, but the group
        // persists far longer than the pairs do.
        let data: Vec<Vec<f32>> = [0.0, 0.1, 0.25, 0.35, 100.0, 100.1, 100.25, 100.35]
            .iter()
            .map(|&x| vec![x])
            .collect();
        let labels = Hdbscan::new()
            .with_min_samples(1)
            .with_min_cluster_size(2)
            .fit_predict(&data)
            .unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn stable_children_beat_their_parent() {
        // Two tight pairs far apart inside one group: the pairs outlive it.
        let data: Vec<Vec<f32>> = [0.0, 0.01, 10.0, 10.01, 1000.0, 1000.01, 1010.0, 1010.01]
            .iter()
            .map(|&x| vec![x])
            .collect();
        let labels = Hdbscan::new()
            .with_min_samples(1)
            .with_min_cluster_size(2)
            .fit_predict(&data)
            .unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn single_point_is_noise() {
        let labels = Hdbscan::new()
            .with_min_cluster_size(2)
            .fit_predict(&[vec![1.0, 2.0]])
            .unwrap();
        assert_eq!(labels, vec![NOISE]);
    }

    #[test]
    fn invalid_parameters() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        assert!(Hdbscan::new().with_min_samples(0).fit_predict(&data).is_err());
        assert!(Hdbscan::new().with_min_cluster_size(1).fit_predict(&data).is_err());
        assert!(Hdbscan::new().fit_predict(&[]).is_err());
        assert!(Hdbscan::new()
            .fit_predict(&[vec![0.0, 0.0], vec![1.0]])
            .is_err());
    }
}
