//! Pairwise cosine distances.
//!
//! `d(a, b) = 1 - cos(a, b)`, which lies in `[0, 2]`. A zero vector has
//! similarity 0 with everything, so its distance to any other vector is 1.
//! Products are accumulated in `f64`; a distance within [`ROUNDING_EPSILON`] of
//! zero is snapped to exactly zero so identical vectors are at distance 0.
//! Rows of the upper triangle are computed in parallel with rayon and then
//! mirrored, so the matrix is exactly symmetric regardless of scheduling.

use rayon::prelude::*;

use crate::cluster::NOISE;
use crate::error::{Error, Result};

/// Upper bound of the cosine distance.
pub const MAX_COSINE_DISTANCE: f32 = 2.0;

/// Distances below this are treated as rounding noise around zero.
pub const ROUNDING_EPSILON: f64 = 1e-6;

/// Dense symmetric N×N distance matrix with a zero diagonal, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    /// Build from explicit rows.
    ///
    /// Rows must form a square matrix of finite, non-negative values with a zero
    /// diagonal; the result is symmetrized by averaging `(i, j)` and `(j, i)`.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        let mut data = Vec::with_capacity(n * n);
        for row in rows {
            if row.len() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: row.len(),
                });
            }
            if row.iter().any(|d| !d.is_finite() || *d < 0.0) {
                return Err(Error::InvalidParameter {
                    name: "distance",
                    message: "must be finite and non-negative",
                });
            }
            data.extend_from_slice(row);
        }
        for i in 0..n {
            data[i * n + i] = 0.0;
            for j in (i + 1)..n {
                let d = 0.5 * (data[i * n + j] + data[j * n + i]);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Ok(Self { n, data })
    }

    /// Wrap row-major data already known to be symmetric with a zero diagonal.
    pub(crate) fn from_raw(n: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), n * n);
        Self { n, data }
    }

    /// Number of rows (and columns).
    pub fn len(&self) -> usize {
        self.n
    }

    /// True if the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between items `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.n + j]
    }

    /// Row `i`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Strict upper triangle in row-major order, `N(N-1)/2` values.
    pub fn upper_triangle(&self) -> Vec<f32> {
        let n = self.n;
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            out.extend_from_slice(&self.data[i * n + i + 1..(i + 1) * n]);
        }
        out
    }
}

/// Cosine distance matrix over `vectors`.
pub fn pairwise_distance(vectors: &[Vec<f32>]) -> Result<DistanceMatrix> {
    let n = vectors.len();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    let d = vectors[0].len();
    for v in vectors.iter().skip(1) {
        if v.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: v.len(),
            });
        }
    }

    let norms: Vec<f64> = vectors
        .par_iter()
        .map(|v| v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt())
        .collect();

    let mut data = vec![0.0f32; n * n];
    data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for j in (i + 1)..n {
            row[j] = cosine_distance(&vectors[i], &vectors[j], norms[i], norms[j]);
        }
    });
    for i in 0..n {
        for j in (i + 1)..n {
            data[j * n + i] = data[i * n + j];
        }
    }

    Ok(DistanceMatrix { n, data })
}

#[inline]
fn cosine_distance(a: &[f32], b: &[f32], norm_a: f64, norm_b: f64) -> f32 {
    let denom = norm_a * norm_b;
    let sim = if denom > 0.0 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| f64::from(x) * f64::from(y))
            .sum::<f64>()
            / denom
    } else {
        0.0
    };
    let d = 1.0 - sim;
    if d < ROUNDING_EPSILON {
        return 0.0;
    }
    // Rounding can push 1 - sim slightly past the metric's maximum.
    (d as f32).min(MAX_COSINE_DISTANCE)
}

/// Mean silhouette coefficient of `labels` under `matrix`.
///
/// Noise points are ignored. Returns `None` unless at least two clusters
/// remain. Points in singleton clusters score 0.
pub fn silhouette_score(matrix: &DistanceMatrix, labels: &[usize]) -> Option<f64> {
    let n = matrix.len();
    if labels.len() != n {
        return None;
    }
    let mut ids: Vec<usize> = labels.iter().copied().filter(|&l| l != NOISE).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() < 2 {
        return None;
    }
    let slot = |label: usize| ids.binary_search(&label).ok();

    let mut sizes = vec![0usize; ids.len()];
    for &l in labels {
        if let Some(s) = slot(l) {
            sizes[s] += 1;
        }
    }

    let mut total = 0.0f64;
    let mut counted = 0usize;
    for i in 0..n {
        let Some(own) = slot(labels[i]) else {
            continue;
        };
        counted += 1;
        if sizes[own] < 2 {
            continue;
        }
        let mut sums = vec![0.0f64; ids.len()];
        for j in 0..n {
            if i == j {
                continue;
            }
            if let Some(s) = slot(labels[j]) {
                sums[s] += f64::from(matrix.get(i, j));
            }
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..ids.len())
            .filter(|&s| s != own)
            .map(|s| sums[s] / sizes[s] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    if counted == 0 {
        None
    } else {
        Some(total / counted as f64)
    }
}
