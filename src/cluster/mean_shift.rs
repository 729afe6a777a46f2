//! Mean-shift clustering with a flat kernel.
//!
//! Every point seeds a candidate that repeatedly moves to the mean of the
//! points within `bandwidth` of it. Converged candidates are deduplicated,
//! most populated first, and each point joins its nearest surviving center.
//! The number of clusters is discovered, not configured.

use rayon::prelude::*;

use super::metric::check_dims;
use super::traits::Clustering;
use super::util::{nearest, squared_euclidean};
use crate::error::{Error, Result};

const MAX_ITER: usize = 300;
const DEFAULT_QUANTILE: f32 = 0.3;

/// Mean-shift clusterer.
#[derive(Debug, Clone, Default)]
pub struct MeanShift {
    bandwidth: Option<f32>,
}

impl MeanShift {
    /// Mean-shift with the bandwidth estimated from the data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the kernel radius instead of estimating it.
    pub fn with_bandwidth(mut self, bandwidth: f32) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Run mean-shift and return the surviving centers with the labels.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<(Vec<Vec<f32>>, Vec<usize>)> {
        check_dims(data)?;
        let bandwidth = match self.bandwidth {
            Some(bw) if bw.is_finite() && bw > 0.0 => bw,
            Some(_) => {
                return Err(Error::InvalidParameter {
                    name: "bandwidth",
                    message: "must be positive",
                })
            }
            None => estimate_bandwidth(data, DEFAULT_QUANTILE)?,
        };
        let radius2 = bandwidth * bandwidth;
        let stop2 = (1e-3 * bandwidth) * (1e-3 * bandwidth);

        let converged: Vec<(Vec<f32>, usize)> = data
            .par_iter()
            .map(|seed| shift_seed(data, seed, radius2, stop2))
            .collect();

        // Stable sort keeps seed order among equal populations.
        let mut order: Vec<usize> = (0..converged.len()).collect();
        order.sort_by(|&a, &b| converged[b].1.cmp(&converged[a].1));

        let mut centers: Vec<Vec<f32>> = Vec::new();
        for idx in order {
            let candidate = &converged[idx].0;
            if centers
                .iter()
                .all(|c| squared_euclidean(c, candidate) >= radius2)
            {
                centers.push(candidate.clone());
            }
        }

        let labels = data.iter().map(|p| nearest(p, &centers).0).collect();
        tracing::debug!(
            items = data.len(),
            bandwidth,
            clusters = centers.len(),
            "mean-shift finished"
        );
        Ok((centers, labels))
    }
}

/// Shift one seed to convergence; returns the center and how many points it covers.
fn shift_seed(data: &[Vec<f32>], seed: &[f32], radius2: f32, stop2: f32) -> (Vec<f32>, usize) {
    let dim = seed.len();
    let mut center = seed.to_vec();
    let mut population = 0;
    for _ in 0..MAX_ITER {
        let mut sum = vec![0.0f64; dim];
        let mut count = 0usize;
        for p in data {
            if squared_euclidean(p, &center) <= radius2 {
                count += 1;
                for (s, &x) in sum.iter_mut().zip(p) {
                    *s += f64::from(x);
                }
            }
        }
        population = count;
        if count == 0 {
            break;
        }
        let next: Vec<f32> = sum.iter().map(|s| (s / count as f64) as f32).collect();
        let moved = squared_euclidean(&next, &center);
        center = next;
        if moved < stop2 {
            break;
        }
    }
    (center, population)
}

/// Mean distance from each point to its `quantile · n`-th nearest neighbor.
///
/// The neighbor count includes the point itself and is at least one. When
/// every point coincides the estimate is a small positive floor.
pub fn estimate_bandwidth(data: &[Vec<f32>], quantile: f32) -> Result<f32> {
    check_dims(data)?;
    if quantile.is_nan() || quantile <= 0.0 || quantile > 1.0 {
        return Err(Error::InvalidParameter {
            name: "quantile",
            message: "must be in (0, 1]",
        });
    }
    let n = data.len();
    let k = ((n as f32 * quantile) as usize).clamp(1, n);

    let total: f64 = data
        .par_iter()
        .map(|p| {
            let mut d: Vec<f32> = data
                .iter()
                .map(|q| squared_euclidean(p, q).sqrt())
                .collect();
            d.sort_by(|a, b| a.total_cmp(b));
            f64::from(d[k - 1])
        })
        .sum();
    let bw = (total / n as f64) as f32;
    Ok(if bw > 0.0 { bw } else { 1e-6 })
}

impl Clustering for MeanShift {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.1)
    }

    fn n_clusters(&self) -> usize {
        0
    }
}
