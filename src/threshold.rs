//! Distance cutoff estimation with a two-component Gaussian mixture.
//!
//! In a corpus with real failure classes the pairwise distances are bimodal:
//! a low mode from pairs inside the same class and a high mode from pairs
//! across classes. Fitting a 1-D mixture of two Gaussians to the strict upper
//! triangle of the distance matrix and taking the lower component mean gives a
//! cutoff for agglomerative clustering without a hand-tuned parameter.
//!
//! # Fitting
//!
//! 1. Seeded k-means++ picks two initial centers; 1-D Lloyd iterations refine
//!    them into a hard split of the sample.
//! 2. Weights, means and variances are initialized from that split.
//! 3. EM runs until the mean log-likelihood changes by less than `tol` or
//!    `max_iter` is reached. `reg_covar` is added to every variance so a
//!    component collapsing onto a single value stays well defined.

use rand::prelude::*;

use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};

/// Parameters of the mixture fit.
#[derive(Debug, Clone)]
pub struct ThresholdEstimator {
    seed: u64,
    max_iter: usize,
    tol: f64,
    reg_covar: f64,
}

impl Default for ThresholdEstimator {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
        }
    }
}

/// A fitted two-component mixture, components ordered by mean.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureFit {
    /// Mixing weights (sum to 1).
    pub weights: [f64; 2],
    /// Component means, ascending.
    pub means: [f64; 2],
    /// Component variances.
    pub variances: [f64; 2],
    /// EM iterations run.
    pub n_iter: usize,
    /// Whether the log-likelihood change fell below the tolerance.
    pub converged: bool,
}

impl ThresholdEstimator {
    /// Default estimator: seed 42, 100 iterations, tolerance 1e-3.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the RNG seed used for initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the EM iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance on the mean log-likelihood.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Distance cutoff for `matrix`: the lower component mean, clamped into the
    /// observed range of distances.
    pub fn estimate(&self, matrix: &DistanceMatrix) -> Result<f32> {
        let sample = matrix.upper_triangle();
        let fit = self.fit(&sample, matrix.len())?;

        let (lo, hi) = sample
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &d| {
                (lo.min(d), hi.max(d))
            });
        let threshold = (fit.means[0] as f32).clamp(lo, hi);
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::Other(format!(
                "mixture fit produced an unusable threshold {threshold}"
            )));
        }

        tracing::debug!(
            threshold,
            low_mean = fit.means[0],
            high_mean = fit.means[1],
            low_weight = fit.weights[0],
            n_iter = fit.n_iter,
            converged = fit.converged,
            "estimated distance threshold"
        );
        Ok(threshold)
    }

    /// Fit the mixture to a 1-D sample drawn from `n_items` items.
    pub fn fit(&self, sample: &[f32], n_items: usize) -> Result<MixtureFit> {
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }
        if self.tol.is_nan() || self.tol <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "tol",
                message: "must be positive",
            });
        }
        if sample.iter().any(|d| !d.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "sample",
                message: "must contain only finite values",
            });
        }

        let mut sorted: Vec<f32> = sample.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted.dedup();
        if sorted.len() < 2 {
            return Err(Error::InsufficientData {
                distinct: sorted.len(),
                n_items,
            });
        }

        let x: Vec<f64> = sample.iter().map(|&d| f64::from(d)).collect();
        let n = x.len() as f64;

        let assignment = self.kmeans_split(&x);
        let mut resp: Vec<[f64; 2]> = assignment
            .iter()
            .map(|&k| if k == 0 { [1.0, 0.0] } else { [0.0, 1.0] })
            .collect();
        let (mut weights, mut means, mut variances) = self.m_step(&x, &resp);

        let mut prev = f64::NEG_INFINITY;
        let mut converged = false;
        let mut n_iter = 0;
        for _ in 0..self.max_iter {
            n_iter += 1;
            let ll = e_step(&x, &weights, &means, &variances, &mut resp) / n;
            (weights, means, variances) = self.m_step(&x, &resp);
            if (ll - prev).abs() < self.tol {
                converged = true;
                break;
            }
            prev = ll;
        }

        if means[1] < means[0] {
            weights.swap(0, 1);
            means.swap(0, 1);
            variances.swap(0, 1);
        }
        Ok(MixtureFit {
            weights,
            means,
            variances,
            n_iter,
            converged,
        })
    }

    /// Hard two-way split of `x` by seeded k-means++ and Lloyd iterations.
    fn kmeans_split(&self, x: &[f64]) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let first = x[rng.random_range(0..x.len())];

        let weights: Vec<f64> = x.iter().map(|v| (v - first) * (v - first)).collect();
        let total: f64 = weights.iter().sum();
        let target = rng.random::<f64>() * total;
        let mut acc = 0.0;
        let mut second = first;
        for (v, w) in x.iter().zip(&weights) {
            if *w == 0.0 {
                continue;
            }
            second = *v;
            acc += w;
            if acc > target {
                break;
            }
        }

        let mut centers = [first.min(second), first.max(second)];
        let mut labels = vec![usize::MAX; x.len()];
        for _ in 0..self.max_iter {
            let mut changed = false;
            for (label, v) in labels.iter_mut().zip(x) {
                let k = if (v - centers[1]).abs() < (v - centers[0]).abs() {
                    1
                } else {
                    0
                };
                if *label != k {
                    *label = k;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            let mut sums = [0.0f64; 2];
            let mut counts = [0usize; 2];
            for (&k, v) in labels.iter().zip(x) {
                sums[k] += v;
                counts[k] += 1;
            }
            for k in 0..2 {
                if counts[k] > 0 {
                    centers[k] = sums[k] / counts[k] as f64;
                }
            }
        }
        labels
    }

    fn m_step(&self, x: &[f64], resp: &[[f64; 2]]) -> ([f64; 2], [f64; 2], [f64; 2]) {
        let n = x.len() as f64;
        let mut nk = [0.0f64; 2];
        let mut sum = [0.0f64; 2];
        for (r, v) in resp.iter().zip(x) {
            for k in 0..2 {
                nk[k] += r[k];
                sum[k] += r[k] * v;
            }
        }

        let mut means = [0.0f64; 2];
        for k in 0..2 {
            means[k] = if nk[k] > 0.0 { sum[k] / nk[k] } else { 0.0 };
        }

        let mut sq = [0.0f64; 2];
        for (r, v) in resp.iter().zip(x) {
            for k in 0..2 {
                let d = v - means[k];
                sq[k] += r[k] * d * d;
            }
        }

        let mut variances = [self.reg_covar; 2];
        let mut weights = [0.0f64; 2];
        for k in 0..2 {
            if nk[k] > 0.0 {
                variances[k] += sq[k] / nk[k];
            }
            weights[k] = nk[k] / n;
        }
        (weights, means, variances)
    }
}

/// Update responsibilities in place; returns the total log-likelihood.
fn e_step(
    x: &[f64],
    weights: &[f64; 2],
    means: &[f64; 2],
    variances: &[f64; 2],
    resp: &mut [[f64; 2]],
) -> f64 {
    let ln_2pi = (2.0 * std::f64::consts::PI).ln();
    let mut total = 0.0;
    for (r, v) in resp.iter_mut().zip(x) {
        let mut lp = [f64::NEG_INFINITY; 2];
        for k in 0..2 {
            if weights[k] > 0.0 {
                let d = v - means[k];
                lp[k] = weights[k].ln() - 0.5 * (ln_2pi + variances[k].ln() + d * d / variances[k]);
            }
        }
        let max = lp[0].max(lp[1]);
        let lse = max + ((lp[0] - max).exp() + (lp[1] - max).exp()).ln();
        for k in 0..2 {
            r[k] = (lp[k] - lse).exp();
        }
        total += lse;
    }
    total
}

/// Estimate a cutoff with the default estimator.
pub fn estimate_threshold(matrix: &DistanceMatrix) -> Result<f32> {
    ThresholdEstimator::default().estimate(matrix)
}
