use serde::{Deserialize, Serialize};

use crate::distance::{pairwise_distance, DistanceMatrix};
use crate::error::{Error, Result};

use super::util::squared_euclidean;

/// Distance used by the vector-space strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Straight-line distance.
    #[default]
    Euclidean,
    /// `1 - cos(a, b)`.
    Cosine,
}

impl Metric {
    /// Full pairwise matrix of `data` under this metric.
    pub fn matrix(self, data: &[Vec<f32>]) -> Result<DistanceMatrix> {
        match self {
            Metric::Cosine => pairwise_distance(data),
            Metric::Euclidean => {
                check_dims(data)?;
                let n = data.len();
                let mut dists = vec![0.0f32; n * n];
                for i in 0..n {
                    for j in (i + 1)..n {
                        let d = squared_euclidean(&data[i], &data[j]).sqrt();
                        dists[i * n + j] = d;
                        dists[j * n + i] = d;
                    }
                }
                Ok(DistanceMatrix::from_raw(n, dists))
            }
        }
    }
}

/// Validate a non-empty dataset of equal-length, non-empty points.
pub(crate) fn check_dims(data: &[Vec<f32>]) -> Result<usize> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    let d = data[0].len();
    if d == 0 {
        return Err(Error::InvalidParameter {
            name: "dimension",
            message: "must be at least 1",
        });
    }
    for point in data.iter().skip(1) {
        if point.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: point.len(),
            });
        }
    }
    Ok(d)
}
