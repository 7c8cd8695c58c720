//! k-NN partition
//!
//! The non-discretized strategy: there are no fixed regions. For a query
//! point the "region" is the set of its k nearest calibration points, and
//! the quantile is computed on demand over that neighbor set. The stored
//! covariates are the calibration split, since those rows carry the
//! conformity scores the quantile is taken over.
use crate::data::Matrix;
use crate::errors::LocartError;
use serde::{Deserialize, Serialize};

/// Fitted k-NN neighbor index over the calibration covariates.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct KnnPartition {
    pub k: usize,
    /// Calibration covariates, row-major.
    points: Vec<f64>,
    rows: usize,
    pub n_features: usize,
}

impl KnnPartition {
    /// Store the calibration covariates for neighbor queries.
    ///
    /// * `x_cal` - Calibration covariates.
    /// * `k` - Neighborhood size; clamped to the number of rows at query time.
    pub fn fit(x_cal: &Matrix<f64>, k: usize) -> Result<Self, LocartError> {
        if x_cal.rows == 0 {
            return Err(LocartError::InsufficientData { needed: 1, got: 0 });
        }
        let mut points = Vec::with_capacity(x_cal.rows * x_cal.cols);
        for i in 0..x_cal.rows {
            points.extend(x_cal.get_row(i));
        }
        Ok(KnnPartition {
            k,
            points,
            rows: x_cal.rows,
            n_features: x_cal.cols,
        })
    }

    /// Indices of the k nearest calibration rows, closest first.
    /// Distance ties break toward the lower row index, so results are
    /// deterministic for a fixed fitted state.
    pub fn neighbors(&self, row: &[f64]) -> Result<Vec<usize>, LocartError> {
        if row.len() != self.n_features {
            return Err(LocartError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let mut dists: Vec<(f64, usize)> = (0..self.rows)
            .map(|i| {
                let p = &self.points[i * self.n_features..(i + 1) * self.n_features];
                let d: f64 = p.iter().zip(row.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                (d, i)
            })
            .collect();
        dists.sort_unstable_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        Ok(dists.into_iter().take(self.k.min(self.rows)).map(|(_, i)| i).collect())
    }

    pub fn n_points(&self) -> usize {
        self.rows
    }
}
