//! Interval predictor
//!
//! Orchestrates the calibration fit and interval prediction: routes a query
//! point through the fitted partition, looks up (or computes) the local
//! quantile, and combines it with the point prediction into an interval.
use crate::calibration::{build_quantile_table, CalibrationDiagnostics, QuantileTable};
use crate::config::{CalibratorConfig, CalibratorIO};
use crate::constants::DIFFICULTY_FLOOR;
use crate::data::Matrix;
use crate::errors::LocartError;
use crate::partition::{Partition, PartitionStrategy, RegionAssignment};
use crate::scorer::Scorer;
use crate::utils::{conformal_quantile, min_calibration_size, validate_finite, validate_same_len};
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A fitted point-predictor (or difficulty estimator). The model is an
/// opaque collaborator; its own fitting is out of scope.
pub trait PointPredictor: Send + Sync {
    /// Predict one scalar output per row of `data`.
    fn predict(&self, data: &Matrix<f64>) -> Vec<f64>;
}

/// A single prediction interval. Owns no calibration state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionInterval {
    pub lower: f64,
    pub upper: f64,
    /// The underlying point prediction.
    pub prediction: f64,
    /// Region the query landed in, `None` for the k-NN strategy.
    pub region: Option<usize>,
}

/// Per-region quantiles, either precomputed (discrete strategies) or
/// computed on demand over a neighbor set (k-NN).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum LocalQuantiles {
    Table(QuantileTable),
    /// Calibration conformity scores, indexed by the neighbor ids the k-NN
    /// partition returns.
    OnDemand { scores: Vec<f64> },
}

/// Everything a calibration fit produces. Serializable, so a fitted
/// calibrator can be persisted and reattached to its models later.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CalibratorState {
    pub cfg: CalibratorConfig,
    pub partition: Partition,
    pub quantiles: LocalQuantiles,
    /// Table diagnostics; `None` for the k-NN strategy.
    pub diagnostics: Option<CalibrationDiagnostics>,
    pub n_features: usize,
    /// Whether a difficulty estimator was configured at fit time.
    pub uses_difficulty: bool,
}

impl CalibratorIO for CalibratorState {}

/// Locally calibrated conformal interval predictor.
///
/// Fit is one-shot: `fit` consumes the unfitted value and returns a new,
/// immutable fitted one. Prediction and evaluation take `&self`, so reads
/// may run concurrently; there is no in-place refit.
pub struct IntervalPredictor<'a> {
    pub cfg: CalibratorConfig,
    model: &'a dyn PointPredictor,
    difficulty: Option<&'a dyn PointPredictor>,
    state: Option<CalibratorState>,
}

impl<'a> IntervalPredictor<'a> {
    /// Create an unfitted predictor around a fitted point-prediction model.
    pub fn new(cfg: CalibratorConfig, model: &'a dyn PointPredictor) -> Self {
        IntervalPredictor {
            cfg,
            model,
            difficulty: None,
            state: None,
        }
    }

    /// Attach a difficulty estimator. Conformity scores are then normalized
    /// by the floored difficulty, and interval widths scale with it.
    pub fn set_difficulty_estimator(mut self, difficulty: &'a dyn PointPredictor) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    /// Reattach models to a previously persisted fitted state.
    pub fn from_state(
        state: CalibratorState,
        model: &'a dyn PointPredictor,
        difficulty: Option<&'a dyn PointPredictor>,
    ) -> Result<Self, LocartError> {
        state.cfg.validate()?;
        if state.uses_difficulty && difficulty.is_none() {
            return Err(LocartError::InvalidParameter(
                "difficulty".to_string(),
                "a difficulty estimator (the state was fit with one)".to_string(),
                "None".to_string(),
            ));
        }
        Ok(IntervalPredictor {
            cfg: state.cfg,
            model,
            difficulty,
            state: Some(state),
        })
    }

    /// Fit the calibrator and return a new immutable fitted value.
    ///
    /// The partition-training split (`x_part`, `y_part`) must be disjoint
    /// from the calibration split (`x_cal`, `y_cal`) to avoid information
    /// leakage; the k-NN strategy ignores the partition-training split and
    /// queries neighbors against the calibration covariates. The partition
    /// is trained on difficulty-normalized conformity scores, the same
    /// scores the quantile table aggregates.
    pub fn fit(
        mut self,
        x_part: &Matrix<f64>,
        y_part: &[f64],
        x_cal: &Matrix<f64>,
        y_cal: &[f64],
    ) -> Result<Self, LocartError> {
        self.cfg.validate()?;
        validate_same_len(x_part.rows, y_part.len())?;
        validate_same_len(x_cal.rows, y_cal.len())?;
        if x_part.cols != x_cal.cols {
            return Err(LocartError::DimensionMismatch {
                expected: x_part.cols,
                actual: x_cal.cols,
            });
        }
        validate_finite(x_part.data)?;
        validate_finite(x_cal.data)?;

        let scorer = match self.difficulty {
            Some(_) => Scorer::Normalized {
                epsilon: DIFFICULTY_FLOOR,
            },
            None => Scorer::Absolute,
        };
        let scores_part = self.conformity_scores(&scorer, x_part, y_part)?;
        let scores_cal = self.conformity_scores(&scorer, x_cal, y_cal)?;

        let partition = self.cfg.strategy.fit(x_part, &scores_part, x_cal)?;

        let (quantiles, diagnostics) = match self.cfg.strategy {
            PartitionStrategy::Knn { .. } => {
                let needed = min_calibration_size(self.cfg.alpha);
                if scores_cal.len() < needed {
                    return Err(LocartError::InsufficientData {
                        needed,
                        got: scores_cal.len(),
                    });
                }
                (LocalQuantiles::OnDemand { scores: scores_cal }, None)
            }
            _ => {
                let mut labels = Vec::with_capacity(x_cal.rows);
                for i in 0..x_cal.rows {
                    match partition.assign(&x_cal.get_row(i))? {
                        RegionAssignment::Region(r) => labels.push(r),
                        RegionAssignment::Neighbors(_) => unreachable!("discrete strategy returned neighbors"),
                    }
                }
                let (table, diag) = build_quantile_table(
                    &scores_cal,
                    &labels,
                    self.cfg.alpha,
                    self.cfg.min_region_size,
                    self.cfg.interpolate_quantiles,
                )?;
                (LocalQuantiles::Table(table), Some(diag))
            }
        };

        info!(
            "Fit complete: {} calibration examples, alpha {}.",
            y_cal.len(),
            self.cfg.alpha
        );
        self.state = Some(CalibratorState {
            cfg: self.cfg,
            partition,
            quantiles,
            diagnostics,
            n_features: x_cal.cols,
            uses_difficulty: self.difficulty.is_some(),
        });
        Ok(self)
    }

    fn conformity_scores(&self, scorer: &Scorer, x: &Matrix<f64>, y: &[f64]) -> Result<Vec<f64>, LocartError> {
        let preds = self.model.predict(x);
        validate_same_len(x.rows, preds.len())?;
        let difficulty = match self.difficulty {
            Some(d) => {
                let vals = d.predict(x);
                validate_same_len(x.rows, vals.len())?;
                Some(vals)
            }
            None => None,
        };
        scorer.score_batch(y, &preds, difficulty.as_deref())
    }

    /// Predict intervals for a batch, preserving input row order. One
    /// malformed row aborts the whole batch.
    ///
    /// * `data` - Covariate matrix, one interval per row.
    /// * `parallel` - Map rows across the rayon thread pool.
    pub fn predict_intervals(&self, data: &Matrix<f64>, parallel: bool) -> Result<Vec<PredictionInterval>, LocartError> {
        let state = self.state.as_ref().ok_or(LocartError::NotFitted("interval predictor"))?;
        if data.cols != state.n_features {
            return Err(LocartError::DimensionMismatch {
                expected: state.n_features,
                actual: data.cols,
            });
        }
        validate_finite(data.data)?;

        let preds = self.model.predict(data);
        validate_same_len(data.rows, preds.len())?;
        let difficulty = match (state.uses_difficulty, self.difficulty) {
            (true, Some(d)) => {
                let vals = d.predict(data);
                validate_same_len(data.rows, vals.len())?;
                validate_finite(&vals)?;
                Some(vals)
            }
            (true, None) => {
                return Err(LocartError::NotFitted("difficulty estimator"));
            }
            (false, _) => None,
        };

        let row_interval = |i: usize| -> Result<PredictionInterval, LocartError> {
            let row = data.get_row(i);
            let (q, region) = match (state.partition.assign(&row)?, &state.quantiles) {
                (RegionAssignment::Region(r), LocalQuantiles::Table(table)) => (table.quantile(r), Some(r)),
                (RegionAssignment::Neighbors(ids), LocalQuantiles::OnDemand { scores }) => {
                    let neighbor_scores: Vec<f64> = ids.iter().map(|&j| scores[j]).collect();
                    let q = conformal_quantile(&neighbor_scores, state.cfg.alpha, state.cfg.interpolate_quantiles)?;
                    (q, None)
                }
                _ => {
                    return Err(LocartError::InvalidParameter(
                        "state".to_string(),
                        "a partition matching its quantile store".to_string(),
                        "a mismatched pair".to_string(),
                    ))
                }
            };
            let q = match &difficulty {
                Some(vals) => q * vals[i].max(DIFFICULTY_FLOOR),
                None => q,
            };
            Ok(PredictionInterval {
                lower: preds[i] - q,
                upper: preds[i] + q,
                prediction: preds[i],
                region,
            })
        };

        if parallel {
            (0..data.rows).into_par_iter().map(row_interval).collect()
        } else {
            (0..data.rows).map(row_interval).collect()
        }
    }

    /// Predict the interval for a single covariate row.
    pub fn predict_row(&self, row: &[f64]) -> Result<PredictionInterval, LocartError> {
        let state = self.state.as_ref().ok_or(LocartError::NotFitted("interval predictor"))?;
        if row.len() != state.n_features {
            return Err(LocartError::DimensionMismatch {
                expected: state.n_features,
                actual: row.len(),
            });
        }
        // A single row is a valid 1 x d column-major matrix.
        let data = Matrix::new(row, 1, row.len());
        let mut intervals = self.predict_intervals(&data, false)?;
        Ok(intervals.remove(0))
    }

    /// The fitted state, for persistence or inspection.
    pub fn state(&self) -> Result<&CalibratorState, LocartError> {
        self.state.as_ref().ok_or(LocartError::NotFitted("interval predictor"))
    }

    /// The per-region quantile table, `None` for the k-NN strategy or
    /// before fit.
    pub fn quantile_table(&self) -> Option<&QuantileTable> {
        match self.state.as_ref().map(|s| &s.quantiles) {
            Some(LocalQuantiles::Table(table)) => Some(table),
            _ => None,
        }
    }

    /// Calibration diagnostics, `None` for the k-NN strategy or before fit.
    pub fn diagnostics(&self) -> Option<&CalibrationDiagnostics> {
        self.state.as_ref().and_then(|s| s.diagnostics.as_ref())
    }
}
