//! Locally calibrated conformal prediction intervals for regression.
//!
//! Wraps any fitted point-prediction model and a calibration dataset into a
//! predictor that emits [lower, upper] intervals with finite-sample coverage
//! guarantees that hold approximately per-region of the covariate space, not
//! only on marginal average. The covariate space is partitioned (tree
//! leaves, k-means clusters, or k nearest neighbors) and interval widths are
//! set from the finite-sample corrected quantile of the conformity scores in
//! the locally relevant region.

// Modules
pub mod calibration;
pub mod config;
pub mod constants;
pub mod data;
pub mod errors;
pub mod metrics;
pub mod partition;
pub mod predictor;
pub mod scorer;
pub mod utils;

// Individual classes, and functions
pub use calibration::{CalibrationDiagnostics, QuantileTable, RegionQuantile};
pub use config::{CalibratorConfig, CalibratorIO};
pub use data::Matrix;
pub use errors::LocartError;
pub use metrics::{evaluate_coverage, CoverageReport};
pub use partition::{Partition, PartitionStrategy, RegionAssignment};
pub use predictor::{CalibratorState, IntervalPredictor, PointPredictor, PredictionInterval};
pub use scorer::Scorer;
