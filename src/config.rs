//! Calibrator configuration
//!
//! Hyperparameters for the interval predictor, plus the IO trait used to
//! persist fitted state as JSON.
use crate::constants::{DEFAULT_MAX_DEPTH, DEFAULT_MIN_SAMPLES_LEAF};
use crate::errors::LocartError;
use crate::partition::PartitionStrategy;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hyperparameters of a local conformal calibration fit.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct CalibratorConfig {
    /// Miscoverage level, the target probability of the response falling
    /// outside the interval. Must lie strictly inside (0, 1).
    pub alpha: f64,
    /// Space-partitioning rule and its hyperparameters.
    pub strategy: PartitionStrategy,
    /// Regions with fewer calibration examples fall back to the global
    /// pooled quantile. `None` resolves to ⌈1/α⌉ at fit time.
    pub min_region_size: Option<usize>,
    /// Interpolate between order statistics instead of taking the ceiling
    /// rank. Off by default (classic conformal convention).
    pub interpolate_quantiles: bool,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        CalibratorConfig {
            alpha: 0.1,
            strategy: PartitionStrategy::Tree {
                max_depth: DEFAULT_MAX_DEPTH,
                min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            },
            min_region_size: None,
            interpolate_quantiles: false,
        }
    }
}

impl CalibratorConfig {
    /// Set the miscoverage level.
    pub fn set_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the partition strategy.
    pub fn set_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the minimum region size before falling back to the global quantile.
    pub fn set_min_region_size(mut self, min_region_size: Option<usize>) -> Self {
        self.min_region_size = min_region_size;
        self
    }

    /// Enable or disable interpolated quantiles.
    pub fn set_interpolate_quantiles(mut self, interpolate: bool) -> Self {
        self.interpolate_quantiles = interpolate;
        self
    }

    /// Validate all hyperparameters, raising `InvalidParameter` on the
    /// first violation.
    pub fn validate(&self) -> Result<(), LocartError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha >= 1.0 {
            return Err(LocartError::InvalidParameter(
                "alpha".to_string(),
                "a value in (0, 1)".to_string(),
                self.alpha.to_string(),
            ));
        }
        self.strategy.validate()?;
        if let Some(0) = self.min_region_size {
            return Err(LocartError::InvalidParameter(
                "min_region_size".to_string(),
                "a positive integer or None".to_string(),
                "0".to_string(),
            ));
        }
        Ok(())
    }
}

/// IO
pub trait CalibratorIO: Serialize + DeserializeOwned + Sized {
    /// Save a fitted calibrator as a json object to a file.
    ///
    /// * `path` - Path to save the calibrator.
    fn save_calibrator<P: AsRef<Path>>(&self, path: P) -> Result<(), LocartError> {
        fs::write(path, self.json_dump()?).map_err(|e| LocartError::UnableToWrite(e.to_string()))
    }

    /// Dump a calibrator as a json object.
    fn json_dump(&self) -> Result<String, LocartError> {
        serde_json::to_string(self).map_err(|e| LocartError::UnableToWrite(e.to_string()))
    }

    /// Load a calibrator from a json string.
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, LocartError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| LocartError::UnableToRead(e.to_string()))
    }

    /// Load a calibrator from a path to a json object.
    ///
    /// * `path` - Path to load the calibrator from.
    fn load_calibrator<P: AsRef<Path>>(path: P) -> Result<Self, LocartError> {
        let json_str = fs::read_to_string(path).map_err(|e| LocartError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl CalibratorIO for CalibratorConfig {}
