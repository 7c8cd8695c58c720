//! Coverage evaluation
//!
//! Read-only checks of empirical coverage and interval width on held-out
//! data, both marginal and per region.
use crate::errors::LocartError;
use crate::predictor::PredictionInterval;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Empirical coverage and width statistics over a held-out test set.
///
/// Per-region maps only contain regions with at least one test example;
/// regions absent from the test set are omitted, not reported as zero.
/// Intervals without a region id (the k-NN strategy) contribute to the
/// marginal statistics only.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CoverageReport {
    /// Fraction of test rows with y inside [lower, upper].
    pub marginal_coverage: f64,
    /// Mean of upper - lower over all test rows.
    pub average_width: f64,
    pub per_region_coverage: HashMap<usize, f64>,
    pub per_region_width: HashMap<usize, f64>,
    pub n_test: usize,
}

/// Evaluate predicted intervals against ground-truth responses.
///
/// * `intervals` - Output of a batch prediction, in test-row order.
/// * `y` - Ground-truth responses, same length.
pub fn evaluate_coverage(intervals: &[PredictionInterval], y: &[f64]) -> Result<CoverageReport, LocartError> {
    if intervals.len() != y.len() {
        return Err(LocartError::DimensionMismatch {
            expected: intervals.len(),
            actual: y.len(),
        });
    }
    if intervals.is_empty() {
        return Err(LocartError::InsufficientData { needed: 1, got: 0 });
    }

    let mut covered = 0usize;
    let mut width_sum = 0.0;
    let mut region_covered: HashMap<usize, usize> = HashMap::new();
    let mut region_width: HashMap<usize, f64> = HashMap::new();
    let mut region_count: HashMap<usize, usize> = HashMap::new();

    for (iv, y_i) in intervals.iter().zip(y.iter()) {
        let inside = *y_i >= iv.lower && *y_i <= iv.upper;
        if inside {
            covered += 1;
        }
        let width = iv.upper - iv.lower;
        width_sum += width;
        if let Some(region) = iv.region {
            *region_count.entry(region).or_insert(0) += 1;
            *region_width.entry(region).or_insert(0.0) += width;
            if inside {
                *region_covered.entry(region).or_insert(0) += 1;
            }
        }
    }

    let n = intervals.len();
    let per_region_coverage: HashMap<usize, f64> = region_count
        .iter()
        .map(|(r, c)| (*r, region_covered.get(r).copied().unwrap_or(0) as f64 / *c as f64))
        .collect();
    let per_region_width: HashMap<usize, f64> = region_count
        .iter()
        .map(|(r, c)| (*r, region_width[r] / *c as f64))
        .collect();

    Ok(CoverageReport {
        marginal_coverage: covered as f64 / n as f64,
        average_width: width_sum / n as f64,
        per_region_coverage,
        per_region_width,
        n_test: n,
    })
}
