//! Shared numeric helpers: the finite-sample conformal quantile and input
//! validation used by the calibration and prediction paths.
use crate::errors::LocartError;

/// Finite-sample corrected empirical quantile of a set of conformity scores.
///
/// Computes the smallest score such that at least ⌈(n+1)(1−α)⌉ of the `n`
/// scores are less than or equal to it. When the requested rank exceeds `n`
/// the maximum score is returned, so the validity bound is never skipped.
///
/// * `scores` - Conformity scores, need not be sorted. Must be non-empty.
/// * `alpha` - Miscoverage level in (0, 1).
/// * `interpolate` - When true, linearly interpolate between the adjacent
///   order statistics at rank (n+1)(1−α) instead of taking the ceiling rank.
pub fn conformal_quantile(scores: &[f64], alpha: f64, interpolate: bool) -> Result<f64, LocartError> {
    if scores.is_empty() {
        return Err(LocartError::InsufficientData { needed: 1, got: 0 });
    }
    let mut sorted = scores.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let target = (n as f64 + 1.0) * (1.0 - alpha);

    if !interpolate {
        let rank = (target.ceil() as usize).clamp(1, n);
        return Ok(sorted[rank - 1]);
    }

    let lo = target.floor();
    let frac = target - lo;
    let lo_rank = (lo as usize).clamp(1, n);
    let hi_rank = (lo_rank + 1).min(n);
    if frac == 0.0 || lo_rank == hi_rank {
        Ok(sorted[lo_rank - 1])
    } else {
        Ok(sorted[lo_rank - 1] + frac * (sorted[hi_rank - 1] - sorted[lo_rank - 1]))
    }
}

/// Minimum calibration-set size at which the rank rule can deliver the
/// nominal level, ⌈1/α⌉.
pub fn min_calibration_size(alpha: f64) -> usize {
    (1.0 / alpha).ceil() as usize
}

/// Check that every value in a slice is finite.
pub fn validate_finite(values: &[f64]) -> Result<(), LocartError> {
    for v in values {
        if !v.is_finite() {
            return Err(LocartError::NonFiniteValue(*v));
        }
    }
    Ok(())
}

/// Check that two paired slices have the same length.
pub fn validate_same_len(expected: usize, actual: usize) -> Result<(), LocartError> {
    if expected != actual {
        return Err(LocartError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Squared Euclidean distance between two equal-length vectors.
#[inline]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
