//! Local quantile calibration
//!
//! Aggregates conformity scores per region and computes the finite-sample
//! corrected empirical quantile for each, with an explicit fallback to the
//! global pooled quantile for under-populated regions.
use crate::errors::LocartError;
use crate::utils::{conformal_quantile, min_calibration_size};
use hashbrown::HashMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Quantile entry for one region.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct RegionQuantile {
    /// The interval half-width quantile for this region.
    pub quantile: f64,
    /// Number of calibration examples assigned to the region.
    pub count: usize,
    /// True when the region was too small and carries the global quantile.
    pub fallback: bool,
}

/// Immutable region id -> quantile mapping built once per calibration fit.
///
/// Every region that appears among the calibration examples has an entry;
/// regions below the minimum size carry the global pooled quantile with
/// `fallback` set.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QuantileTable {
    pub regions: HashMap<usize, RegionQuantile>,
    /// Pooled quantile over all calibration scores, also the fallback value.
    pub global_quantile: f64,
}

impl QuantileTable {
    /// Quantile for a region, falling back to the global pooled value for
    /// region ids never seen during calibration (possible when a tree leaf
    /// or cluster received no calibration examples).
    pub fn quantile(&self, region: usize) -> f64 {
        self.regions.get(&region).map_or(self.global_quantile, |r| r.quantile)
    }
}

/// Diagnostics recorded while building the table. Fallback usage is a
/// recorded condition, not an error.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct CalibrationDiagnostics {
    /// Number of regions observed among the calibration examples.
    pub n_regions: usize,
    /// How many of those regions fell back to the global quantile.
    pub fallback_regions: usize,
    /// The resolved minimum-region-size threshold.
    pub min_region_size: usize,
}

/// Build the per-region quantile table.
///
/// * `scores` - Conformity scores of the calibration examples.
/// * `labels` - Region id of each calibration example, same length.
/// * `alpha` - Miscoverage level in (0, 1).
/// * `min_region_size` - Regions with fewer examples fall back to the global
///   quantile; `None` resolves to ⌈1/α⌉.
/// * `interpolate` - Interpolate between order statistics (off for the
///   classic conformal convention).
pub fn build_quantile_table(
    scores: &[f64],
    labels: &[usize],
    alpha: f64,
    min_region_size: Option<usize>,
    interpolate: bool,
) -> Result<(QuantileTable, CalibrationDiagnostics), LocartError> {
    if scores.len() != labels.len() {
        return Err(LocartError::DimensionMismatch {
            expected: scores.len(),
            actual: labels.len(),
        });
    }
    let needed = min_calibration_size(alpha);
    if scores.len() < needed {
        return Err(LocartError::InsufficientData {
            needed,
            got: scores.len(),
        });
    }
    let min_size = min_region_size.unwrap_or(needed);
    let global_quantile = conformal_quantile(scores, alpha, interpolate)?;

    let mut by_region: HashMap<usize, Vec<f64>> = HashMap::new();
    for (s, r) in scores.iter().zip(labels.iter()) {
        by_region.entry(*r).or_default().push(*s);
    }

    let mut regions: HashMap<usize, RegionQuantile> = HashMap::with_capacity(by_region.len());
    let mut fallback_regions = 0;
    for (region, region_scores) in by_region.iter() {
        let count = region_scores.len();
        if count < min_size {
            warn!(
                "Region {} has only {} calibration examples (minimum {}), using the global quantile.",
                region, count, min_size
            );
            fallback_regions += 1;
            regions.insert(
                *region,
                RegionQuantile {
                    quantile: global_quantile,
                    count,
                    fallback: true,
                },
            );
        } else {
            regions.insert(
                *region,
                RegionQuantile {
                    quantile: conformal_quantile(region_scores, alpha, interpolate)?,
                    count,
                    fallback: false,
                },
            );
        }
    }

    let diagnostics = CalibrationDiagnostics {
        n_regions: regions.len(),
        fallback_regions,
        min_region_size: min_size,
    };
    info!(
        "Calibrated {} regions, {} on the global fallback quantile {}.",
        diagnostics.n_regions, diagnostics.fallback_regions, global_quantile
    );

    Ok((
        QuantileTable {
            regions,
            global_quantile,
        },
        diagnostics,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_region_rank_quantile() {
        // Region 0 holds scores 1..=19, region 1 holds 101..=119.
        let mut scores: Vec<f64> = (1..=19).map(|i| i as f64).collect();
        scores.extend((101..=119).map(|i| i as f64));
        let labels: Vec<usize> = std::iter::repeat(0).take(19).chain(std::iter::repeat(1).take(19)).collect();

        let (table, diag) = build_quantile_table(&scores, &labels, 0.1, Some(10), false).unwrap();
        // rank = ceil(20 * 0.9) = 18 within each region.
        assert_eq!(table.quantile(0), 18.0);
        assert_eq!(table.quantile(1), 118.0);
        assert_eq!(diag.n_regions, 2);
        assert_eq!(diag.fallback_regions, 0);
    }

    #[test]
    fn test_fallback_trigger() {
        // Region 1 has exactly 2 examples; with alpha = 0.1 the threshold
        // resolves to ceil(1/0.1) = 10, so it must use the global quantile
        // and be flagged.
        let mut scores: Vec<f64> = (1..=20).map(|i| i as f64 / 10.0).collect();
        scores.push(50.0);
        scores.push(60.0);
        let mut labels = vec![0usize; 20];
        labels.extend([1usize, 1]);

        let (table, diag) = build_quantile_table(&scores, &labels, 0.1, None, false).unwrap();
        let entry = table.regions[&1];
        assert!(entry.fallback);
        assert_eq!(entry.count, 2);
        assert_eq!(entry.quantile, table.global_quantile);
        assert_eq!(diag.fallback_regions, 1);
        assert_eq!(diag.min_region_size, 10);

        let well_populated = table.regions[&0];
        assert!(!well_populated.fallback);
    }

    #[test]
    fn test_every_observed_region_has_entry() {
        let scores: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let labels: Vec<usize> = (0..30).map(|i| i % 3).collect();
        let (table, _) = build_quantile_table(&scores, &labels, 0.2, Some(5), false).unwrap();
        for r in 0..3 {
            assert!(table.regions.contains_key(&r));
        }
    }

    #[test]
    fn test_unseen_region_uses_global() {
        let scores: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let labels = vec![0usize; 20];
        let (table, _) = build_quantile_table(&scores, &labels, 0.1, Some(5), false).unwrap();
        assert_eq!(table.quantile(99), table.global_quantile);
    }

    #[test]
    fn test_monotone_in_alpha_per_region() {
        let scores: Vec<f64> = (1..=40).map(|i| i as f64).collect();
        let labels: Vec<usize> = (0..40).map(|i| i % 2).collect();
        let mut last = f64::NEG_INFINITY;
        for alpha in [0.4, 0.3, 0.2, 0.1] {
            let (table, _) = build_quantile_table(&scores, &labels, alpha, Some(5), false).unwrap();
            let q = table.quantile(0);
            assert!(q >= last);
            last = q;
        }
    }

    #[test]
    fn test_insufficient_calibration_data() {
        let scores = vec![1.0, 2.0, 3.0];
        let labels = vec![0, 0, 0];
        match build_quantile_table(&scores, &labels, 0.1, None, false) {
            Err(LocartError::InsufficientData { needed, got }) => {
                assert_eq!(needed, 10);
                assert_eq!(got, 3);
            }
            _ => panic!("expected insufficient data error"),
        }
    }
}
