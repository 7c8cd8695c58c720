//! Conformity scoring
//!
//! Turns a model residual into a non-negative conformity score, optionally
//! normalized by a local difficulty estimate so that interval widths adapt
//! to heteroscedastic noise.
use crate::errors::LocartError;
use serde::{Deserialize, Serialize};

/// How a calibration example's residual is turned into a conformity score.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub enum Scorer {
    /// Absolute residual, s = |y - yhat|.
    Absolute,
    /// Absolute residual divided by a floored difficulty estimate,
    /// s = |y - yhat| / max(difficulty, epsilon).
    Normalized {
        /// Floor applied to the difficulty estimate before dividing.
        epsilon: f64,
    },
}

impl Scorer {
    /// Score a single example. Pure function of its inputs.
    ///
    /// * `y` - Observed response.
    /// * `y_hat` - Point prediction.
    /// * `difficulty` - Local difficulty estimate, required by `Normalized`.
    pub fn score(&self, y: f64, y_hat: f64, difficulty: Option<f64>) -> Result<f64, LocartError> {
        if !y.is_finite() {
            return Err(LocartError::NonFiniteValue(y));
        }
        if !y_hat.is_finite() {
            return Err(LocartError::NonFiniteValue(y_hat));
        }
        match self {
            Scorer::Absolute => Ok((y - y_hat).abs()),
            Scorer::Normalized { epsilon } => {
                let d = difficulty.ok_or_else(|| {
                    LocartError::InvalidParameter(
                        "difficulty".to_string(),
                        "a difficulty estimate".to_string(),
                        "None".to_string(),
                    )
                })?;
                if !d.is_finite() {
                    return Err(LocartError::NonFiniteValue(d));
                }
                Ok((y - y_hat).abs() / d.max(*epsilon))
            }
        }
    }

    /// Score a batch of examples, aborting on the first malformed entry.
    ///
    /// * `y` - Observed responses.
    /// * `y_hat` - Point predictions, same length as `y`.
    /// * `difficulty` - Optional difficulty estimates, same length as `y`.
    pub fn score_batch(
        &self,
        y: &[f64],
        y_hat: &[f64],
        difficulty: Option<&[f64]>,
    ) -> Result<Vec<f64>, LocartError> {
        if y.len() != y_hat.len() {
            return Err(LocartError::DimensionMismatch {
                expected: y.len(),
                actual: y_hat.len(),
            });
        }
        if let Some(d) = difficulty {
            if d.len() != y.len() {
                return Err(LocartError::DimensionMismatch {
                    expected: y.len(),
                    actual: d.len(),
                });
            }
        }
        let mut scores = Vec::with_capacity(y.len());
        for i in 0..y.len() {
            scores.push(self.score(y[i], y_hat[i], difficulty.map(|d| d[i]))?);
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_score() {
        let s = Scorer::Absolute;
        assert_eq!(s.score(3.0, 1.0, None).unwrap(), 2.0);
        assert_eq!(s.score(1.0, 3.0, None).unwrap(), 2.0);
        assert_eq!(s.score(1.0, 1.0, None).unwrap(), 0.0);
    }

    #[test]
    fn test_normalized_score() {
        let s = Scorer::Normalized { epsilon: 1e-8 };
        let v = s.score(3.0, 1.0, Some(2.0)).unwrap();
        assert_eq!(v, 1.0);
        // Floor kicks in for tiny difficulty values.
        let v = s.score(3.0, 1.0, Some(0.0)).unwrap();
        assert_eq!(v, 2.0 / 1e-8);
    }

    #[test]
    fn test_normalized_requires_difficulty() {
        let s = Scorer::Normalized { epsilon: 1e-8 };
        assert!(s.score(3.0, 1.0, None).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let s = Scorer::Absolute;
        assert!(s.score(f64::NAN, 1.0, None).is_err());
        assert!(s.score(1.0, f64::INFINITY, None).is_err());
        let s = Scorer::Normalized { epsilon: 1e-8 };
        assert!(s.score(1.0, 1.0, Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_score_batch_aborts_on_bad_row() {
        let s = Scorer::Absolute;
        let y = vec![1.0, f64::NAN, 3.0];
        let y_hat = vec![1.0, 2.0, 3.0];
        assert!(s.score_batch(&y, &y_hat, None).is_err());
    }

    #[test]
    fn test_score_batch_length_mismatch() {
        let s = Scorer::Absolute;
        let y = vec![1.0, 2.0];
        let y_hat = vec![1.0];
        match s.score_batch(&y, &y_hat, None) {
            Err(LocartError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected dimension mismatch, got {:?}", other.map(|_| ())),
        }
    }
}
