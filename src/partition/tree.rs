//! Tree partition
//!
//! A shallow regression tree fit on (covariates, conformity scores). Leaves
//! approximate regions of homogeneous residual behavior, so calibrating per
//! leaf yields locally relevant quantiles. Splits are exact greedy SSE
//! splits over midpoint thresholds, no binning.
use crate::data::Matrix;
use crate::errors::LocartError;
use serde::{Deserialize, Serialize};

/// A node of the fitted region tree, stored in a flat vector.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum TreeNode {
    /// Internal split: rows with `feature <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node; `region` is the leaf's region id.
    Leaf { region: usize },
}

/// Regression tree whose leaf indices serve as region ids.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegionTree {
    pub nodes: Vec<TreeNode>,
    pub n_leaves: usize,
    pub n_features: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegionTree {
    /// Fit the tree on covariates and per-example conformity scores.
    ///
    /// * `x` - Partition-training covariates.
    /// * `scores` - Conformity score for each row of `x`.
    /// * `max_depth` - Depth limit; a tree of depth D has at most 2^D leaves.
    /// * `min_samples_leaf` - Minimum number of training rows per leaf.
    pub fn fit(
        x: &Matrix<f64>,
        scores: &[f64],
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Result<Self, LocartError> {
        if x.rows != scores.len() {
            return Err(LocartError::DimensionMismatch {
                expected: x.rows,
                actual: scores.len(),
            });
        }
        if x.rows == 0 {
            return Err(LocartError::InsufficientData { needed: 1, got: 0 });
        }
        let mut tree = RegionTree {
            nodes: Vec::new(),
            n_leaves: 0,
            n_features: x.cols,
        };
        let indices: Vec<usize> = (0..x.rows).collect();
        tree.grow(x, scores, indices, 0, max_depth, min_samples_leaf);
        Ok(tree)
    }

    fn grow(
        &mut self,
        x: &Matrix<f64>,
        scores: &[f64],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> usize {
        if depth >= max_depth || indices.len() < 2 * min_samples_leaf {
            return self.push_leaf();
        }
        let candidate = match best_split(x, scores, &indices, min_samples_leaf) {
            Some(c) => c,
            None => return self.push_leaf(),
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| *x.get(i, candidate.feature) <= candidate.threshold);

        let node = self.nodes.len();
        self.nodes.push(TreeNode::Split {
            feature: candidate.feature,
            threshold: candidate.threshold,
            left: 0,
            right: 0,
        });
        let left = self.grow(x, scores, left_idx, depth + 1, max_depth, min_samples_leaf);
        let right = self.grow(x, scores, right_idx, depth + 1, max_depth, min_samples_leaf);
        if let TreeNode::Split {
            left: l, right: r, ..
        } = &mut self.nodes[node]
        {
            *l = left;
            *r = right;
        }
        node
    }

    fn push_leaf(&mut self) -> usize {
        let region = self.n_leaves;
        self.n_leaves += 1;
        self.nodes.push(TreeNode::Leaf { region });
        self.nodes.len() - 1
    }

    /// Route a covariate row to its leaf and return the region id.
    pub fn assign(&self, row: &[f64]) -> Result<usize, LocartError> {
        if row.len() != self.n_features {
            return Err(LocartError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { region } => return Ok(*region),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Best exact SSE split over all features, or None when no split improves
/// on the parent or satisfies the leaf-size constraint.
fn best_split(
    x: &Matrix<f64>,
    scores: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| scores[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| scores[i] * scores[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<SplitCandidate> = None;
    let mut order: Vec<usize> = indices.to_vec();

    for feature in 0..x.cols {
        order.sort_unstable_by(|&a, &b| {
            x.get(a, feature)
                .partial_cmp(x.get(b, feature))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 1..n {
            let prev = order[pos - 1];
            let s = scores[prev];
            left_sum += s;
            left_sq += s * s;

            let v_prev = *x.get(prev, feature);
            let v_next = *x.get(order[pos], feature);
            if v_prev == v_next {
                continue;
            }
            if pos < min_samples_leaf || n - pos < min_samples_leaf {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / pos as f64;
            let right_sse = right_sq - right_sum * right_sum / (n - pos) as f64;
            let gain = parent_sse - left_sse - right_sse;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (v_prev + v_next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_major(rows: &[Vec<f64>]) -> Vec<f64> {
        let n = rows.len();
        let d = rows[0].len();
        let mut out = vec![0.0; n * d];
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                out[j * n + i] = *v;
            }
        }
        out
    }

    #[test]
    fn test_tree_splits_separable_scores() {
        // Scores are small for x < 0 and large for x > 0; the tree should
        // place its first split near zero and route the two sides to
        // different regions.
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![if i < 20 { -1.0 - i as f64 * 0.1 } else { 1.0 + i as f64 * 0.1 }])
            .collect();
        let scores: Vec<f64> = (0..40).map(|i| if i < 20 { 0.1 } else { 5.0 }).collect();
        let flat = column_major(&rows);
        let x = Matrix::new(&flat, 40, 1);

        let tree = RegionTree::fit(&x, &scores, 2, 5).unwrap();
        assert!(tree.n_leaves >= 2);
        let left = tree.assign(&[-2.0]).unwrap();
        let right = tree.assign(&[2.0]).unwrap();
        assert_ne!(left, right);
    }

    #[test]
    fn test_tree_constant_scores_single_leaf() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let scores = vec![1.0; 20];
        let flat = column_major(&rows);
        let x = Matrix::new(&flat, 20, 1);

        let tree = RegionTree::fit(&x, &scores, 3, 2).unwrap();
        assert_eq!(tree.n_leaves, 1);
        assert_eq!(tree.assign(&[0.0]).unwrap(), 0);
        assert_eq!(tree.assign(&[100.0]).unwrap(), 0);
    }

    #[test]
    fn test_tree_respects_min_samples_leaf() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let scores: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let flat = column_major(&rows);
        let x = Matrix::new(&flat, 10, 1);

        // min_samples_leaf of 6 makes any split infeasible with 10 rows.
        let tree = RegionTree::fit(&x, &scores, 3, 6).unwrap();
        assert_eq!(tree.n_leaves, 1);
    }

    #[test]
    fn test_tree_assign_dimension_mismatch() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, -(i as f64)]).collect();
        let scores = vec![1.0; 10];
        let flat = column_major(&rows);
        let x = Matrix::new(&flat, 10, 2);
        let tree = RegionTree::fit(&x, &scores, 2, 2).unwrap();

        match tree.assign(&[1.0]) {
            Err(LocartError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            _ => panic!("expected dimension mismatch"),
        }
    }

    #[test]
    fn test_tree_deterministic() {
        let rows: Vec<Vec<f64>> = (0..50).map(|i| vec![(i as f64).sin(), (i as f64).cos()]).collect();
        let scores: Vec<f64> = (0..50).map(|i| (i % 7) as f64).collect();
        let flat = column_major(&rows);
        let x = Matrix::new(&flat, 50, 2);

        let t1 = RegionTree::fit(&x, &scores, 3, 5).unwrap();
        let t2 = RegionTree::fit(&x, &scores, 3, 5).unwrap();
        for row in &rows {
            assert_eq!(t1.assign(row).unwrap(), t2.assign(row).unwrap());
        }
    }
}
