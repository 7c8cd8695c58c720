//! Partition strategies
//!
//! Maps covariate vectors to local regions. Two discrete strategies (tree
//! leaves, k-means clusters) produce integer region ids that key the
//! quantile table; the k-NN strategy produces a neighbor set instead and
//! never goes through the table.
use crate::constants::{DEFAULT_KMEANS_MAX_ITER, DEFAULT_SEED};
use crate::data::Matrix;
use crate::errors::LocartError;
use serde::{Deserialize, Serialize};

pub mod kmeans;
pub mod knn;
pub mod tree;

pub use kmeans::KMeansPartition;
pub use knn::KnnPartition;
pub use tree::RegionTree;

/// Which space-partitioning rule to train, with its hyperparameters.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub enum PartitionStrategy {
    /// Shallow regression tree on (covariates, conformity scores);
    /// region id = leaf index.
    Tree { max_depth: usize, min_samples_leaf: usize },
    /// K-means over the covariates; region id = nearest centroid.
    KMeans { n_clusters: usize, max_iter: usize, seed: u64 },
    /// k nearest calibration points; no fixed regions.
    Knn { k: usize },
}

impl PartitionStrategy {
    /// K-means strategy with the default iteration cap and seed.
    pub fn kmeans(n_clusters: usize) -> Self {
        PartitionStrategy::KMeans {
            n_clusters,
            max_iter: DEFAULT_KMEANS_MAX_ITER,
            seed: DEFAULT_SEED,
        }
    }

    /// Validate the strategy's own hyperparameters.
    pub fn validate(&self) -> Result<(), LocartError> {
        let bad = |name: &str, actual: usize| {
            Err(LocartError::InvalidParameter(
                name.to_string(),
                "a positive integer".to_string(),
                actual.to_string(),
            ))
        };
        match self {
            PartitionStrategy::Tree {
                max_depth,
                min_samples_leaf,
            } => {
                if *max_depth == 0 {
                    return bad("max_depth", *max_depth);
                }
                if *min_samples_leaf == 0 {
                    return bad("min_samples_leaf", *min_samples_leaf);
                }
            }
            PartitionStrategy::KMeans {
                n_clusters, max_iter, ..
            } => {
                if *n_clusters == 0 {
                    return bad("n_clusters", *n_clusters);
                }
                if *max_iter == 0 {
                    return bad("max_iter", *max_iter);
                }
            }
            PartitionStrategy::Knn { k } => {
                if *k == 0 {
                    return bad("k", *k);
                }
            }
        }
        Ok(())
    }

    /// Train the partition rule.
    ///
    /// * `x_part` - Partition-training covariates (disjoint from the
    ///   calibration split; ignored by `Knn`).
    /// * `scores_part` - Conformity scores on the partition-training split
    ///   (used by `Tree` only).
    /// * `x_cal` - Calibration covariates (used by `Knn` only, since those
    ///   rows carry the scores neighbor quantiles are taken over).
    pub fn fit(
        &self,
        x_part: &Matrix<f64>,
        scores_part: &[f64],
        x_cal: &Matrix<f64>,
    ) -> Result<Partition, LocartError> {
        self.validate()?;
        match self {
            PartitionStrategy::Tree {
                max_depth,
                min_samples_leaf,
            } => Ok(Partition::Tree(RegionTree::fit(
                x_part,
                scores_part,
                *max_depth,
                *min_samples_leaf,
            )?)),
            PartitionStrategy::KMeans {
                n_clusters,
                max_iter,
                seed,
            } => Ok(Partition::KMeans(KMeansPartition::fit(
                x_part, *n_clusters, *max_iter, *seed,
            )?)),
            PartitionStrategy::Knn { k } => Ok(Partition::Knn(KnnPartition::fit(x_cal, *k)?)),
        }
    }
}

/// Where a query point lands: a fixed region or an on-demand neighbor set.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionAssignment {
    /// Discrete region id, a key into the quantile table.
    Region(usize),
    /// Calibration-row indices of the k nearest neighbors, closest first.
    Neighbors(Vec<usize>),
}

/// A fitted partition rule. Deterministic: the same fitted state and the
/// same query always produce the same assignment.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Partition {
    Tree(RegionTree),
    KMeans(KMeansPartition),
    Knn(KnnPartition),
}

impl Partition {
    /// Assign a covariate row to its region or neighbor set.
    pub fn assign(&self, row: &[f64]) -> Result<RegionAssignment, LocartError> {
        match self {
            Partition::Tree(t) => Ok(RegionAssignment::Region(t.assign(row)?)),
            Partition::KMeans(km) => Ok(RegionAssignment::Region(km.assign(row)?)),
            Partition::Knn(knn) => Ok(RegionAssignment::Neighbors(knn.neighbors(row)?)),
        }
    }

    /// Number of fixed regions, or None for the non-discretized k-NN rule.
    pub fn region_count(&self) -> Option<usize> {
        match self {
            Partition::Tree(t) => Some(t.n_leaves),
            Partition::KMeans(km) => Some(km.n_clusters()),
            Partition::Knn(_) => None,
        }
    }

    /// Covariate dimensionality the rule was fit on.
    pub fn n_features(&self) -> usize {
        match self {
            Partition::Tree(t) => t.n_features,
            Partition::KMeans(km) => km.n_features,
            Partition::Knn(knn) => knn.n_features,
        }
    }
}
