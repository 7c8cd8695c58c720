//! Numeric floors and default hyperparameters used across the crate.

/// Floor applied to difficulty estimates before dividing or scaling by them.
pub const DIFFICULTY_FLOOR: f64 = 1e-8;

/// Centroid-movement tolerance at which Lloyd iterations stop.
pub const KMEANS_TOL: f64 = 1e-8;

/// Default depth limit for the tree partition.
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Default minimum number of partition-training examples per leaf.
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 30;

/// Default Lloyd iteration cap for the k-means partition.
pub const DEFAULT_KMEANS_MAX_ITER: usize = 100;

/// Default RNG seed for k-means centroid seeding.
pub const DEFAULT_SEED: u64 = 0;
