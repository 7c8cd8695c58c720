//! K-means partition
//!
//! Lloyd's algorithm over the raw covariates; region id is the index of the
//! nearest centroid. Centroids are seeded with a farthest-point sweep from a
//! seeded RNG, so a fixed seed gives a fully deterministic partition.
use crate::constants::KMEANS_TOL;
use crate::data::Matrix;
use crate::errors::LocartError;
use crate::utils::squared_distance;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Fitted k-means partition.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct KMeansPartition {
    /// One centroid per region, each of length `n_features`.
    pub centroids: Vec<Vec<f64>>,
    pub n_features: usize,
}

impl KMeansPartition {
    /// Fit centroids on the partition-training covariates.
    ///
    /// * `x` - Partition-training covariates.
    /// * `n_clusters` - Number of regions.
    /// * `max_iter` - Lloyd iteration cap.
    /// * `seed` - RNG seed for centroid initialization.
    pub fn fit(x: &Matrix<f64>, n_clusters: usize, max_iter: usize, seed: u64) -> Result<Self, LocartError> {
        if x.rows < n_clusters {
            return Err(LocartError::InsufficientData {
                needed: n_clusters,
                got: x.rows,
            });
        }
        let rows: Vec<Vec<f64>> = (0..x.rows).map(|i| x.get_row(i)).collect();
        let mut centroids = seed_centroids(&rows, n_clusters, seed);

        let mut labels = vec![0usize; x.rows];
        for _ in 0..max_iter {
            for (i, row) in rows.iter().enumerate() {
                labels[i] = nearest_centroid(row, &centroids);
            }

            let mut sums = vec![vec![0.0; x.cols]; n_clusters];
            let mut counts = vec![0usize; n_clusters];
            for (i, row) in rows.iter().enumerate() {
                counts[labels[i]] += 1;
                for (j, v) in row.iter().enumerate() {
                    sums[labels[i]][j] += v;
                }
            }

            let mut movement: f64 = 0.0;
            for c in 0..n_clusters {
                if counts[c] == 0 {
                    // Reseed an emptied cluster to the point farthest from
                    // its current centroid assignment.
                    let far = farthest_point(&rows, &centroids, &labels);
                    movement = f64::INFINITY;
                    centroids[c] = rows[far].clone();
                    continue;
                }
                let new: Vec<f64> = sums[c].iter().map(|s| s / counts[c] as f64).collect();
                movement = movement.max(squared_distance(&new, &centroids[c]));
                centroids[c] = new;
            }
            if movement < KMEANS_TOL {
                break;
            }
        }

        Ok(KMeansPartition {
            centroids,
            n_features: x.cols,
        })
    }

    /// Region id of the nearest centroid, ties broken by lowest index.
    pub fn assign(&self, row: &[f64]) -> Result<usize, LocartError> {
        if row.len() != self.n_features {
            return Err(LocartError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        Ok(nearest_centroid(row, &self.centroids))
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(row, centroid);
        if d < best_d {
            best_d = d;
            best = c;
        }
    }
    best
}

/// Farthest-point (k-means++ style, without the random weighting) seeding:
/// the first centroid is drawn from the RNG, each later one is the point
/// with the largest distance to its nearest chosen centroid.
fn seed_centroids(rows: &[Vec<f64>], n_clusters: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let first = rng.gen_range(0..rows.len());
    let mut centroids = vec![rows[first].clone()];

    let mut min_d: Vec<f64> = rows.iter().map(|r| squared_distance(r, &centroids[0])).collect();
    while centroids.len() < n_clusters {
        let mut far = 0;
        let mut far_d = f64::NEG_INFINITY;
        for (i, d) in min_d.iter().enumerate() {
            if *d > far_d {
                far_d = *d;
                far = i;
            }
        }
        centroids.push(rows[far].clone());
        for (i, row) in rows.iter().enumerate() {
            let d = squared_distance(row, centroids.last().unwrap());
            if d < min_d[i] {
                min_d[i] = d;
            }
        }
    }
    centroids
}

fn farthest_point(rows: &[Vec<f64>], centroids: &[Vec<f64>], labels: &[usize]) -> usize {
    let mut far = 0;
    let mut far_d = f64::NEG_INFINITY;
    for (i, row) in rows.iter().enumerate() {
        let d = squared_distance(row, &centroids[labels[i]]);
        if d > far_d {
            far_d = d;
            far = i;
        }
    }
    far
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<f64> {
        // 20 points around (0, 0) and 20 around (10, 10), column-major.
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..20 {
            xs.push(0.0 + (i % 5) as f64 * 0.1);
            ys.push(0.0 + (i / 5) as f64 * 0.1);
        }
        for i in 0..20 {
            xs.push(10.0 + (i % 5) as f64 * 0.1);
            ys.push(10.0 + (i / 5) as f64 * 0.1);
        }
        xs.extend(ys);
        xs
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let flat = two_blobs();
        let x = Matrix::new(&flat, 40, 2);
        let km = KMeansPartition::fit(&x, 2, 100, 0).unwrap();

        let a = km.assign(&[0.0, 0.0]).unwrap();
        let b = km.assign(&[10.0, 10.0]).unwrap();
        assert_ne!(a, b);
        // Every point in a blob maps to the same region.
        for i in 0..5 {
            assert_eq!(km.assign(&[i as f64 * 0.1, 0.0]).unwrap(), a);
            assert_eq!(km.assign(&[10.0 + i as f64 * 0.1, 10.0]).unwrap(), b);
        }
    }

    #[test]
    fn test_kmeans_deterministic_given_seed() {
        let flat = two_blobs();
        let x = Matrix::new(&flat, 40, 2);
        let km1 = KMeansPartition::fit(&x, 3, 100, 7).unwrap();
        let km2 = KMeansPartition::fit(&x, 3, 100, 7).unwrap();
        assert_eq!(km1.centroids, km2.centroids);
    }

    #[test]
    fn test_kmeans_too_few_rows() {
        let flat = vec![1.0, 2.0];
        let x = Matrix::new(&flat, 2, 1);
        assert!(KMeansPartition::fit(&x, 3, 100, 0).is_err());
    }

    #[test]
    fn test_kmeans_assign_dimension_mismatch() {
        let flat = two_blobs();
        let x = Matrix::new(&flat, 40, 2);
        let km = KMeansPartition::fit(&x, 2, 100, 0).unwrap();
        assert!(km.assign(&[1.0]).is_err());
    }
}
