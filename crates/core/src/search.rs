//! Hash-grid point neighbor search.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::size::Size3;

const EMPTY_BUCKET: usize = usize::MAX;

/// Bucketed uniform-grid point index built in parallel.
///
/// Each point is hashed into a bucket by flooring its position over the
/// grid spacing; point indices are then sorted by bucket key and a
/// start/end table maps every bucket to its slice of the sorted order. The
/// index is immutable after `build` -- rebuilding replaces all state.
///
/// Radius queries visit the 8 buckets adjacent to the query origin, so they
/// are complete only while `grid_spacing >= 2 * radius`. That bound is the
/// caller's responsibility and is not checked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PointParallelHashGridSearcher3 {
    grid_spacing: f32,
    resolution: Size3,
    points: Vec<Vec3>,
    keys: Vec<usize>,
    start_index_table: Vec<usize>,
    end_index_table: Vec<usize>,
    sorted_indices: Vec<usize>,
}

impl PointParallelHashGridSearcher3 {
    /// Creates a searcher with the given bucket resolution and spacing.
    pub fn new(resolution: Size3, grid_spacing: f32) -> Self {
        let resolution = Size3::new(
            resolution.x.max(1),
            resolution.y.max(1),
            resolution.z.max(1),
        );
        let table_len = resolution.product();
        Self {
            grid_spacing,
            resolution,
            points: Vec::new(),
            keys: Vec::new(),
            start_index_table: vec![EMPTY_BUCKET; table_len],
            end_index_table: vec![EMPTY_BUCKET; table_len],
            sorted_indices: Vec::new(),
        }
    }

    /// Rebuilds the index for `points`, replacing all previous state.
    pub fn build(&mut self, points: &[Vec3]) {
        let n = points.len();
        let table_len = self.resolution.product();
        self.start_index_table = vec![EMPTY_BUCKET; table_len];
        self.end_index_table = vec![EMPTY_BUCKET; table_len];
        self.points = vec![Vec3::ZERO; n];
        self.keys = vec![0; n];
        self.sorted_indices = Vec::new();

        if n == 0 {
            return;
        }

        // Hash every point, then stable-sort the indices by key.
        let temp_keys: Vec<usize> = points
            .par_iter()
            .map(|&p| self.hash_key_from_position(p))
            .collect();

        self.sorted_indices = (0..n).collect();
        self.sorted_indices.sort_by_key(|&i| temp_keys[i]);

        // Re-order points and keys into sorted order.
        let sorted_indices = &self.sorted_indices;
        self.points = sorted_indices.par_iter().map(|&i| points[i]).collect();
        self.keys = sorted_indices.par_iter().map(|&i| temp_keys[i]).collect();

        // One pass over the sorted keys fills the per-bucket [start, end)
        // table: start[k] = first i with keys[i] == k, end[k] = one past
        // the last.
        self.start_index_table[self.keys[0]] = 0;
        self.end_index_table[self.keys[n - 1]] = n;
        for i in 1..n {
            if self.keys[i] > self.keys[i - 1] {
                self.start_index_table[self.keys[i]] = i;
                self.end_index_table[self.keys[i - 1]] = i;
            }
        }

        let non_empty = self
            .start_index_table
            .iter()
            .filter(|&&s| s != EMPTY_BUCKET)
            .count();
        log::debug!(
            "hash grid built: {} points, {} non-empty buckets, avg occupancy {:.2}",
            n,
            non_empty,
            n as f32 / non_empty.max(1) as f32
        );
    }

    /// Invokes `callback(original_index, position)` for every point within
    /// `radius` of `origin`.
    pub fn for_each_nearby_point<F: FnMut(usize, Vec3)>(
        &self,
        origin: Vec3,
        radius: f32,
        mut callback: F,
    ) {
        if self.points.is_empty() {
            return;
        }

        let nearby_keys = self.nearby_keys(origin);
        let query_radius_squared = radius * radius;

        for &key in &nearby_keys {
            let start = self.start_index_table[key];
            if start == EMPTY_BUCKET {
                continue;
            }
            let end = self.end_index_table[key];
            for j in start..end {
                let distance_squared = (self.points[j] - origin).length_squared();
                if distance_squared <= query_radius_squared {
                    callback(self.sorted_indices[j], self.points[j]);
                }
            }
        }
    }

    /// True if any point lies within `radius` of `origin`; short-circuits
    /// on the first hit.
    pub fn has_nearby_point(&self, origin: Vec3, radius: f32) -> bool {
        if self.points.is_empty() {
            return false;
        }

        let nearby_keys = self.nearby_keys(origin);
        let query_radius_squared = radius * radius;

        for &key in &nearby_keys {
            let start = self.start_index_table[key];
            if start == EMPTY_BUCKET {
                continue;
            }
            let end = self.end_index_table[key];
            for j in start..end {
                let distance_squared = (self.points[j] - origin).length_squared();
                if distance_squared <= query_radius_squared {
                    return true;
                }
            }
        }
        false
    }

    /// Hash keys of the stored points in sorted order.
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    /// Maps bucket index to the first slot of that bucket in the sorted
    /// point order (`usize::MAX` for empty buckets).
    pub fn start_index_table(&self) -> &[usize] {
        &self.start_index_table
    }

    /// Maps bucket index to one past the last slot of that bucket.
    pub fn end_index_table(&self) -> &[usize] {
        &self.end_index_table
    }

    /// Maps sorted slot back to the original point index.
    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted_indices
    }

    /// Axis-major bucket key with each axis wrapped into `[0, resolution)`.
    pub fn hash_key_from_bucket_index(&self, bucket_index: (i64, i64, i64)) -> usize {
        let wrap = |v: i64, r: usize| -> usize { v.rem_euclid(r as i64) as usize };
        let x = wrap(bucket_index.0, self.resolution.x);
        let y = wrap(bucket_index.1, self.resolution.y);
        let z = wrap(bucket_index.2, self.resolution.z);
        (z * self.resolution.y + y) * self.resolution.x + x
    }

    /// Spatial bucket index of `position` (may be negative before wrapping).
    pub fn bucket_index(&self, position: Vec3) -> (i64, i64, i64) {
        (
            (position.x / self.grid_spacing).floor() as i64,
            (position.y / self.grid_spacing).floor() as i64,
            (position.z / self.grid_spacing).floor() as i64,
        )
    }

    fn hash_key_from_position(&self, position: Vec3) -> usize {
        self.hash_key_from_bucket_index(self.bucket_index(position))
    }

    /// The 8 buckets that can contain points within half a bucket of
    /// `position`: per axis, the side of the bucket midpoint the query
    /// falls on selects the neighboring bucket.
    fn nearby_keys(&self, position: Vec3) -> [usize; 8] {
        let origin = self.bucket_index(position);
        let mut nearby = [origin; 8];

        if (origin.0 as f32 + 0.5) * self.grid_spacing <= position.x {
            for idx in [4, 5, 6, 7] {
                nearby[idx].0 += 1;
            }
        } else {
            for idx in [4, 5, 6, 7] {
                nearby[idx].0 -= 1;
            }
        }

        if (origin.1 as f32 + 0.5) * self.grid_spacing <= position.y {
            for idx in [2, 3, 6, 7] {
                nearby[idx].1 += 1;
            }
        } else {
            for idx in [2, 3, 6, 7] {
                nearby[idx].1 -= 1;
            }
        }

        if (origin.2 as f32 + 0.5) * self.grid_spacing <= position.z {
            for idx in [1, 3, 5, 7] {
                nearby[idx].2 += 1;
            }
        } else {
            for idx in [1, 3, 5, 7] {
                nearby[idx].2 -= 1;
            }
        }

        nearby.map(|b| self.hash_key_from_bucket_index(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_build() {
        let mut searcher = PointParallelHashGridSearcher3::new(Size3::new(4, 4, 4), 1.0);
        searcher.build(&[]);
        assert!(!searcher.has_nearby_point(Vec3::ZERO, 10.0));
    }

    #[test]
    fn test_finds_exact_point() {
        let mut searcher = PointParallelHashGridSearcher3::new(Size3::new(4, 4, 4), 2.0 * 0.3);
        let points = vec![
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(1.5, 1.5, 1.5),
            Vec3::new(0.15, 0.2, 0.3),
        ];
        searcher.build(&points);

        let mut found = Vec::new();
        searcher.for_each_nearby_point(Vec3::new(0.1, 0.2, 0.3), 0.1, |i, _| {
            found.push(i);
        });
        found.sort_unstable();
        assert_eq!(found, vec![0, 2]);
    }

    #[test]
    fn test_has_nearby_point() {
        let mut searcher = PointParallelHashGridSearcher3::new(Size3::new(8, 8, 8), 1.0);
        searcher.build(&[Vec3::new(3.1, 3.1, 3.1)]);
        assert!(searcher.has_nearby_point(Vec3::new(3.0, 3.0, 3.0), 0.5));
        assert!(!searcher.has_nearby_point(Vec3::new(0.0, 0.0, 0.0), 0.4));
    }

    #[test]
    fn test_sorted_indices_map_back() {
        let mut searcher = PointParallelHashGridSearcher3::new(Size3::new(4, 4, 4), 1.0);
        let points = vec![
            Vec3::new(3.5, 3.5, 3.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(0.6, 0.5, 0.5),
        ];
        searcher.build(&points);
        // Every original index appears exactly once.
        let mut indices = searcher.sorted_indices().to_vec();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_completeness_against_brute_force() {
        // Contract: no false negatives while grid_spacing >= 2 * radius.
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let points: Vec<Vec3> = (0..500)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(0.0..4.0),
                    rng.gen_range(0.0..4.0),
                    rng.gen_range(0.0..4.0),
                )
            })
            .collect();

        let radius = 0.25f32;
        let mut searcher = PointParallelHashGridSearcher3::new(Size3::new(8, 8, 8), 2.0 * radius);
        searcher.build(&points);

        for _ in 0..50 {
            let origin = Vec3::new(
                rng.gen_range(0.0..4.0),
                rng.gen_range(0.0..4.0),
                rng.gen_range(0.0..4.0),
            );
            let mut reported: Vec<usize> = Vec::new();
            searcher.for_each_nearby_point(origin, radius, |i, _| reported.push(i));
            reported.sort_unstable();

            let mut expected: Vec<usize> = points
                .iter()
                .enumerate()
                .filter(|(_, p)| (**p - origin).length() <= radius)
                .map(|(i, _)| i)
                .collect();
            expected.sort_unstable();

            assert_eq!(reported, expected);
        }
    }
}
