//! Property-based tests for the core data structures.

use freshet_core::{Array3, PointParallelHashGridSearcher3, Size3};
use glam::Vec3;
use proptest::prelude::*;

proptest! {
    /// Resizing preserves every index valid under both the old and the
    /// new size, and fills everything else with the init value.
    #[test]
    fn resize_preserves_overlap(
        (w0, h0, d0) in (1usize..6, 1usize..6, 1usize..6),
        (w1, h1, d1) in (1usize..6, 1usize..6, 1usize..6),
    ) {
        let old_size = Size3::new(w0, h0, d0);
        let new_size = Size3::new(w1, h1, d1);

        let mut a = Array3::with_size(old_size, 0i64);
        for k in 0..d0 {
            for j in 0..h0 {
                for i in 0..w0 {
                    a[(i, j, k)] = (i + 100 * j + 10_000 * k) as i64;
                }
            }
        }

        a.resize(new_size, -1);

        prop_assert_eq!(a.size(), new_size);
        for k in 0..d1 {
            for j in 0..h1 {
                for i in 0..w1 {
                    let expected = if i < w0 && j < h0 && k < d0 {
                        (i + 100 * j + 10_000 * k) as i64
                    } else {
                        -1
                    };
                    prop_assert_eq!(a[(i, j, k)], expected);
                }
            }
        }
    }

    /// With grid_spacing >= 2 * radius the hash-grid query returns exactly
    /// the points within the Euclidean radius -- no false negatives, no
    /// false positives.
    #[test]
    fn hash_grid_search_is_complete(
        points in prop::collection::vec(
            (0.0f32..4.0, 0.0f32..4.0, 0.0f32..4.0).prop_map(|(x, y, z)| Vec3::new(x, y, z)),
            1..200,
        ),
        origin in (0.0f32..4.0, 0.0f32..4.0, 0.0f32..4.0).prop_map(|(x, y, z)| Vec3::new(x, y, z)),
        radius in 0.05f32..0.5,
    ) {
        let mut searcher =
            PointParallelHashGridSearcher3::new(Size3::new(8, 8, 8), 2.0 * radius);
        searcher.build(&points);

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

        prop_assert_eq!(reported, expected);
    }
}
