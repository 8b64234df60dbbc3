//! 2-D multigrid FDM system and level utilities.

use freshet_core::{Array2, Size2};

use crate::mg::{MgMatrix, MgVector};
use crate::system2::{FdmBlas2, FdmVector2};

/// Multigrid-style 2-D FDM matrix.
pub type FdmMgMatrix2 = MgMatrix<FdmBlas2>;
/// Multigrid-style 2-D FDM vector.
pub type FdmMgVector2 = MgVector<FdmBlas2>;

/// Multigrid linear system: per-level matrix, solution, and RHS.
///
/// Level L+1 has exactly half the resolution of level L along every axis.
#[derive(Default)]
pub struct FdmMgLinearSystem2 {
    /// The system matrix hierarchy.
    pub a: FdmMgMatrix2,
    /// The solution hierarchy.
    pub x: FdmMgVector2,
    /// The RHS hierarchy.
    pub b: FdmMgVector2,
}

impl FdmMgLinearSystem2 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all levels.
    pub fn clear(&mut self) {
        self.a.levels.clear();
        self.x.levels.clear();
        self.b.levels.clear();
    }

    /// Number of multigrid levels.
    pub fn number_of_levels(&self) -> usize {
        self.a.levels.len()
    }

    /// Resizes the system so the coarsest level has `coarsest_resolution`
    /// and level 0 is `coarsest_resolution * 2^(number_of_levels - 1)`.
    pub fn resize_with_coarsest(&mut self, coarsest_resolution: Size2, number_of_levels: usize) {
        FdmMgUtils2::resize_array_with_coarsest(
            coarsest_resolution,
            number_of_levels,
            &mut self.a.levels,
        );
        FdmMgUtils2::resize_array_with_coarsest(
            coarsest_resolution,
            number_of_levels,
            &mut self.x.levels,
        );
        FdmMgUtils2::resize_array_with_coarsest(
            coarsest_resolution,
            number_of_levels,
            &mut self.b.levels,
        );
    }

    /// Resizes the system with level 0 at `finest_resolution`, adding
    /// coarser levels by halving while every axis stays exactly divisible
    /// by two, up to `max_number_of_levels`.
    pub fn resize_with_finest(&mut self, finest_resolution: Size2, max_number_of_levels: usize) {
        FdmMgUtils2::resize_array_with_finest(
            finest_resolution,
            max_number_of_levels,
            &mut self.a.levels,
        );
        FdmMgUtils2::resize_array_with_finest(
            finest_resolution,
            max_number_of_levels,
            &mut self.x.levels,
        );
        FdmMgUtils2::resize_array_with_finest(
            finest_resolution,
            max_number_of_levels,
            &mut self.b.levels,
        );
    }
}

/// Multigrid utilities for the 2-D FDM system.
pub struct FdmMgUtils2;

impl FdmMgUtils2 {
    /// Restricts the finer grid onto the coarser grid.
    ///
    /// Each coarse cell accumulates a tensor-product
    /// [1/8, 3/8, 3/8, 1/8] stencil over its 4x4 finer neighborhood,
    /// reusing boundary indices instead of reading out of range. Panics
    /// unless `finer.size == 2 * coarser.size` on both axes.
    pub fn restrict(finer: &FdmVector2, coarser: &mut FdmVector2) {
        assert_eq!(finer.size().x, 2 * coarser.size().x, "restrict: size ratio must be 2");
        assert_eq!(finer.size().y, 2 * coarser.size().y, "restrict: size ratio must be 2");

        // --*--|--*--|--*--|--*--
        //  1/8   3/8   3/8   1/8
        //           to
        // -----|-----*-----|-----
        const KERNEL: [f32; 4] = [0.125, 0.375, 0.375, 0.125];

        let n = coarser.size();
        coarser.par_for_each_mut(|i, j, cell| {
            let i_indices = [
                if i > 0 { 2 * i - 1 } else { 2 * i },
                2 * i,
                2 * i + 1,
                if i + 1 < n.x { 2 * i + 2 } else { 2 * i + 1 },
            ];
            let j_indices = [
                if j > 0 { 2 * j - 1 } else { 2 * j },
                2 * j,
                2 * j + 1,
                if j + 1 < n.y { 2 * j + 2 } else { 2 * j + 1 },
            ];

            let mut sum = 0.0f32;
            for y in 0..4 {
                for x in 0..4 {
                    let w = KERNEL[x] * KERNEL[y];
                    sum += w * finer[(i_indices[x], j_indices[y])];
                }
            }
            *cell = sum;
        });
    }

    /// Adds the coarser grid's correction into the finer grid.
    ///
    /// The fine index parity selects [1/4, 3/4] or [3/4, 1/4] weights per
    /// axis over the 2x2 coarse neighborhood. Panics unless
    /// `finer.size == 2 * coarser.size` on both axes.
    pub fn correct(coarser: &FdmVector2, finer: &mut FdmVector2) {
        assert_eq!(finer.size().x, 2 * coarser.size().x, "correct: size ratio must be 2");
        assert_eq!(finer.size().y, 2 * coarser.size().y, "correct: size ratio must be 2");

        // -----|-----*-----|-----
        //           to
        //  1/4   3/4   3/4   1/4
        // --*--|--*--|--*--|--*--
        let n = finer.size();
        finer.par_for_each_mut(|i, j, cell| {
            let (ci, cj) = (i / 2, j / 2);

            let (i_indices, i_weights) = if i % 2 == 0 {
                ([if i > 1 { ci - 1 } else { ci }, ci], [0.25f32, 0.75f32])
            } else {
                ([ci, if i + 1 < n.x { ci + 1 } else { ci }], [0.75, 0.25])
            };
            let (j_indices, j_weights) = if j % 2 == 0 {
                ([if j > 1 { cj - 1 } else { cj }, cj], [0.25f32, 0.75f32])
            } else {
                ([cj, if j + 1 < n.y { cj + 1 } else { cj }], [0.75, 0.25])
            };

            for y in 0..2 {
                for x in 0..2 {
                    let w = i_weights[x] * j_weights[y];
                    *cell += w * coarser[(i_indices[x], j_indices[y])];
                }
            }
        });
    }

    /// Resizes `levels` so the last entry has `coarsest_resolution` and
    /// each earlier level doubles it.
    pub fn resize_array_with_coarsest<T: Clone + Default>(
        coarsest_resolution: Size2,
        number_of_levels: usize,
        levels: &mut Vec<Array2<T>>,
    ) {
        let number_of_levels = number_of_levels.max(1);
        levels.clear();
        levels.resize(number_of_levels, Array2::new());

        // Level 0 is the finest, level number_of_levels - 1 the coarsest.
        let mut res = coarsest_resolution;
        for level in 0..number_of_levels {
            levels[number_of_levels - level - 1].resize(res, T::default());
            res = Size2::new(res.x << 1, res.y << 1);
        }
    }

    /// Resizes `levels` with level 0 at `finest_resolution`, halving while
    /// every axis is exactly divisible by two, capped at
    /// `max_number_of_levels`.
    pub fn resize_array_with_finest<T: Clone + Default>(
        finest_resolution: Size2,
        max_number_of_levels: usize,
        levels: &mut Vec<Array2<T>>,
    ) {
        let mut res = finest_resolution;
        let mut number_of_levels = 1usize;
        while number_of_levels < max_number_of_levels && res.x % 2 == 0 && res.y % 2 == 0 {
            res = Size2::new(res.x >> 1, res.y >> 1);
            number_of_levels += 1;
        }
        Self::resize_array_with_coarsest(res, number_of_levels, levels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_with_finest_stops_at_odd_axis() {
        let mut levels: Vec<Array2<f32>> = Vec::new();
        FdmMgUtils2::resize_array_with_finest(Size2::new(12, 12), 10, &mut levels);
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].size(), Size2::new(12, 12));
        assert_eq!(levels[2].size(), Size2::new(3, 3));
    }

    #[test]
    fn test_restrict_preserves_constant_field() {
        let finer = FdmVector2::with_size(Size2::new(8, 8), 2.0);
        let mut coarser = FdmVector2::with_size(Size2::new(4, 4), 0.0);
        FdmMgUtils2::restrict(&finer, &mut coarser);
        for v in coarser.as_slice() {
            assert!((v - 2.0).abs() < 1e-5, "got {}", v);
        }
    }

    #[test]
    #[should_panic(expected = "restrict: size ratio must be 2")]
    fn test_restrict_shape_mismatch_panics() {
        let finer = FdmVector2::with_size(Size2::new(6, 8), 0.0);
        let mut coarser = FdmVector2::with_size(Size2::new(4, 4), 0.0);
        FdmMgUtils2::restrict(&finer, &mut coarser);
    }

    #[test]
    #[should_panic(expected = "correct: size ratio must be 2")]
    fn test_correct_shape_mismatch_panics() {
        let coarser = FdmVector2::with_size(Size2::new(4, 4), 0.0);
        let mut finer = FdmVector2::with_size(Size2::new(8, 6), 0.0);
        FdmMgUtils2::correct(&coarser, &mut finer);
    }
}
