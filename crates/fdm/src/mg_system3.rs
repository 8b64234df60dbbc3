//! 3-D multigrid FDM system and level utilities.

use freshet_core::{Array3, Size3};

use crate::mg::{MgMatrix, MgVector};
use crate::system3::{FdmBlas3, FdmMatrixRow3, FdmVector3};

/// Multigrid-style 3-D FDM matrix.
pub type FdmMgMatrix3 = MgMatrix<FdmBlas3>;
/// Multigrid-style 3-D FDM vector.
pub type FdmMgVector3 = MgVector<FdmBlas3>;

/// Multigrid linear system: per-level matrix, solution, and RHS.
///
/// Level L+1 has exactly half the resolution of level L along every axis.
#[derive(Default)]
pub struct FdmMgLinearSystem3 {
    /// The system matrix hierarchy.
    pub a: FdmMgMatrix3,
    /// The solution hierarchy.
    pub x: FdmMgVector3,
    /// The RHS hierarchy.
    pub b: FdmMgVector3,
}

impl FdmMgLinearSystem3 {
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
    pub fn resize_with_coarsest(&mut self, coarsest_resolution: Size3, number_of_levels: usize) {
        FdmMgUtils3::resize_array_with_coarsest(
            coarsest_resolution,
            number_of_levels,
            &mut self.a.levels,
        );
        FdmMgUtils3::resize_array_with_coarsest(
            coarsest_resolution,
            number_of_levels,
            &mut self.x.levels,
        );
        FdmMgUtils3::resize_array_with_coarsest(
            coarsest_resolution,
            number_of_levels,
            &mut self.b.levels,
        );
    }

    /// Resizes the system with level 0 at `finest_resolution`, adding
    /// coarser levels by halving while every axis stays exactly divisible
    /// by two, up to `max_number_of_levels`.
    pub fn resize_with_finest(&mut self, finest_resolution: Size3, max_number_of_levels: usize) {
        FdmMgUtils3::resize_array_with_finest(
            finest_resolution,
            max_number_of_levels,
            &mut self.a.levels,
        );
        FdmMgUtils3::resize_array_with_finest(
            finest_resolution,
            max_number_of_levels,
            &mut self.x.levels,
        );
        FdmMgUtils3::resize_array_with_finest(
            finest_resolution,
            max_number_of_levels,
            &mut self.b.levels,
        );
    }
}

/// Multigrid utilities for the 3-D FDM system.
pub struct FdmMgUtils3;

impl FdmMgUtils3 {
    /// Restricts the finer grid onto the coarser grid.
    ///
    /// Each coarse cell accumulates a tensor-product
    /// [1/8, 3/8, 3/8, 1/8] stencil over its 4x4x4 finer neighborhood,
    /// reusing boundary indices instead of reading out of range. Panics
    /// unless `finer.size == 2 * coarser.size` on every axis.
    pub fn restrict(finer: &FdmVector3, coarser: &mut FdmVector3) {
        assert_eq!(finer.size().x, 2 * coarser.size().x, "restrict: size ratio must be 2");
        assert_eq!(finer.size().y, 2 * coarser.size().y, "restrict: size ratio must be 2");
        assert_eq!(finer.size().z, 2 * coarser.size().z, "restrict: size ratio must be 2");

        // --*--|--*--|--*--|--*--
        //  1/8   3/8   3/8   1/8
        //           to
        // -----|-----*-----|-----
        const KERNEL: [f32; 4] = [0.125, 0.375, 0.375, 0.125];

        let n = coarser.size();
        coarser.par_for_each_mut(|i, j, k, cell| {
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
            let k_indices = [
                if k > 0 { 2 * k - 1 } else { 2 * k },
                2 * k,
                2 * k + 1,
                if k + 1 < n.z { 2 * k + 2 } else { 2 * k + 1 },
            ];

            let mut sum = 0.0f32;
            for z in 0..4 {
                for y in 0..4 {
                    for x in 0..4 {
                        let w = KERNEL[x] * KERNEL[y] * KERNEL[z];
                        sum += w * finer[(i_indices[x], j_indices[y], k_indices[z])];
                    }
                }
            }
            *cell = sum;
        });
    }

    /// Adds the coarser grid's correction into the finer grid.
    ///
    /// The fine index parity selects [1/4, 3/4] or [3/4, 1/4] weights per
    /// axis over the 2x2x2 coarse neighborhood. Panics unless
    /// `finer.size == 2 * coarser.size` on every axis.
    pub fn correct(coarser: &FdmVector3, finer: &mut FdmVector3) {
        assert_eq!(finer.size().x, 2 * coarser.size().x, "correct: size ratio must be 2");
        assert_eq!(finer.size().y, 2 * coarser.size().y, "correct: size ratio must be 2");
        assert_eq!(finer.size().z, 2 * coarser.size().z, "correct: size ratio must be 2");

        // -----|-----*-----|-----
        //           to
        //  1/4   3/4   3/4   1/4
        // --*--|--*--|--*--|--*--
        let n = finer.size();
        finer.par_for_each_mut(|i, j, k, cell| {
            let (ci, cj, ck) = (i / 2, j / 2, k / 2);

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
            let (k_indices, k_weights) = if k % 2 == 0 {
                ([if k > 1 { ck - 1 } else { ck }, ck], [0.25f32, 0.75f32])
            } else {
                ([ck, if k + 1 < n.z { ck + 1 } else { ck }], [0.75, 0.25])
            };

            for z in 0..2 {
                for y in 0..2 {
                    for x in 0..2 {
                        let w = i_weights[x] * j_weights[y] * k_weights[z];
                        *cell += w * coarser[(i_indices[x], j_indices[y], k_indices[z])];
                    }
                }
            }
        });
    }

    /// Resizes `levels` so the last entry has `coarsest_resolution` and
    /// each earlier level doubles it.
    pub fn resize_array_with_coarsest<T: Clone + Default>(
        coarsest_resolution: Size3,
        number_of_levels: usize,
        levels: &mut Vec<Array3<T>>,
    ) {
        let number_of_levels = number_of_levels.max(1);
        levels.clear();
        levels.resize(number_of_levels, Array3::new());

        // Level 0 is the finest, level number_of_levels - 1 the coarsest.
        let mut res = coarsest_resolution;
        for level in 0..number_of_levels {
            levels[number_of_levels - level - 1].resize(res, T::default());
            res = Size3::new(res.x << 1, res.y << 1, res.z << 1);
        }
    }

    /// Resizes `levels` with level 0 at `finest_resolution`, halving while
    /// every axis is exactly divisible by two, capped at
    /// `max_number_of_levels`.
    pub fn resize_array_with_finest<T: Clone + Default>(
        finest_resolution: Size3,
        max_number_of_levels: usize,
        levels: &mut Vec<Array3<T>>,
    ) {
        let mut res = finest_resolution;
        let mut number_of_levels = 1usize;
        while number_of_levels < max_number_of_levels
            && res.x % 2 == 0
            && res.y % 2 == 0
            && res.z % 2 == 0
        {
            res = Size3::new(res.x >> 1, res.y >> 1, res.z >> 1);
            number_of_levels += 1;
        }
        Self::resize_array_with_coarsest(res, number_of_levels, levels);
    }
}
