//! 3-D multigrid solver.

use crate::gauss_seidel3::FdmGaussSeidelSolver3;
use crate::mg::{mg_v_cycle, MgParameters};
use crate::mg_system3::{FdmMgLinearSystem3, FdmMgUtils3, FdmMgVector3};
use crate::system3::FdmBlas3;

/// Finite-difference linear system solver using a multigrid V-cycle with
/// Gauss-Seidel relaxation.
pub struct FdmMgSolver3 {
    mg_params: MgParameters<FdmBlas3>,
    sor_factor: f32,
    use_red_black_ordering: bool,
}

impl FdmMgSolver3 {
    pub fn new(max_number_of_levels: usize) -> Self {
        Self::with_parameters(max_number_of_levels, 5, 5, 20, 20, 1e-9, 1.5, false)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_parameters(
        max_number_of_levels: usize,
        number_of_restriction_iter: u32,
        number_of_correction_iter: u32,
        number_of_coarsest_iter: u32,
        number_of_final_iter: u32,
        max_tolerance: f32,
        sor_factor: f32,
        use_red_black_ordering: bool,
    ) -> Self {
        let relax_fn: crate::mg::RelaxFn<FdmBlas3> = if use_red_black_ordering {
            Box::new(move |a, b, number_of_iterations, _max_tolerance, x, _buffer| {
                for _ in 0..number_of_iterations {
                    FdmGaussSeidelSolver3::relax_red_black(a, b, sor_factor, x);
                }
            })
        } else {
            Box::new(move |a, b, number_of_iterations, _max_tolerance, x, _buffer| {
                for _ in 0..number_of_iterations {
                    FdmGaussSeidelSolver3::relax(a, b, sor_factor, x);
                }
            })
        };

        Self {
            mg_params: MgParameters {
                max_number_of_levels,
                number_of_restriction_iter,
                number_of_correction_iter,
                number_of_coarsest_iter,
                number_of_final_iter,
                relax_fn,
                restrict_fn: FdmMgUtils3::restrict,
                correct_fn: FdmMgUtils3::correct,
                max_tolerance,
            },
            sor_factor,
            use_red_black_ordering,
        }
    }

    /// The multigrid parameters.
    pub fn params(&self) -> &MgParameters<FdmBlas3> {
        &self.mg_params
    }

    /// The SOR (successive over-relaxation) factor.
    pub fn sor_factor(&self) -> f32 {
        self.sor_factor
    }

    /// True if red-black ordering is enabled.
    pub fn use_red_black_ordering(&self) -> bool {
        self.use_red_black_ordering
    }

    /// Solves the multigrid system with one V-cycle.
    pub fn solve(&mut self, system: &mut FdmMgLinearSystem3) -> bool {
        let mut buffer = FdmMgVector3::new();
        buffer.levels = system.x.levels.to_vec();

        let result = mg_v_cycle::<FdmBlas3>(
            &system.a,
            &self.mg_params,
            &mut system.x,
            &mut system.b,
            &mut buffer,
        );
        result.last_residual_norm < self.mg_params.max_tolerance
    }
}

#[cfg(test)]
mod tests {
    use freshet_core::Size3;

    use super::*;
    use crate::blas::Blas;
    use crate::system3::FdmMatrixRow3;

    #[test]
    fn test_v_cycle_reduces_residual() {
        let mut system = FdmMgLinearSystem3::new();
        system.resize_with_coarsest(Size3::new(4, 4, 4), 3);

        let size = system.a.levels[0].size();
        for level in 0..system.number_of_levels() {
            let n = system.a.levels[level].size();
            for k in 0..n.z {
                for j in 0..n.y {
                    for i in 0..n.x {
                        let mut row = FdmMatrixRow3 {
                            center: 6.0,
                            ..Default::default()
                        };
                        if i + 1 < n.x {
                            row.right = -1.0;
                        }
                        if j + 1 < n.y {
                            row.up = -1.0;
                        }
                        if k + 1 < n.z {
                            row.front = -1.0;
                        }
                        system.a.levels[level][(i, j, k)] = row;
                    }
                }
            }
        }
        system.b.levels[0].fill(1.0);

        let initial_residual = {
            let mut r = system.x.levels[0].clone();
            FdmBlas3::residual(
                &system.a.levels[0],
                &system.x.levels[0],
                &system.b.levels[0],
                &mut r,
            );
            FdmBlas3::l2_norm(&r)
        };

        let mut solver = FdmMgSolver3::new(3);
        let _ = solver.solve(&mut system);

        let mut r = system.x.levels[0].clone();
        FdmBlas3::residual(
            &system.a.levels[0],
            &system.x.levels[0],
            &system.b.levels[0],
            &mut r,
        );
        let final_residual = FdmBlas3::l2_norm(&r);

        assert_eq!(size, Size3::new(16, 16, 16));
        assert!(
            final_residual < 0.1 * initial_residual,
            "V-cycle should shrink the residual: {} -> {}",
            initial_residual,
            final_residual
        );
    }
}
