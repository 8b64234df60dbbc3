//! 3-D incomplete-Cholesky conjugate gradient solver.

use crate::blas::Blas;
use crate::cg::{pcg, Preconditioner};
use crate::system3::{FdmBlas3, FdmLinearSystem3, FdmLinearSystemSolver3, FdmMatrix3, FdmVector3};

/// Incomplete-Cholesky preconditioner for the symmetric FDM stencil.
///
/// `d` holds the reciprocal pivots; `y` is the forward-substitution
/// intermediate. A zero pivot degenerates to a zero row (no correction),
/// which keeps singular identity-padded systems solvable.
#[derive(Default)]
struct IncompleteCholesky {
    d: FdmVector3,
    y: FdmVector3,
}

impl Preconditioner<FdmBlas3> for IncompleteCholesky {
    fn build(&mut self, a: &FdmMatrix3) {
        let size = a.size();
        self.d.resize(size, 0.0);
        self.y.resize(size, 0.0);
        self.d.fill(0.0);

        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    let denom = a[(i, j, k)].center
                        - (if i > 0 {
                            a[(i - 1, j, k)].right * a[(i - 1, j, k)].right * self.d[(i - 1, j, k)]
                        } else {
                            0.0
                        })
                        - (if j > 0 {
                            a[(i, j - 1, k)].up * a[(i, j - 1, k)].up * self.d[(i, j - 1, k)]
                        } else {
                            0.0
                        })
                        - (if k > 0 {
                            a[(i, j, k - 1)].front * a[(i, j, k - 1)].front * self.d[(i, j, k - 1)]
                        } else {
                            0.0
                        });

                    self.d[(i, j, k)] = if denom.abs() > 0.0 { 1.0 / denom } else { 0.0 };
                }
            }
        }
    }

    fn solve(&mut self, a: &FdmMatrix3, b: &FdmVector3, x: &mut FdmVector3) {
        let size = b.size();

        // Forward substitution.
        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    self.y[(i, j, k)] = (b[(i, j, k)]
                        - (if i > 0 { a[(i - 1, j, k)].right * self.y[(i - 1, j, k)] } else { 0.0 })
                        - (if j > 0 { a[(i, j - 1, k)].up * self.y[(i, j - 1, k)] } else { 0.0 })
                        - (if k > 0 { a[(i, j, k - 1)].front * self.y[(i, j, k - 1)] } else { 0.0 }))
                        * self.d[(i, j, k)];
                }
            }
        }

        // Backward substitution.
        for k in (0..size.z).rev() {
            for j in (0..size.y).rev() {
                for i in (0..size.x).rev() {
                    x[(i, j, k)] = (self.y[(i, j, k)]
                        - (if i + 1 < size.x { a[(i, j, k)].right * x[(i + 1, j, k)] } else { 0.0 })
                        - (if j + 1 < size.y { a[(i, j, k)].up * x[(i, j + 1, k)] } else { 0.0 })
                        - (if k + 1 < size.z { a[(i, j, k)].front * x[(i, j, k + 1)] } else { 0.0 }))
                        * self.d[(i, j, k)];
                }
            }
        }
    }
}

/// 3-D finite-difference solver using incomplete-Cholesky-preconditioned
/// conjugate gradient.
pub struct FdmIccgSolver3 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    tolerance: f32,
    last_residual_norm: f32,
    r: FdmVector3,
    d: FdmVector3,
    q: FdmVector3,
    s: FdmVector3,
    precond: IncompleteCholesky,
}

impl FdmIccgSolver3 {
    pub fn new(max_number_of_iterations: u32, tolerance: f32) -> Self {
        Self {
            max_number_of_iterations,
            last_number_of_iterations: 0,
            tolerance,
            last_residual_norm: f32::MAX,
            r: FdmVector3::new(),
            d: FdmVector3::new(),
            q: FdmVector3::new(),
            s: FdmVector3::new(),
            precond: IncompleteCholesky::default(),
        }
    }

    pub fn max_number_of_iterations(&self) -> u32 {
        self.max_number_of_iterations
    }

    pub fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_iterations
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn last_residual(&self) -> f32 {
        self.last_residual_norm
    }
}

impl FdmLinearSystemSolver3 for FdmIccgSolver3 {
    fn solve(&mut self, system: &mut FdmLinearSystem3) -> bool {
        let size = system.a.size();
        assert_eq!(size, system.b.size(), "system shape mismatch");
        assert_eq!(size, system.x.size(), "system shape mismatch");

        self.r.resize(size, 0.0);
        self.d.resize(size, 0.0);
        self.q.resize(size, 0.0);
        self.s.resize(size, 0.0);

        FdmBlas3::set_scalar(0.0, &mut system.x);

        pcg::<FdmBlas3, _>(
            &system.a,
            &system.b,
            self.max_number_of_iterations,
            self.tolerance,
            &mut self.precond,
            &mut system.x,
            &mut self.r,
            &mut self.d,
            &mut self.q,
            &mut self.s,
            &mut self.last_number_of_iterations,
            &mut self.last_residual_norm,
        );

        log::info!(
            "ICCG residual: {}, iterations: {}",
            self.last_residual_norm,
            self.last_number_of_iterations
        );

        self.last_residual_norm <= self.tolerance
            || self.last_number_of_iterations < self.max_number_of_iterations
    }
}

#[cfg(test)]
mod tests {
    use freshet_core::Size3;

    use super::*;
    use crate::system3::FdmMatrixRow3;

    #[test]
    fn test_solves_poisson_system() {
        let size = Size3::new(8, 8, 8);
        let mut system = FdmLinearSystem3::new();
        system.resize(size);
        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    let mut row = FdmMatrixRow3 {
                        center: 6.0,
                        ..Default::default()
                    };
                    if i + 1 < size.x {
                        row.right = -1.0;
                    }
                    if j + 1 < size.y {
                        row.up = -1.0;
                    }
                    if k + 1 < size.z {
                        row.front = -1.0;
                    }
                    system.a[(i, j, k)] = row;
                    system.b[(i, j, k)] = 1.0;
                }
            }
        }

        let mut solver = FdmIccgSolver3::new(100, 1e-5);
        assert!(solver.solve(&mut system));

        // Verify against the residual directly.
        let mut r = FdmVector3::with_size(size, 0.0);
        FdmBlas3::residual(&system.a, &system.x, &system.b, &mut r);
        assert!(FdmBlas3::l2_norm(&r) < 1e-3);
    }

    #[test]
    fn test_identity_rows_pass_through() {
        // Non-fluid rows in the pressure system are identity with b = 0;
        // the preconditioned solver must leave them at exactly zero.
        let size = Size3::new(4, 4, 4);
        let mut system = FdmLinearSystem3::new();
        system.resize(size);
        system.a.fill(FdmMatrixRow3 {
            center: 1.0,
            ..Default::default()
        });

        let mut solver = FdmIccgSolver3::new(10, 1e-6);
        assert!(solver.solve(&mut system));
        assert!(system.x.as_slice().iter().all(|&v| v.abs() < 1e-6));
    }
}
