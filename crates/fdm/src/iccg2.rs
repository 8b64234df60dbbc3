//! 2-D incomplete-Cholesky conjugate gradient solver.

use crate::blas::Blas;
use crate::cg::{pcg, Preconditioner};
use crate::system2::{FdmBlas2, FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrix2, FdmVector2};

/// Incomplete-Cholesky preconditioner for the symmetric FDM stencil.
#[derive(Default)]
struct IncompleteCholesky {
    d: FdmVector2,
    y: FdmVector2,
}

impl Preconditioner<FdmBlas2> for IncompleteCholesky {
    fn build(&mut self, a: &FdmMatrix2) {
        let size = a.size();
        self.d.resize(size, 0.0);
        self.y.resize(size, 0.0);
        self.d.fill(0.0);

        for j in 0..size.y {
            for i in 0..size.x {
                let denom = a[(i, j)].center
                    - (if i > 0 {
                        a[(i - 1, j)].right * a[(i - 1, j)].right * self.d[(i - 1, j)]
                    } else {
                        0.0
                    })
                    - (if j > 0 {
                        a[(i, j - 1)].up * a[(i, j - 1)].up * self.d[(i, j - 1)]
                    } else {
                        0.0
                    });

                self.d[(i, j)] = if denom.abs() > 0.0 { 1.0 / denom } else { 0.0 };
            }
        }
    }

    fn solve(&mut self, a: &FdmMatrix2, b: &FdmVector2, x: &mut FdmVector2) {
        let size = b.size();

        // Forward substitution.
        for j in 0..size.y {
            for i in 0..size.x {
                self.y[(i, j)] = (b[(i, j)]
                    - (if i > 0 { a[(i - 1, j)].right * self.y[(i - 1, j)] } else { 0.0 })
                    - (if j > 0 { a[(i, j - 1)].up * self.y[(i, j - 1)] } else { 0.0 }))
                    * self.d[(i, j)];
            }
        }

        // Backward substitution.
        for j in (0..size.y).rev() {
            for i in (0..size.x).rev() {
                x[(i, j)] = (self.y[(i, j)]
                    - (if i + 1 < size.x { a[(i, j)].right * x[(i + 1, j)] } else { 0.0 })
                    - (if j + 1 < size.y { a[(i, j)].up * x[(i, j + 1)] } else { 0.0 }))
                    * self.d[(i, j)];
            }
        }
    }
}

/// 2-D finite-difference solver using incomplete-Cholesky-preconditioned
/// conjugate gradient.
pub struct FdmIccgSolver2 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    tolerance: f32,
    last_residual_norm: f32,
    r: FdmVector2,
    d: FdmVector2,
    q: FdmVector2,
    s: FdmVector2,
    precond: IncompleteCholesky,
}

impl FdmIccgSolver2 {
    pub fn new(max_number_of_iterations: u32, tolerance: f32) -> Self {
        Self {
            max_number_of_iterations,
            last_number_of_iterations: 0,
            tolerance,
            last_residual_norm: f32::MAX,
            r: FdmVector2::new(),
            d: FdmVector2::new(),
            q: FdmVector2::new(),
            s: FdmVector2::new(),
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

impl FdmLinearSystemSolver2 for FdmIccgSolver2 {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool {
        let size = system.a.size();
        assert_eq!(size, system.b.size(), "system shape mismatch");
        assert_eq!(size, system.x.size(), "system shape mismatch");

        self.r.resize(size, 0.0);
        self.d.resize(size, 0.0);
        self.q.resize(size, 0.0);
        self.s.resize(size, 0.0);

        FdmBlas2::set_scalar(0.0, &mut system.x);

        pcg::<FdmBlas2, _>(
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
