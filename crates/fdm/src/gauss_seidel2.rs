//! 2-D Gauss-Seidel relaxation solver.

use freshet_core::parallel;

use crate::blas::Blas;
use crate::system2::{FdmBlas2, FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrix2, FdmVector2};

/// Finite-difference linear system solver using Gauss-Seidel relaxation,
/// optionally with SOR and red-black ordering.
pub struct FdmGaussSeidelSolver2 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    residual_check_interval: u32,
    tolerance: f32,
    last_residual: f32,
    sor_factor: f32,
    use_red_black_ordering: bool,
    residual: FdmVector2,
}

impl FdmGaussSeidelSolver2 {
    pub fn new(max_number_of_iterations: u32, residual_check_interval: u32, tolerance: f32) -> Self {
        Self::with_sor(
            max_number_of_iterations,
            residual_check_interval,
            tolerance,
            1.0,
            false,
        )
    }

    pub fn with_sor(
        max_number_of_iterations: u32,
        residual_check_interval: u32,
        tolerance: f32,
        sor_factor: f32,
        use_red_black_ordering: bool,
    ) -> Self {
        Self {
            max_number_of_iterations,
            last_number_of_iterations: 0,
            residual_check_interval,
            tolerance,
            last_residual: f32::MAX,
            sor_factor,
            use_red_black_ordering,
            residual: FdmVector2::new(),
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
        self.last_residual
    }

    pub fn sor_factor(&self) -> f32 {
        self.sor_factor
    }

    pub fn use_red_black_ordering(&self) -> bool {
        self.use_red_black_ordering
    }

    /// Single natural-ordering relaxation sweep.
    pub fn relax(a: &FdmMatrix2, b: &FdmVector2, sor_factor: f32, x: &mut FdmVector2) {
        let size = a.size();
        for j in 0..size.y {
            for i in 0..size.x {
                let r = (if i > 0 { a[(i - 1, j)].right * x[(i - 1, j)] } else { 0.0 })
                    + (if i + 1 < size.x { a[(i, j)].right * x[(i + 1, j)] } else { 0.0 })
                    + (if j > 0 { a[(i, j - 1)].up * x[(i, j - 1)] } else { 0.0 })
                    + (if j + 1 < size.y { a[(i, j)].up * x[(i, j + 1)] } else { 0.0 });

                x[(i, j)] = (1.0 - sor_factor) * x[(i, j)]
                    + sor_factor * (b[(i, j)] - r) / a[(i, j)].center;
            }
        }
    }

    /// Single red-black relaxation sweep.
    ///
    /// Stencil neighbors always have the opposite parity, so within one
    /// half-sweep every write targets a cell no other task reads or
    /// writes. That makes the per-color fan-out race-free.
    pub fn relax_red_black(a: &FdmMatrix2, b: &FdmVector2, sor_factor: f32, x: &mut FdmVector2) {
        let size = a.size();
        let x_ptr = SendPtr(x.as_mut_slice().as_mut_ptr());
        let idx = |i: usize, j: usize| i + size.x * j;

        for pass in 0..2usize {
            parallel::parallel_for(0, size.y, |j| {
                // Force the closure to capture the whole `SendPtr` (which is
                // `Sync`) rather than its inner `*mut f32` field.
                let _ = &x_ptr;
                // SAFETY: all concurrent accesses go through raw pointer
                // reads/writes; writes touch only (i+j)%2 == pass cells and
                // reads only the opposite color plus the task's own cell.
                let read = |i: usize, j: usize| unsafe { *x_ptr.0.add(idx(i, j)) };
                let mut i = (j + pass) % 2;
                while i < size.x {
                    let r = (if i > 0 { a[(i - 1, j)].right * read(i - 1, j) } else { 0.0 })
                        + (if i + 1 < size.x { a[(i, j)].right * read(i + 1, j) } else { 0.0 })
                        + (if j > 0 { a[(i, j - 1)].up * read(i, j - 1) } else { 0.0 })
                        + (if j + 1 < size.y { a[(i, j)].up * read(i, j + 1) } else { 0.0 });

                    let relaxed = (1.0 - sor_factor) * read(i, j)
                        + sor_factor * (b[(i, j)] - r) / a[(i, j)].center;
                    unsafe {
                        *x_ptr.0.add(idx(i, j)) = relaxed;
                    }
                    i += 2;
                }
            });
        }
    }
}

struct SendPtr(*mut f32);
unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

impl FdmLinearSystemSolver2 for FdmGaussSeidelSolver2 {
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool {
        self.residual.resize(system.x.size(), 0.0);
        self.last_number_of_iterations = self.max_number_of_iterations;

        for iter in 0..self.max_number_of_iterations {
            if self.use_red_black_ordering {
                Self::relax_red_black(&system.a, &system.b, self.sor_factor, &mut system.x);
            } else {
                Self::relax(&system.a, &system.b, self.sor_factor, &mut system.x);
            }

            if iter != 0 && iter % self.residual_check_interval == 0 {
                FdmBlas2::residual(&system.a, &system.x, &system.b, &mut self.residual);
                if FdmBlas2::l2_norm(&self.residual) < self.tolerance {
                    self.last_number_of_iterations = iter + 1;
                    break;
                }
            }
        }

        FdmBlas2::residual(&system.a, &system.x, &system.b, &mut self.residual);
        self.last_residual = FdmBlas2::l2_norm(&self.residual);

        self.last_residual < self.tolerance
    }
}
