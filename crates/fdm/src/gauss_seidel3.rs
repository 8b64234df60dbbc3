//! 3-D Gauss-Seidel relaxation solver.

use freshet_core::parallel;

use crate::blas::Blas;
use crate::system3::{FdmBlas3, FdmLinearSystem3, FdmLinearSystemSolver3, FdmMatrix3, FdmVector3};

/// Finite-difference linear system solver using Gauss-Seidel relaxation,
/// optionally with SOR and red-black ordering.
pub struct FdmGaussSeidelSolver3 {
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    residual_check_interval: u32,
    tolerance: f32,
    last_residual: f32,
    sor_factor: f32,
    use_red_black_ordering: bool,
    residual: FdmVector3,
}

impl FdmGaussSeidelSolver3 {
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
            residual: FdmVector3::new(),
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
    pub fn relax(a: &FdmMatrix3, b: &FdmVector3, sor_factor: f32, x: &mut FdmVector3) {
        let size = a.size();
        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    let r = (if i > 0 { a[(i - 1, j, k)].right * x[(i - 1, j, k)] } else { 0.0 })
                        + (if i + 1 < size.x { a[(i, j, k)].right * x[(i + 1, j, k)] } else { 0.0 })
                        + (if j > 0 { a[(i, j - 1, k)].up * x[(i, j - 1, k)] } else { 0.0 })
                        + (if j + 1 < size.y { a[(i, j, k)].up * x[(i, j + 1, k)] } else { 0.0 })
                        + (if k > 0 { a[(i, j, k - 1)].front * x[(i, j, k - 1)] } else { 0.0 })
                        + (if k + 1 < size.z { a[(i, j, k)].front * x[(i, j, k + 1)] } else { 0.0 });

                    x[(i, j, k)] = (1.0 - sor_factor) * x[(i, j, k)]
                        + sor_factor * (b[(i, j, k)] - r) / a[(i, j, k)].center;
                }
            }
        }
    }

    /// Single red-black relaxation sweep.
    ///
    /// Stencil neighbors always have the opposite parity, so within one
    /// half-sweep every write targets a cell no other task reads or
    /// writes. That makes the per-color fan-out race-free.
    pub fn relax_red_black(a: &FdmMatrix3, b: &FdmVector3, sor_factor: f32, x: &mut FdmVector3) {
        let size = a.size();
        let x_ptr = SendPtr(x.as_mut_slice().as_mut_ptr());
        let idx = |i: usize, j: usize, k: usize| i + size.x * (j + size.y * k);

        for pass in 0..2usize {
            parallel::parallel_for(0, size.z, |k| {
                // Force the closure to capture the whole `SendPtr` (which is
                // `Sync`) rather than its inner `*mut f32` field.
                let _ = &x_ptr;
                // SAFETY: all concurrent accesses go through raw pointer
                // reads/writes; writes touch only (i+j+k)%2 == pass cells and
                // reads only the opposite color plus the task's own cell.
                let read = |i: usize, j: usize, k: usize| unsafe { *x_ptr.0.add(idx(i, j, k)) };
                for j in 0..size.y {
                    let mut i = (j + k + pass) % 2;
                    while i < size.x {
                        let r = (if i > 0 { a[(i - 1, j, k)].right * read(i - 1, j, k) } else { 0.0 })
                            + (if i + 1 < size.x { a[(i, j, k)].right * read(i + 1, j, k) } else { 0.0 })
                            + (if j > 0 { a[(i, j - 1, k)].up * read(i, j - 1, k) } else { 0.0 })
                            + (if j + 1 < size.y { a[(i, j, k)].up * read(i, j + 1, k) } else { 0.0 })
                            + (if k > 0 { a[(i, j, k - 1)].front * read(i, j, k - 1) } else { 0.0 })
                            + (if k + 1 < size.z { a[(i, j, k)].front * read(i, j, k + 1) } else { 0.0 });

                        let relaxed = (1.0 - sor_factor) * read(i, j, k)
                            + sor_factor * (b[(i, j, k)] - r) / a[(i, j, k)].center;
                        unsafe {
                            *x_ptr.0.add(idx(i, j, k)) = relaxed;
                        }
                        i += 2;
                    }
                }
            });
        }
    }
}

struct SendPtr(*mut f32);
unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

impl FdmLinearSystemSolver3 for FdmGaussSeidelSolver3 {
    fn solve(&mut self, system: &mut FdmLinearSystem3) -> bool {
        self.residual.resize(system.x.size(), 0.0);
        self.last_number_of_iterations = self.max_number_of_iterations;

        for iter in 0..self.max_number_of_iterations {
            if self.use_red_black_ordering {
                Self::relax_red_black(&system.a, &system.b, self.sor_factor, &mut system.x);
            } else {
                Self::relax(&system.a, &system.b, self.sor_factor, &mut system.x);
            }

            if iter != 0 && iter % self.residual_check_interval == 0 {
                FdmBlas3::residual(&system.a, &system.x, &system.b, &mut self.residual);
                if FdmBlas3::l2_norm(&self.residual) < self.tolerance {
                    self.last_number_of_iterations = iter + 1;
                    break;
                }
            }
        }

        FdmBlas3::residual(&system.a, &system.x, &system.b, &mut self.residual);
        self.last_residual = FdmBlas3::l2_norm(&self.residual);

        self.last_residual < self.tolerance
    }
}
