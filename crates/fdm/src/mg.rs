//! Generic multigrid V-cycle.

use crate::blas::Blas;

/// Level hierarchy of system matrices; level 0 is the finest.
pub struct MgMatrix<B: Blas> {
    pub levels: Vec<B::Matrix>,
}

impl<B: Blas> Default for MgMatrix<B> {
    fn default() -> Self {
        Self { levels: Vec::new() }
    }
}

impl<B: Blas> MgMatrix<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finest-level matrix.
    pub fn finest(&self) -> &B::Matrix {
        &self.levels[0]
    }
}

/// Level hierarchy of vectors; level 0 is the finest.
pub struct MgVector<B: Blas> {
    pub levels: Vec<B::Vector>,
}

impl<B: Blas> Default for MgVector<B> {
    fn default() -> Self {
        Self { levels: Vec::new() }
    }
}

impl<B: Blas> MgVector<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finest-level vector.
    pub fn finest(&self) -> &B::Vector {
        &self.levels[0]
    }
}

/// Relaxation function: `(a, b, number_of_iterations, max_tolerance, x,
/// buffer)`.
pub type RelaxFn<B> = Box<
    dyn Fn(
            &<B as Blas>::Matrix,
            &<B as Blas>::Vector,
            u32,
            f32,
            &mut <B as Blas>::Vector,
            &mut <B as Blas>::Vector,
        ) + Send
        + Sync,
>;

/// Restriction function mapping a finer grid to a coarser grid.
pub type RestrictFn<B> = fn(&<B as Blas>::Vector, &mut <B as Blas>::Vector);

/// Correction function mapping a coarser grid back to a finer grid.
pub type CorrectFn<B> = fn(&<B as Blas>::Vector, &mut <B as Blas>::Vector);

/// Multigrid input parameter set.
pub struct MgParameters<B: Blas> {
    /// Max number of multigrid levels.
    pub max_number_of_levels: usize,
    /// Number of relaxation iterations before restriction.
    pub number_of_restriction_iter: u32,
    /// Number of relaxation iterations after correction.
    pub number_of_correction_iter: u32,
    /// Number of relaxation iterations at the coarsest level.
    pub number_of_coarsest_iter: u32,
    /// Number of relaxation iterations at the final (finest) step.
    pub number_of_final_iter: u32,
    /// Relaxation function such as Gauss-Seidel.
    pub relax_fn: RelaxFn<B>,
    /// Maps the finer-grid residual onto the coarser grid.
    pub restrict_fn: RestrictFn<B>,
    /// Maps the coarser-grid correction onto the finer grid.
    pub correct_fn: CorrectFn<B>,
    /// Max error tolerance.
    pub max_tolerance: f32,
}

/// Multigrid result.
#[derive(Clone, Copy, Debug, Default)]
pub struct MgResult {
    /// Lastly measured norm of the residual.
    pub last_residual_norm: f32,
}

/// Performs multigrid with a V-cycle.
///
/// For the given hierarchy `a` and RHS `b`, computes the solution `x`.
/// `buffer` must have the same level shapes as `x`.
pub fn mg_v_cycle<B: Blas>(
    a: &MgMatrix<B>,
    params: &MgParameters<B>,
    x: &mut MgVector<B>,
    b: &mut MgVector<B>,
    buffer: &mut MgVector<B>,
) -> MgResult {
    v_cycle_at(a, params, 0, params.max_tolerance, x, b, buffer)
}

fn v_cycle_at<B: Blas>(
    a: &MgMatrix<B>,
    params: &MgParameters<B>,
    level: usize,
    tolerance: f32,
    x: &mut MgVector<B>,
    b: &mut MgVector<B>,
    buffer: &mut MgVector<B>,
) -> MgResult {
    // 1) Relax a few times on Ax = b with an arbitrary x.
    (params.relax_fn)(
        &a.levels[level],
        &b.levels[level],
        params.number_of_restriction_iter,
        tolerance,
        &mut x.levels[level],
        &mut buffer.levels[level],
    );

    if level + 1 < a.levels.len() {
        // 2) Restrict the residual onto the coarser grid's RHS and solve
        //    the error equation Ae = r there with a zero initial guess.
        B::residual(
            &a.levels[level],
            &x.levels[level],
            &b.levels[level],
            &mut buffer.levels[level],
        );
        (params.restrict_fn)(&buffer.levels[level], &mut b.levels[level + 1]);

        B::set_scalar(0.0, &mut x.levels[level + 1]);

        v_cycle_at(a, params, level + 1, tolerance * 0.5, x, b, buffer);

        // 3) Correct the finer solution with the coarse error.
        {
            let (finer, coarser) = x.levels.split_at_mut(level + 1);
            (params.correct_fn)(&coarser[0], &mut finer[level]);
        }

        // 4) Relax again with the corrected guess.
        let n_iter = if level > 0 {
            params.number_of_correction_iter
        } else {
            params.number_of_final_iter
        };
        (params.relax_fn)(
            &a.levels[level],
            &b.levels[level],
            n_iter,
            tolerance,
            &mut x.levels[level],
            &mut buffer.levels[level],
        );
    } else {
        // 5) Coarsest level: solve directly with the initial guess.
        (params.relax_fn)(
            &a.levels[level],
            &b.levels[level],
            params.number_of_coarsest_iter,
            tolerance,
            &mut x.levels[level],
            &mut buffer.levels[level],
        );
    }

    B::residual(
        &a.levels[level],
        &x.levels[level],
        &b.levels[level],
        &mut buffer.levels[level],
    );

    MgResult {
        last_residual_norm: B::l2_norm(&buffer.levels[level]),
    }
}
