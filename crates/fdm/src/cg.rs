//! Preconditioned conjugate gradient.

use crate::blas::Blas;

/// Preconditioner contract for [`pcg`].
pub trait Preconditioner<B: Blas> {
    /// Prepares internal state for `a`.
    fn build(&mut self, a: &B::Matrix);

    /// Applies the approximate inverse: `x = M^-1 b`.
    fn solve(&mut self, a: &B::Matrix, b: &B::Vector, x: &mut B::Vector);
}

/// Solves `Ax = b` with preconditioned conjugate gradient.
///
/// `r`, `d`, `q`, `s` are caller-provided scratch vectors sized like `x`.
/// The true residual is recomputed every 50 iterations (and after a
/// sigma increase) to limit drift from the incremental update.
#[allow(clippy::too_many_arguments)]
pub fn pcg<B: Blas, M: Preconditioner<B>>(
    a: &B::Matrix,
    b: &B::Vector,
    max_number_of_iterations: u32,
    tolerance: f32,
    m: &mut M,
    x: &mut B::Vector,
    r: &mut B::Vector,
    d: &mut B::Vector,
    q: &mut B::Vector,
    s: &mut B::Vector,
    last_number_of_iterations: &mut u32,
    last_residual_norm: &mut f32,
) {
    B::set_scalar(0.0, r);
    B::set_scalar(0.0, d);
    B::set_scalar(0.0, q);
    B::set_scalar(0.0, s);

    m.build(a);

    // r = b - Ax
    B::residual(a, x, b, r);

    // d = M^-1 r
    m.solve(a, r, d);

    // sigma = r . d
    let mut sigma_new = B::dot(r, d);

    let mut iter = 0u32;
    let mut trigger = false;
    while sigma_new > tolerance * tolerance && iter < max_number_of_iterations {
        // q = Ad
        B::mvm(a, d, q);

        // alpha = sigma / d.q
        let alpha = sigma_new / B::dot(d, q);

        // x += alpha * d
        B::axpy(alpha, d, x);

        if trigger || (iter % 50 == 0 && iter > 0) {
            // r = b - Ax
            B::residual(a, x, b, r);
            trigger = false;
        } else {
            // r -= alpha * q
            B::axpy(-alpha, q, r);
        }

        // s = M^-1 r
        m.solve(a, r, s);

        let sigma_old = sigma_new;
        sigma_new = B::dot(r, s);
        if sigma_new > sigma_old {
            trigger = true;
        }

        // d = s + beta * d
        let beta = sigma_new / sigma_old;
        B::xpay(beta, s, d);

        iter += 1;
    }

    *last_number_of_iterations = iter;
    *last_residual_norm = B::l2_norm(r);
}
