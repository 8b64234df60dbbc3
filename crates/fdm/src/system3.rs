//! 3-D FDM linear system.

use freshet_core::{Array3, Size3};

use crate::blas::Blas;

/// Matrix row for the (i, j, k) grid point.
///
/// The stencil is symmetric, so only the positive-direction off-diagonals
/// are stored; a neighbor's negative-direction coefficient is read from
/// that neighbor's row.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FdmMatrixRow3 {
    /// Diagonal component (row, row).
    pub center: f32,
    /// Off-diagonal toward (i+1, j, k).
    pub right: f32,
    /// Off-diagonal toward (i, j+1, k).
    pub up: f32,
    /// Off-diagonal toward (i, j, k+1).
    pub front: f32,
}

/// Vector type for 3-D finite differencing.
pub type FdmVector3 = Array3<f32>;
/// Matrix type for 3-D finite differencing.
pub type FdmMatrix3 = Array3<FdmMatrixRow3>;

/// Linear system `Ax = b` for 3-D finite differencing.
#[derive(Clone, Debug, Default)]
pub struct FdmLinearSystem3 {
    /// System matrix.
    pub a: FdmMatrix3,
    /// Solution vector.
    pub x: FdmVector3,
    /// RHS vector.
    pub b: FdmVector3,
}

impl FdmLinearSystem3 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all storage.
    pub fn clear(&mut self) {
        self.a.clear();
        self.x.clear();
        self.b.clear();
    }

    /// Resizes all three arrays to `size`.
    pub fn resize(&mut self, size: Size3) {
        self.a.resize(size, FdmMatrixRow3::default());
        self.x.resize(size, 0.0);
        self.b.resize(size, 0.0);
    }
}

/// Opaque iterative solver for flat (single-level) 3-D systems.
pub trait FdmLinearSystemSolver3 {
    /// Solves the system in place; returns true on convergence.
    fn solve(&mut self, system: &mut FdmLinearSystem3) -> bool;
}

/// BLAS kernels for 3-D finite differencing.
pub struct FdmBlas3;

impl Blas for FdmBlas3 {
    type Vector = FdmVector3;
    type Matrix = FdmMatrix3;

    fn set_scalar(s: f32, result: &mut FdmVector3) {
        result.fill(s);
    }

    fn copy(v: &FdmVector3, result: &mut FdmVector3) {
        result.set_from(v);
    }

    fn dot(a: &FdmVector3, b: &FdmVector3) -> f32 {
        assert_eq!(a.size(), b.size(), "dot: shape mismatch");
        a.as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| x * y)
            .sum()
    }

    fn axpy(a: f32, x: &FdmVector3, y: &mut FdmVector3) {
        assert_eq!(x.size(), y.size(), "axpy: shape mismatch");
        y.as_mut_slice()
            .iter_mut()
            .zip(x.as_slice())
            .for_each(|(yi, xi)| *yi += a * xi);
    }

    fn xpay(a: f32, x: &FdmVector3, y: &mut FdmVector3) {
        assert_eq!(x.size(), y.size(), "xpay: shape mismatch");
        y.as_mut_slice()
            .iter_mut()
            .zip(x.as_slice())
            .for_each(|(yi, xi)| *yi = xi + a * *yi);
    }

    fn mvm(m: &FdmMatrix3, v: &FdmVector3, result: &mut FdmVector3) {
        let size = m.size();
        assert_eq!(size, v.size(), "mvm: shape mismatch");
        assert_eq!(size, result.size(), "mvm: shape mismatch");

        result.par_fill_with(|i, j, k| {
            m[(i, j, k)].center * v[(i, j, k)]
                + if i > 0 { m[(i - 1, j, k)].right * v[(i - 1, j, k)] } else { 0.0 }
                + if i + 1 < size.x { m[(i, j, k)].right * v[(i + 1, j, k)] } else { 0.0 }
                + if j > 0 { m[(i, j - 1, k)].up * v[(i, j - 1, k)] } else { 0.0 }
                + if j + 1 < size.y { m[(i, j, k)].up * v[(i, j + 1, k)] } else { 0.0 }
                + if k > 0 { m[(i, j, k - 1)].front * v[(i, j, k - 1)] } else { 0.0 }
                + if k + 1 < size.z { m[(i, j, k)].front * v[(i, j, k + 1)] } else { 0.0 }
        });
    }

    fn residual(a: &FdmMatrix3, x: &FdmVector3, b: &FdmVector3, result: &mut FdmVector3) {
        let size = a.size();
        assert_eq!(size, x.size(), "residual: shape mismatch");
        assert_eq!(size, b.size(), "residual: shape mismatch");
        assert_eq!(size, result.size(), "residual: shape mismatch");

        result.par_fill_with(|i, j, k| {
            b[(i, j, k)]
                - a[(i, j, k)].center * x[(i, j, k)]
                - if i > 0 { a[(i - 1, j, k)].right * x[(i - 1, j, k)] } else { 0.0 }
                - if i + 1 < size.x { a[(i, j, k)].right * x[(i + 1, j, k)] } else { 0.0 }
                - if j > 0 { a[(i, j - 1, k)].up * x[(i, j - 1, k)] } else { 0.0 }
                - if j + 1 < size.y { a[(i, j, k)].up * x[(i, j + 1, k)] } else { 0.0 }
                - if k > 0 { a[(i, j, k - 1)].front * x[(i, j, k - 1)] } else { 0.0 }
                - if k + 1 < size.z { a[(i, j, k)].front * x[(i, j, k + 1)] } else { 0.0 }
        });
    }

    fn linf_norm(v: &FdmVector3) -> f32 {
        v.as_slice().iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_system(size: Size3) -> FdmLinearSystem3 {
        let mut system = FdmLinearSystem3::new();
        system.resize(size);
        system.a.fill(FdmMatrixRow3 {
            center: 1.0,
            ..Default::default()
        });
        system
    }

    #[test]
    fn test_mvm_identity() {
        let size = Size3::new(3, 3, 3);
        let system = identity_system(size);
        let mut v = FdmVector3::with_size(size, 0.0);
        v[(1, 1, 1)] = 5.0;
        let mut result = FdmVector3::with_size(size, 0.0);
        FdmBlas3::mvm(&system.a, &v, &mut result);
        assert_eq!(result[(1, 1, 1)], 5.0);
        assert_eq!(result[(0, 0, 0)], 0.0);
    }

    #[test]
    fn test_residual_zero_for_exact_solution() {
        let size = Size3::new(3, 3, 3);
        let mut system = identity_system(size);
        system.b.fill(2.0);
        system.x.fill(2.0);
        let mut r = FdmVector3::with_size(size, 1.0);
        FdmBlas3::residual(&system.a, &system.x, &system.b, &mut r);
        assert!(FdmBlas3::l2_norm(&r) < 1e-6);
    }

    #[test]
    #[should_panic(expected = "dot: shape mismatch")]
    fn test_dot_shape_mismatch_panics() {
        let a = FdmVector3::with_size(Size3::new(2, 2, 2), 0.0);
        let b = FdmVector3::with_size(Size3::new(3, 2, 2), 0.0);
        FdmBlas3::dot(&a, &b);
    }

    #[test]
    fn test_axpy_accumulates() {
        use approx::assert_relative_eq;

        let size = Size3::new(2, 2, 2);
        let x = FdmVector3::with_size(size, 3.0);
        let mut y = FdmVector3::with_size(size, 1.0);
        FdmBlas3::axpy(2.0, &x, &mut y);
        for &v in y.as_slice() {
            assert_relative_eq!(v, 7.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_xpay_scales_then_adds() {
        use approx::assert_relative_eq;

        let size = Size3::new(2, 2, 2);
        let x = FdmVector3::with_size(size, 3.0);
        let mut y = FdmVector3::with_size(size, 1.0);
        FdmBlas3::xpay(2.0, &x, &mut y);
        for &v in y.as_slice() {
            assert_relative_eq!(v, 5.0, epsilon = 1e-6);
        }
    }
}
