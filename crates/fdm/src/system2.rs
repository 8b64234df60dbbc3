//! 2-D FDM linear system.

use freshet_core::{Array2, Size2};

use crate::blas::Blas;

/// Matrix row for the (i, j) grid point.
///
/// The stencil is symmetric, so only the positive-direction off-diagonals
/// are stored; a neighbor's negative-direction coefficient is read from
/// that neighbor's row.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FdmMatrixRow2 {
    /// Diagonal component (row, row).
    pub center: f32,
    /// Off-diagonal toward (i+1, j).
    pub right: f32,
    /// Off-diagonal toward (i, j+1).
    pub up: f32,
}

/// Vector type for 2-D finite differencing.
pub type FdmVector2 = Array2<f32>;
/// Matrix type for 2-D finite differencing.
pub type FdmMatrix2 = Array2<FdmMatrixRow2>;

/// Linear system `Ax = b` for 2-D finite differencing.
#[derive(Clone, Debug, Default)]
pub struct FdmLinearSystem2 {
    /// System matrix.
    pub a: FdmMatrix2,
    /// Solution vector.
    pub x: FdmVector2,
    /// RHS vector.
    pub b: FdmVector2,
}

impl FdmLinearSystem2 {
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
    pub fn resize(&mut self, size: Size2) {
        self.a.resize(size, FdmMatrixRow2::default());
        self.x.resize(size, 0.0);
        self.b.resize(size, 0.0);
    }
}

/// Opaque iterative solver for flat (single-level) 2-D systems.
pub trait FdmLinearSystemSolver2 {
    /// Solves the system in place; returns true on convergence.
    fn solve(&mut self, system: &mut FdmLinearSystem2) -> bool;
}

/// BLAS kernels for 2-D finite differencing.
pub struct FdmBlas2;

impl Blas for FdmBlas2 {
    type Vector = FdmVector2;
    type Matrix = FdmMatrix2;

    fn set_scalar(s: f32, result: &mut FdmVector2) {
        result.fill(s);
    }

    fn copy(v: &FdmVector2, result: &mut FdmVector2) {
        result.set_from(v);
    }

    fn dot(a: &FdmVector2, b: &FdmVector2) -> f32 {
        assert_eq!(a.size(), b.size(), "dot: shape mismatch");
        a.as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| x * y)
            .sum()
    }

    fn axpy(a: f32, x: &FdmVector2, y: &mut FdmVector2) {
        assert_eq!(x.size(), y.size(), "axpy: shape mismatch");
        y.as_mut_slice()
            .iter_mut()
            .zip(x.as_slice())
            .for_each(|(yi, xi)| *yi += a * xi);
    }

    fn xpay(a: f32, x: &FdmVector2, y: &mut FdmVector2) {
        assert_eq!(x.size(), y.size(), "xpay: shape mismatch");
        y.as_mut_slice()
            .iter_mut()
            .zip(x.as_slice())
            .for_each(|(yi, xi)| *yi = xi + a * *yi);
    }

    fn mvm(m: &FdmMatrix2, v: &FdmVector2, result: &mut FdmVector2) {
        let size = m.size();
        assert_eq!(size, v.size(), "mvm: shape mismatch");
        assert_eq!(size, result.size(), "mvm: shape mismatch");

        result.par_fill_with(|i, j| {
            m[(i, j)].center * v[(i, j)]
                + if i > 0 { m[(i - 1, j)].right * v[(i - 1, j)] } else { 0.0 }
                + if i + 1 < size.x { m[(i, j)].right * v[(i + 1, j)] } else { 0.0 }
                + if j > 0 { m[(i, j - 1)].up * v[(i, j - 1)] } else { 0.0 }
                + if j + 1 < size.y { m[(i, j)].up * v[(i, j + 1)] } else { 0.0 }
        });
    }

    fn residual(a: &FdmMatrix2, x: &FdmVector2, b: &FdmVector2, result: &mut FdmVector2) {
        let size = a.size();
        assert_eq!(size, x.size(), "residual: shape mismatch");
        assert_eq!(size, b.size(), "residual: shape mismatch");
        assert_eq!(size, result.size(), "residual: shape mismatch");

        result.par_fill_with(|i, j| {
            b[(i, j)]
                - a[(i, j)].center * x[(i, j)]
                - if i > 0 { a[(i - 1, j)].right * x[(i - 1, j)] } else { 0.0 }
                - if i + 1 < size.x { a[(i, j)].right * x[(i + 1, j)] } else { 0.0 }
                - if j > 0 { a[(i, j - 1)].up * x[(i, j - 1)] } else { 0.0 }
                - if j + 1 < size.y { a[(i, j)].up * x[(i, j + 1)] } else { 0.0 }
        });
    }

    fn linf_norm(v: &FdmVector2) -> f32 {
        v.as_slice().iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mvm_laplacian_of_constant_interior() {
        // A 5-point Laplacian applied to a constant field vanishes away
        // from the domain edge.
        let size = Size2::new(5, 5);
        let mut a = FdmMatrix2::with_size(size, FdmMatrixRow2::default());
        for j in 0..5 {
            for i in 0..5 {
                let mut row = FdmMatrixRow2::default();
                if i + 1 < 5 {
                    row.center += 1.0;
                    row.right -= 1.0;
                }
                if i > 0 {
                    row.center += 1.0;
                }
                if j + 1 < 5 {
                    row.center += 1.0;
                    row.up -= 1.0;
                }
                if j > 0 {
                    row.center += 1.0;
                }
                a[(i, j)] = row;
            }
        }
        let v = FdmVector2::with_size(size, 3.0);
        let mut result = FdmVector2::with_size(size, 0.0);
        FdmBlas2::mvm(&a, &v, &mut result);
        assert!(result[(2, 2)].abs() < 1e-6);
    }
}
