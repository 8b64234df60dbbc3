//! BLAS-style operations over FDM vectors and matrices.

/// Vector/matrix kernel set shared by the generic solvers (`pcg`,
/// `mg_v_cycle`), implemented per dimension by `FdmBlas2`/`FdmBlas3`.
pub trait Blas {
    type Vector: Clone;
    type Matrix;

    /// Sets every element of `result` to `s`.
    fn set_scalar(s: f32, result: &mut Self::Vector);

    /// Copies `v` into `result`.
    fn copy(v: &Self::Vector, result: &mut Self::Vector);

    /// Dot product; panics on shape mismatch.
    fn dot(a: &Self::Vector, b: &Self::Vector) -> f32;

    /// In-place `y += a * x`; panics on shape mismatch.
    fn axpy(a: f32, x: &Self::Vector, y: &mut Self::Vector);

    /// In-place `y = x + a * y`; panics on shape mismatch.
    fn xpay(a: f32, x: &Self::Vector, y: &mut Self::Vector);

    /// Matrix-vector product; panics on shape mismatch.
    fn mvm(m: &Self::Matrix, v: &Self::Vector, result: &mut Self::Vector);

    /// Residual `b - Ax`; panics on shape mismatch.
    fn residual(a: &Self::Matrix, x: &Self::Vector, b: &Self::Vector, result: &mut Self::Vector);

    /// Euclidean norm.
    fn l2_norm(v: &Self::Vector) -> f32 {
        Self::dot(v, v).sqrt()
    }

    /// Max-magnitude norm.
    fn linf_norm(v: &Self::Vector) -> f32;
}
