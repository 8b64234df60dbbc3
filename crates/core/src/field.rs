//! Continuous field traits.
//!
//! Solvers consume boundary and fluid geometry as opaque sampled fields
//! (typically signed-distance functions: negative inside, positive outside).
//! Implementations must be safe to sample concurrently from parallel
//! regions, hence the `Sync` bound.

use glam::{Vec2, Vec3};

/// Returns true if the signed distance `phi` is inside the surface.
#[inline]
pub fn is_inside_sdf(phi: f32) -> bool {
    phi < 0.0
}

/// Arbitrary continuous 2-D scalar field.
pub trait ScalarField2: Sync {
    fn sample(&self, x: Vec2) -> f32;
}

/// Arbitrary continuous 3-D scalar field.
pub trait ScalarField3: Sync {
    fn sample(&self, x: Vec3) -> f32;
}

/// Arbitrary continuous 2-D vector field.
pub trait VectorField2: Sync {
    fn sample(&self, x: Vec2) -> Vec2;
}

/// Arbitrary continuous 3-D vector field.
pub trait VectorField3: Sync {
    fn sample(&self, x: Vec3) -> Vec3;
}

impl<F: Fn(Vec2) -> f32 + Sync> ScalarField2 for F {
    fn sample(&self, x: Vec2) -> f32 {
        self(x)
    }
}

impl<F: Fn(Vec3) -> f32 + Sync> ScalarField3 for F {
    fn sample(&self, x: Vec3) -> f32 {
        self(x)
    }
}

impl<F: Fn(Vec2) -> Vec2 + Sync> VectorField2 for F {
    fn sample(&self, x: Vec2) -> Vec2 {
        self(x)
    }
}

impl<F: Fn(Vec3) -> Vec3 + Sync> VectorField3 for F {
    fn sample(&self, x: Vec3) -> Vec3 {
        self(x)
    }
}

/// 2-D scalar field with a constant value everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantScalarField2 {
    pub value: f32,
}

impl ConstantScalarField2 {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl ScalarField2 for ConstantScalarField2 {
    fn sample(&self, _x: Vec2) -> f32 {
        self.value
    }
}

/// 3-D scalar field with a constant value everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantScalarField3 {
    pub value: f32,
}

impl ConstantScalarField3 {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl ScalarField3 for ConstantScalarField3 {
    fn sample(&self, _x: Vec3) -> f32 {
        self.value
    }
}

/// 2-D vector field with a constant value everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantVectorField2 {
    pub value: Vec2,
}

impl ConstantVectorField2 {
    pub fn new(value: Vec2) -> Self {
        Self { value }
    }
}

impl VectorField2 for ConstantVectorField2 {
    fn sample(&self, _x: Vec2) -> Vec2 {
        self.value
    }
}

/// 3-D vector field with a constant value everywhere.
#[derive(Clone, Copy, Debug)]
pub struct ConstantVectorField3 {
    pub value: Vec3,
}

impl ConstantVectorField3 {
    pub fn new(value: Vec3) -> Self {
        Self { value }
    }
}

impl VectorField3 for ConstantVectorField3 {
    fn sample(&self, _x: Vec3) -> Vec3 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_field() {
        let sphere = |x: Vec3| x.length() - 1.0;
        assert!(is_inside_sdf(ScalarField3::sample(&sphere, Vec3::ZERO)));
        assert!(!is_inside_sdf(ScalarField3::sample(
            &sphere,
            Vec3::new(2.0, 0.0, 0.0)
        )));
    }

    #[test]
    fn test_constant_field() {
        let f = ConstantScalarField3::new(f32::MAX);
        assert_eq!(f.sample(Vec3::splat(123.0)), f32::MAX);
    }
}
