//! Ray primitives.

use glam::{Vec2, Vec3};

/// 2-D ray: origin plus (assumed normalized) direction.
#[derive(Clone, Copy, Debug)]
pub struct Ray2 {
    pub origin: Vec2,
    pub direction: Vec2,
}

impl Ray2 {
    pub fn new(origin: Vec2, direction: Vec2) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray.
    pub fn point_at(&self, t: f32) -> Vec2 {
        self.origin + t * self.direction
    }
}

/// 3-D ray: origin plus (assumed normalized) direction.
#[derive(Clone, Copy, Debug)]
pub struct Ray3 {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray3 {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray.
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }
}
