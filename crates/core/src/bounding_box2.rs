//! 2-D axis-aligned bounding box.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::ray::Ray2;

/// Box-ray intersection result.
#[derive(Clone, Copy, Debug)]
pub struct BoundingBoxRayIntersection2 {
    /// True if the box and ray intersect.
    pub is_intersecting: bool,
    /// Distance to the first intersection point.
    pub t_near: f32,
    /// Distance to the second (and last) intersection point.
    pub t_far: f32,
}

impl Default for BoundingBoxRayIntersection2 {
    fn default() -> Self {
        Self {
            is_intersecting: false,
            t_near: f32::MAX,
            t_far: f32::MAX,
        }
    }
}

/// 2-D axis-aligned bounding box.
///
/// The default box is the "infinite empty" state (lower = +inf, upper =
/// -inf), which is the identity element of `merge`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2 {
    pub lower_corner: Vec2,
    pub upper_corner: Vec2,
}

impl Default for BoundingBox2 {
    fn default() -> Self {
        Self {
            lower_corner: Vec2::splat(f32::MAX),
            upper_corner: Vec2::splat(-f32::MAX),
        }
    }
}

impl BoundingBox2 {
    /// Constructs the infinite-empty box.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a box that tightly covers two points.
    pub fn from_two_points(point1: Vec2, point2: Vec2) -> Self {
        Self {
            lower_corner: point1.min(point2),
            upper_corner: point1.max(point2),
        }
    }

    pub fn width(&self) -> f32 {
        self.upper_corner.x - self.lower_corner.x
    }

    pub fn height(&self) -> f32 {
        self.upper_corner.y - self.lower_corner.y
    }

    /// Edge length along `axis` (0 = x, 1 = y).
    pub fn length(&self, axis: usize) -> f32 {
        self.upper_corner[axis] - self.lower_corner[axis]
    }

    /// True if this box and `other` overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.upper_corner.x < other.lower_corner.x || self.lower_corner.x > other.upper_corner.x
        {
            return false;
        }
        if self.upper_corner.y < other.lower_corner.y || self.lower_corner.y > other.upper_corner.y
        {
            return false;
        }
        true
    }

    /// True if `point` is inside this box (boundary inclusive).
    pub fn contains(&self, point: Vec2) -> bool {
        if self.upper_corner.x < point.x || self.lower_corner.x > point.x {
            return false;
        }
        if self.upper_corner.y < point.y || self.lower_corner.y > point.y {
            return false;
        }
        true
    }

    /// Slab test against both axes.
    pub fn intersects(&self, ray: &Ray2) -> bool {
        let mut t_min = 0.0f32;
        let mut t_max = f32::MAX;
        let ray_inv_dir = ray.direction.recip();

        for i in 0..2 {
            let mut t_near = (self.lower_corner[i] - ray.origin[i]) * ray_inv_dir[i];
            let mut t_far = (self.upper_corner[i] - ray.origin[i]) * ray_inv_dir[i];
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t_min = t_near.max(t_min);
            t_max = t_far.min(t_max);
            if t_min > t_max {
                return false;
            }
        }
        true
    }

    /// Slab-test intersection distances.
    ///
    /// If the ray origin lies inside the box, the "closest" intersection is
    /// the exit point: `t_near` takes the exit distance and `t_far` is +inf.
    pub fn closest_intersection(&self, ray: &Ray2) -> BoundingBoxRayIntersection2 {
        let mut result = BoundingBoxRayIntersection2::default();
        let mut t_min = 0.0f32;
        let mut t_max = f32::MAX;
        let ray_inv_dir = ray.direction.recip();

        for i in 0..2 {
            let mut t_near = (self.lower_corner[i] - ray.origin[i]) * ray_inv_dir[i];
            let mut t_far = (self.upper_corner[i] - ray.origin[i]) * ray_inv_dir[i];
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t_min = t_near.max(t_min);
            t_max = t_far.min(t_max);
            if t_min > t_max {
                result.is_intersecting = false;
                return result;
            }
        }

        result.is_intersecting = true;
        if self.contains(ray.origin) {
            result.t_near = t_max;
            result.t_far = f32::MAX;
        } else {
            result.t_near = t_min;
            result.t_far = t_max;
        }
        result
    }

    /// Center of the box.
    pub fn mid_point(&self) -> Vec2 {
        (self.upper_corner + self.lower_corner) * 0.5
    }

    pub fn diagonal_length(&self) -> f32 {
        (self.upper_corner - self.lower_corner).length()
    }

    pub fn diagonal_length_squared(&self) -> f32 {
        (self.upper_corner - self.lower_corner).length_squared()
    }

    /// Resets to the infinite-empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Grows the box to cover `point`.
    pub fn merge_point(&mut self, point: Vec2) {
        self.lower_corner = self.lower_corner.min(point);
        self.upper_corner = self.upper_corner.max(point);
    }

    /// Grows the box to cover `other`.
    pub fn merge_box(&mut self, other: &Self) {
        self.lower_corner = self.lower_corner.min(other.lower_corner);
        self.upper_corner = self.upper_corner.max(other.upper_corner);
    }

    /// Pads the box by `delta` in every direction.
    pub fn expand(&mut self, delta: f32) {
        self.lower_corner -= Vec2::splat(delta);
        self.upper_corner += Vec2::splat(delta);
    }

    /// Corner position in x-fastest bit order: bit 0 selects +x, bit 1 +y.
    pub fn corner(&self, idx: usize) -> Vec2 {
        const H: f32 = 0.5;
        const OFFSETS: [Vec2; 4] = [
            Vec2::new(-H, -H),
            Vec2::new(H, -H),
            Vec2::new(-H, H),
            Vec2::new(H, H),
        ];
        Vec2::new(self.width(), self.height()) * OFFSETS[idx] + self.mid_point()
    }

    /// Clamps `pt` into the box.
    pub fn clamp(&self, pt: Vec2) -> Vec2 {
        pt.clamp(self.lower_corner, self.upper_corner)
    }

    /// True if any axis has lower >= upper.
    pub fn is_empty(&self) -> bool {
        self.lower_corner.x >= self.upper_corner.x || self.lower_corner.y >= self.upper_corner.y
    }
}
