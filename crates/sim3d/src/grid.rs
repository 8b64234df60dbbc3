//! 3-D simulation grids.
//!
//! All grids share {resolution, grid spacing, origin}. Scalar and
//! collocated vector data live at cell centers; the face-centered (MAC)
//! grid staggers velocity components onto the cell faces:
//! - u (X-velocity) on YZ faces at x = i * h, sized (w+1, h, d)
//! - v (Y-velocity) on XZ faces at y = j * h, sized (w, h+1, d)
//! - w (Z-velocity) on XY faces at z = k * h, sized (w, h, d+1)

use freshet_core::{Array3, Size3};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::sampler;

/// Cell-centered scalar grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarGrid3 {
    resolution: Size3,
    grid_spacing: Vec3,
    origin: Vec3,
    data: Array3<f32>,
}

impl ScalarGrid3 {
    pub fn new(resolution: Size3, grid_spacing: Vec3, origin: Vec3, initial_value: f32) -> Self {
        Self {
            resolution,
            grid_spacing,
            origin,
            data: Array3::with_size(resolution, initial_value),
        }
    }

    pub fn resolution(&self) -> Size3 {
        self.resolution
    }

    pub fn grid_spacing(&self) -> Vec3 {
        self.grid_spacing
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// World position of the (i, j, k) data point (cell center).
    #[inline]
    pub fn data_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin
            + self.grid_spacing
                * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5)
    }

    /// Trilinear sample at a world position.
    pub fn sample(&self, x: Vec3) -> f32 {
        let data_origin = self.origin + 0.5 * self.grid_spacing;
        sampler::sample(&self.data, data_origin, self.grid_spacing, x)
    }

    /// Overwrites every data point from the sampled function.
    pub fn fill_with<F: Fn(Vec3) -> f32 + Sync>(&mut self, f: F) {
        let origin = self.origin;
        let spacing = self.grid_spacing;
        self.data.par_fill_with(|i, j, k| {
            f(origin
                + spacing * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5))
        });
    }
}

impl freshet_core::ScalarField3 for ScalarGrid3 {
    fn sample(&self, x: Vec3) -> f32 {
        ScalarGrid3::sample(self, x)
    }
}

/// Cell-centered (collocated) vector grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorGrid3 {
    resolution: Size3,
    grid_spacing: Vec3,
    origin: Vec3,
    data: Array3<Vec3>,
}

impl VectorGrid3 {
    pub fn new(resolution: Size3, grid_spacing: Vec3, origin: Vec3, initial_value: Vec3) -> Self {
        Self {
            resolution,
            grid_spacing,
            origin,
            data: Array3::with_size(resolution, initial_value),
        }
    }

    pub fn resolution(&self) -> Size3 {
        self.resolution
    }

    pub fn grid_spacing(&self) -> Vec3 {
        self.grid_spacing
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn data(&self) -> &Array3<Vec3> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<Vec3> {
        &mut self.data
    }

    /// World position of the (i, j, k) data point (cell center).
    #[inline]
    pub fn data_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin
            + self.grid_spacing
                * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5)
    }

    /// Trilinear sample at a world position.
    pub fn sample(&self, x: Vec3) -> Vec3 {
        let data_origin = self.origin + 0.5 * self.grid_spacing;
        sampler::sample_vec(&self.data, data_origin, self.grid_spacing, x)
    }
}

/// Face-centered (MAC/staggered) velocity grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceCenteredGrid3 {
    resolution: Size3,
    grid_spacing: Vec3,
    origin: Vec3,
    u: Array3<f32>,
    v: Array3<f32>,
    w: Array3<f32>,
}

impl FaceCenteredGrid3 {
    pub fn new(resolution: Size3, grid_spacing: Vec3, origin: Vec3) -> Self {
        Self {
            resolution,
            grid_spacing,
            origin,
            u: Array3::with_size(Size3::new(resolution.x + 1, resolution.y, resolution.z), 0.0),
            v: Array3::with_size(Size3::new(resolution.x, resolution.y + 1, resolution.z), 0.0),
            w: Array3::with_size(Size3::new(resolution.x, resolution.y, resolution.z + 1), 0.0),
        }
    }

    pub fn resolution(&self) -> Size3 {
        self.resolution
    }

    pub fn grid_spacing(&self) -> Vec3 {
        self.grid_spacing
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn u(&self) -> &Array3<f32> {
        &self.u
    }

    pub fn u_mut(&mut self) -> &mut Array3<f32> {
        &mut self.u
    }

    pub fn v(&self) -> &Array3<f32> {
        &self.v
    }

    pub fn v_mut(&mut self) -> &mut Array3<f32> {
        &mut self.v
    }

    pub fn w(&self) -> &Array3<f32> {
        &self.w
    }

    pub fn w_mut(&mut self) -> &mut Array3<f32> {
        &mut self.w
    }

    pub fn u_size(&self) -> Size3 {
        self.u.size()
    }

    pub fn v_size(&self) -> Size3 {
        self.v.size()
    }

    pub fn w_size(&self) -> Size3 {
        self.w.size()
    }

    /// World origin of the u-face lattice.
    pub fn u_origin(&self) -> Vec3 {
        self.origin + Vec3::new(0.0, 0.5 * self.grid_spacing.y, 0.5 * self.grid_spacing.z)
    }

    /// World origin of the v-face lattice.
    pub fn v_origin(&self) -> Vec3 {
        self.origin + Vec3::new(0.5 * self.grid_spacing.x, 0.0, 0.5 * self.grid_spacing.z)
    }

    /// World origin of the w-face lattice.
    pub fn w_origin(&self) -> Vec3 {
        self.origin + Vec3::new(0.5 * self.grid_spacing.x, 0.5 * self.grid_spacing.y, 0.0)
    }

    /// World position of the (i, j, k) u-face.
    #[inline]
    pub fn u_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin
            + self.grid_spacing * Vec3::new(i as f32, j as f32 + 0.5, k as f32 + 0.5)
    }

    /// World position of the (i, j, k) v-face.
    #[inline]
    pub fn v_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin
            + self.grid_spacing * Vec3::new(i as f32 + 0.5, j as f32, k as f32 + 0.5)
    }

    /// World position of the (i, j, k) w-face.
    #[inline]
    pub fn w_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin
            + self.grid_spacing * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32)
    }

    /// World position of the (i, j, k) cell center.
    #[inline]
    pub fn cell_center_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin
            + self.grid_spacing
                * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5)
    }

    /// Central-difference divergence at the (i, j, k) cell center.
    pub fn divergence_at_cell_center(&self, i: usize, j: usize, k: usize) -> f32 {
        (self.u[(i + 1, j, k)] - self.u[(i, j, k)]) / self.grid_spacing.x
            + (self.v[(i, j + 1, k)] - self.v[(i, j, k)]) / self.grid_spacing.y
            + (self.w[(i, j, k + 1)] - self.w[(i, j, k)]) / self.grid_spacing.z
    }

    /// Averaged velocity at the (i, j, k) cell center.
    pub fn value_at_cell_center(&self, i: usize, j: usize, k: usize) -> Vec3 {
        Vec3::new(
            0.5 * (self.u[(i, j, k)] + self.u[(i + 1, j, k)]),
            0.5 * (self.v[(i, j, k)] + self.v[(i, j + 1, k)]),
            0.5 * (self.w[(i, j, k)] + self.w[(i, j, k + 1)]),
        )
    }

    /// Component-wise trilinear sample at a world position.
    pub fn sample(&self, x: Vec3) -> Vec3 {
        Vec3::new(
            sampler::sample(&self.u, self.u_origin(), self.grid_spacing, x),
            sampler::sample(&self.v, self.v_origin(), self.grid_spacing, x),
            sampler::sample(&self.w, self.w_origin(), self.grid_spacing, x),
        )
    }

    /// Sets every face velocity to `value`.
    pub fn fill(&mut self, value: Vec3) {
        self.u.fill(value.x);
        self.v.fill(value.y);
        self.w.fill(value.z);
    }

    /// Overwrites all face arrays from the sampled function.
    pub fn fill_with<F: Fn(Vec3) -> Vec3 + Sync>(&mut self, f: F) {
        let origin = self.origin;
        let spacing = self.grid_spacing;
        self.u.par_fill_with(|i, j, k| {
            f(origin + spacing * Vec3::new(i as f32, j as f32 + 0.5, k as f32 + 0.5)).x
        });
        self.v.par_fill_with(|i, j, k| {
            f(origin + spacing * Vec3::new(i as f32 + 0.5, j as f32, k as f32 + 0.5)).y
        });
        self.w.par_fill_with(|i, j, k| {
            f(origin + spacing * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32)).z
        });
    }

    /// Copies all state from `other`.
    pub fn set_from(&mut self, other: &Self) {
        self.resolution = other.resolution;
        self.grid_spacing = other.grid_spacing;
        self.origin = other.origin;
        self.u.set_from(&other.u);
        self.v.set_from(&other.v);
        self.w.set_from(&other.w);
    }

    /// Domain bounds in world space.
    pub fn bounding_box(&self) -> freshet_core::BoundingBox3 {
        let upper = self.origin
            + self.grid_spacing
                * Vec3::new(
                    self.resolution.x as f32,
                    self.resolution.y as f32,
                    self.resolution.z as f32,
                );
        freshet_core::BoundingBox3::from_two_points(self.origin, upper)
    }
}
