//! 2-D simulation grids.
//!
//! All grids share {resolution, grid spacing, origin}. Scalar and
//! collocated vector data live at cell centers; the face-centered (MAC)
//! grid staggers velocity components onto the cell faces:
//! u on vertical faces at x = i * h, v on horizontal faces at y = j * h.

use freshet_core::{Array2, Size2};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sampler;

/// Cell-centered scalar grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarGrid2 {
    resolution: Size2,
    grid_spacing: Vec2,
    origin: Vec2,
    data: Array2<f32>,
}

impl ScalarGrid2 {
    pub fn new(resolution: Size2, grid_spacing: Vec2, origin: Vec2, initial_value: f32) -> Self {
        Self {
            resolution,
            grid_spacing,
            origin,
            data: Array2::with_size(resolution, initial_value),
        }
    }

    pub fn resolution(&self) -> Size2 {
        self.resolution
    }

    pub fn grid_spacing(&self) -> Vec2 {
        self.grid_spacing
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f32> {
        &mut self.data
    }

    /// World position of the (i, j) data point (cell center).
    #[inline]
    pub fn data_position(&self, i: usize, j: usize) -> Vec2 {
        self.origin
            + self.grid_spacing * Vec2::new(i as f32 + 0.5, j as f32 + 0.5)
    }

    /// Bilinear sample at a world position.
    pub fn sample(&self, x: Vec2) -> f32 {
        let data_origin = self.origin + 0.5 * self.grid_spacing;
        sampler::sample(&self.data, data_origin, self.grid_spacing, x)
    }

    /// Overwrites every data point from the sampled function.
    pub fn fill_with<F: Fn(Vec2) -> f32 + Sync>(&mut self, f: F) {
        let origin = self.origin;
        let spacing = self.grid_spacing;
        self.data.par_fill_with(|i, j| {
            f(origin + spacing * Vec2::new(i as f32 + 0.5, j as f32 + 0.5))
        });
    }

    /// Resizes the grid, preserving overlapping data.
    pub fn resize(&mut self, resolution: Size2, grid_spacing: Vec2, origin: Vec2, init: f32) {
        self.resolution = resolution;
        self.grid_spacing = grid_spacing;
        self.origin = origin;
        self.data.resize(resolution, init);
    }
}

/// Cell-centered (collocated) vector grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorGrid2 {
    resolution: Size2,
    grid_spacing: Vec2,
    origin: Vec2,
    data: Array2<Vec2>,
}

impl VectorGrid2 {
    pub fn new(resolution: Size2, grid_spacing: Vec2, origin: Vec2, initial_value: Vec2) -> Self {
        Self {
            resolution,
            grid_spacing,
            origin,
            data: Array2::with_size(resolution, initial_value),
        }
    }

    pub fn resolution(&self) -> Size2 {
        self.resolution
    }

    pub fn grid_spacing(&self) -> Vec2 {
        self.grid_spacing
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn data(&self) -> &Array2<Vec2> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<Vec2> {
        &mut self.data
    }

    /// World position of the (i, j) data point (cell center).
    #[inline]
    pub fn data_position(&self, i: usize, j: usize) -> Vec2 {
        self.origin
            + self.grid_spacing * Vec2::new(i as f32 + 0.5, j as f32 + 0.5)
    }

    /// Bilinear sample at a world position.
    pub fn sample(&self, x: Vec2) -> Vec2 {
        let data_origin = self.origin + 0.5 * self.grid_spacing;
        sampler::sample_vec(&self.data, data_origin, self.grid_spacing, x)
    }
}

/// Face-centered (MAC/staggered) velocity grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceCenteredGrid2 {
    resolution: Size2,
    grid_spacing: Vec2,
    origin: Vec2,
    /// X-velocity on vertical faces, sized (w + 1, h).
    u: Array2<f32>,
    /// Y-velocity on horizontal faces, sized (w, h + 1).
    v: Array2<f32>,
}

impl FaceCenteredGrid2 {
    pub fn new(resolution: Size2, grid_spacing: Vec2, origin: Vec2) -> Self {
        Self {
            resolution,
            grid_spacing,
            origin,
            u: Array2::with_size(Size2::new(resolution.x + 1, resolution.y), 0.0),
            v: Array2::with_size(Size2::new(resolution.x, resolution.y + 1), 0.0),
        }
    }

    pub fn resolution(&self) -> Size2 {
        self.resolution
    }

    pub fn grid_spacing(&self) -> Vec2 {
        self.grid_spacing
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn u(&self) -> &Array2<f32> {
        &self.u
    }

    pub fn u_mut(&mut self) -> &mut Array2<f32> {
        &mut self.u
    }

    pub fn v(&self) -> &Array2<f32> {
        &self.v
    }

    pub fn v_mut(&mut self) -> &mut Array2<f32> {
        &mut self.v
    }

    pub fn u_size(&self) -> Size2 {
        self.u.size()
    }

    pub fn v_size(&self) -> Size2 {
        self.v.size()
    }

    /// World position of the (i, j) u-face.
    #[inline]
    pub fn u_position(&self, i: usize, j: usize) -> Vec2 {
        self.origin + self.grid_spacing * Vec2::new(i as f32, j as f32 + 0.5)
    }

    /// World position of the (i, j) v-face.
    #[inline]
    pub fn v_position(&self, i: usize, j: usize) -> Vec2 {
        self.origin + self.grid_spacing * Vec2::new(i as f32 + 0.5, j as f32)
    }

    /// World position of the (i, j) cell center.
    #[inline]
    pub fn cell_center_position(&self, i: usize, j: usize) -> Vec2 {
        self.origin
            + self.grid_spacing * Vec2::new(i as f32 + 0.5, j as f32 + 0.5)
    }

    /// Central-difference divergence at the (i, j) cell center.
    pub fn divergence_at_cell_center(&self, i: usize, j: usize) -> f32 {
        (self.u[(i + 1, j)] - self.u[(i, j)]) / self.grid_spacing.x
            + (self.v[(i, j + 1)] - self.v[(i, j)]) / self.grid_spacing.y
    }

    /// Averaged velocity at the (i, j) cell center.
    pub fn value_at_cell_center(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new(
            0.5 * (self.u[(i, j)] + self.u[(i + 1, j)]),
            0.5 * (self.v[(i, j)] + self.v[(i, j + 1)]),
        )
    }

    /// Component-wise bilinear sample at a world position.
    pub fn sample(&self, x: Vec2) -> Vec2 {
        let u_origin = self.origin + Vec2::new(0.0, 0.5 * self.grid_spacing.y);
        let v_origin = self.origin + Vec2::new(0.5 * self.grid_spacing.x, 0.0);
        Vec2::new(
            sampler::sample(&self.u, u_origin, self.grid_spacing, x),
            sampler::sample(&self.v, v_origin, self.grid_spacing, x),
        )
    }

    /// Overwrites both face arrays from the sampled function.
    pub fn fill_with<F: Fn(Vec2) -> Vec2 + Sync>(&mut self, f: F) {
        let origin = self.origin;
        let spacing = self.grid_spacing;
        self.u.par_fill_with(|i, j| {
            f(origin + spacing * Vec2::new(i as f32, j as f32 + 0.5)).x
        });
        self.v.par_fill_with(|i, j| {
            f(origin + spacing * Vec2::new(i as f32 + 0.5, j as f32)).y
        });
    }

    /// Copies all state from `other`.
    pub fn set_from(&mut self, other: &Self) {
        self.resolution = other.resolution;
        self.grid_spacing = other.grid_spacing;
        self.origin = other.origin;
        self.u.set_from(&other.u);
        self.v.set_from(&other.v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_array_sizes() {
        let grid = FaceCenteredGrid2::new(Size2::new(4, 5), Vec2::ONE, Vec2::ZERO);
        assert_eq!(grid.u_size(), Size2::new(5, 5));
        assert_eq!(grid.v_size(), Size2::new(4, 6));
    }

    #[test]
    fn test_divergence_of_linear_field() {
        // u = x, v = 0 has divergence 1 everywhere.
        let mut grid = FaceCenteredGrid2::new(Size2::new(4, 4), Vec2::ONE, Vec2::ZERO);
        grid.fill_with(|p| Vec2::new(p.x, 0.0));
        for j in 0..4 {
            for i in 0..4 {
                assert!((grid.divergence_at_cell_center(i, j) - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_scalar_grid_sample_constant() {
        let grid = ScalarGrid2::new(Size2::new(4, 4), Vec2::ONE, Vec2::ZERO, 3.0);
        assert!((grid.sample(Vec2::new(2.0, 2.0)) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_fill_with_positions() {
        let mut grid = ScalarGrid2::new(Size2::new(3, 3), Vec2::ONE, Vec2::ZERO, 0.0);
        grid.fill_with(|p| p.x);
        assert!((grid.data()[(0, 0)] - 0.5).abs() < 1e-6);
        assert!((grid.data()[(2, 0)] - 2.5).abs() < 1e-6);
    }
}
