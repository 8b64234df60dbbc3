//! Forward-Euler diffusion solver.

use freshet_core::{is_inside_sdf, Array2, ScalarField2, Size2};
use glam::Vec2;

use crate::grid::{FaceCenteredGrid2, ScalarGrid2, VectorGrid2};
use crate::marker::Marker;

/// Grid-based forward-Euler diffusion solver.
///
/// Uses second-order central differencing in space with explicit time
/// integration, gated by a Fluid/Air/Boundary marker grid so diffusion
/// never reads across a non-fluid face. Being explicit, stability bounds
/// the coefficient by `h / (8 dt)`; the solver does not enforce it.
#[derive(Default)]
pub struct GridForwardEulerDiffusionSolver2 {
    markers: Array2<Marker>,
}

/// Marker-gated 5-point Laplacian: differences toward non-Fluid neighbors
/// contribute zero (a Neumann-like degeneration at the fluid border).
fn laplacian(
    data: &Array2<f32>,
    markers: &Array2<Marker>,
    grid_spacing: Vec2,
    i: usize,
    j: usize,
) -> f32 {
    let center = data[(i, j)];
    let ds = data.size();

    let mut dleft = 0.0;
    let mut dright = 0.0;
    let mut ddown = 0.0;
    let mut dup = 0.0;

    if i > 0 && markers[(i - 1, j)] == Marker::Fluid {
        dleft = center - data[(i - 1, j)];
    }
    if i + 1 < ds.x && markers[(i + 1, j)] == Marker::Fluid {
        dright = data[(i + 1, j)] - center;
    }
    if j > 0 && markers[(i, j - 1)] == Marker::Fluid {
        ddown = center - data[(i, j - 1)];
    }
    if j + 1 < ds.y && markers[(i, j + 1)] == Marker::Fluid {
        dup = data[(i, j + 1)] - center;
    }

    (dright - dleft) / (grid_spacing.x * grid_spacing.x)
        + (dup - ddown) / (grid_spacing.y * grid_spacing.y)
}

/// Same stencil for collocated vector data.
fn laplacian_vec(
    data: &Array2<Vec2>,
    markers: &Array2<Marker>,
    grid_spacing: Vec2,
    i: usize,
    j: usize,
) -> Vec2 {
    let center = data[(i, j)];
    let ds = data.size();

    let mut dleft = Vec2::ZERO;
    let mut dright = Vec2::ZERO;
    let mut ddown = Vec2::ZERO;
    let mut dup = Vec2::ZERO;

    if i > 0 && markers[(i - 1, j)] == Marker::Fluid {
        dleft = center - data[(i - 1, j)];
    }
    if i + 1 < ds.x && markers[(i + 1, j)] == Marker::Fluid {
        dright = data[(i + 1, j)] - center;
    }
    if j > 0 && markers[(i, j - 1)] == Marker::Fluid {
        ddown = center - data[(i, j - 1)];
    }
    if j + 1 < ds.y && markers[(i, j + 1)] == Marker::Fluid {
        dup = data[(i, j + 1)] - center;
    }

    (dright - dleft) / (grid_spacing.x * grid_spacing.x)
        + (dup - ddown) / (grid_spacing.y * grid_spacing.y)
}

impl GridForwardEulerDiffusionSolver2 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffuses a scalar grid: Fluid cells step
    /// `dest = src + coeff * dt * laplacian(src)`, all other cells copy
    /// through. Panics if `dest` shape differs from `source`.
    pub fn solve_scalar(
        &mut self,
        source: &ScalarGrid2,
        diffusion_coefficient: f32,
        time_interval_in_seconds: f32,
        dest: &mut ScalarGrid2,
        boundary_sdf: &dyn ScalarField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        assert_eq!(
            source.resolution(),
            dest.resolution(),
            "diffusion: dest shape mismatch"
        );
        let h = source.grid_spacing();

        self.build_markers(
            source.resolution(),
            |i, j| source.data_position(i, j),
            boundary_sdf,
            fluid_sdf,
        );

        let markers = &self.markers;
        let src = source.data();
        dest.data_mut().par_fill_with(|i, j| {
            if markers[(i, j)] == Marker::Fluid {
                src[(i, j)]
                    + diffusion_coefficient
                        * time_interval_in_seconds
                        * laplacian(src, markers, h, i, j)
            } else {
                src[(i, j)]
            }
        });
    }

    /// Diffuses a collocated vector grid, component-wise.
    pub fn solve_collocated(
        &mut self,
        source: &VectorGrid2,
        diffusion_coefficient: f32,
        time_interval_in_seconds: f32,
        dest: &mut VectorGrid2,
        boundary_sdf: &dyn ScalarField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        assert_eq!(
            source.resolution(),
            dest.resolution(),
            "diffusion: dest shape mismatch"
        );
        let h = source.grid_spacing();

        self.build_markers(
            source.resolution(),
            |i, j| source.data_position(i, j),
            boundary_sdf,
            fluid_sdf,
        );

        let markers = &self.markers;
        let src = source.data();
        dest.data_mut().par_fill_with(|i, j| {
            if markers[(i, j)] == Marker::Fluid {
                src[(i, j)]
                    + diffusion_coefficient
                        * time_interval_in_seconds
                        * laplacian_vec(src, markers, h, i, j)
            } else {
                src[(i, j)]
            }
        });
    }

    /// Diffuses a face-centered grid, rebuilding the markers at each
    /// component's face positions.
    pub fn solve_faces(
        &mut self,
        source: &FaceCenteredGrid2,
        diffusion_coefficient: f32,
        time_interval_in_seconds: f32,
        dest: &mut FaceCenteredGrid2,
        boundary_sdf: &dyn ScalarField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        assert_eq!(
            source.resolution(),
            dest.resolution(),
            "diffusion: dest shape mismatch"
        );
        let h = source.grid_spacing();

        self.build_markers(
            source.u_size(),
            |i, j| source.u_position(i, j),
            boundary_sdf,
            fluid_sdf,
        );
        {
            let markers = &self.markers;
            let src = source.u();
            dest.u_mut().par_fill_with(|i, j| {
                if markers[(i, j)] == Marker::Fluid {
                    src[(i, j)]
                        + diffusion_coefficient
                            * time_interval_in_seconds
                            * laplacian(src, markers, h, i, j)
                } else {
                    src[(i, j)]
                }
            });
        }

        self.build_markers(
            source.v_size(),
            |i, j| source.v_position(i, j),
            boundary_sdf,
            fluid_sdf,
        );
        {
            let markers = &self.markers;
            let src = source.v();
            dest.v_mut().par_fill_with(|i, j| {
                if markers[(i, j)] == Marker::Fluid {
                    src[(i, j)]
                        + diffusion_coefficient
                            * time_interval_in_seconds
                            * laplacian(src, markers, h, i, j)
                } else {
                    src[(i, j)]
                }
            });
        }
    }

    fn build_markers<P: Fn(usize, usize) -> Vec2 + Sync>(
        &mut self,
        size: Size2,
        pos: P,
        boundary_sdf: &dyn ScalarField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        self.markers.resize(size, Marker::Air);
        self.markers.par_fill_with(|i, j| {
            let pt = pos(i, j);
            if is_inside_sdf(boundary_sdf.sample(pt)) {
                Marker::Boundary
            } else if is_inside_sdf(fluid_sdf.sample(pt)) {
                Marker::Fluid
            } else {
                Marker::Air
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use freshet_core::ConstantScalarField2;

    use super::*;

    fn all_fluid() -> (ConstantScalarField2, ConstantScalarField2) {
        (
            ConstantScalarField2::new(f32::MAX),
            ConstantScalarField2::new(-f32::MAX),
        )
    }

    #[test]
    fn test_spike_spreads_and_conserves_sign() {
        let size = Size2::new(5, 5);
        let mut source = ScalarGrid2::new(size, Vec2::ONE, Vec2::ZERO, 0.0);
        source.data_mut()[(2, 2)] = 4.0;
        let mut dest = source.clone();

        let (boundary, fluid) = all_fluid();
        let mut solver = GridForwardEulerDiffusionSolver2::new();
        solver.solve_scalar(&source, 0.2, 1.0, &mut dest, &boundary, &fluid);

        assert!(dest.data()[(2, 2)] < 4.0);
        assert!(dest.data()[(1, 2)] > 0.0);
        assert!(dest.data()[(2, 1)] > 0.0);
        // Far cells are untouched after one step of the 5-point stencil.
        assert_eq!(dest.data()[(0, 0)], 0.0);
    }

    #[test]
    fn test_non_fluid_cells_pass_through() {
        let size = Size2::new(4, 4);
        let mut source = ScalarGrid2::new(size, Vec2::ONE, Vec2::ZERO, 1.0);
        source.data_mut()[(1, 1)] = 9.0;
        let mut dest = source.clone();

        // Nothing is fluid: the whole grid must copy through unchanged.
        let boundary = ConstantScalarField2::new(f32::MAX);
        let fluid = ConstantScalarField2::new(f32::MAX);
        let mut solver = GridForwardEulerDiffusionSolver2::new();
        solver.solve_scalar(&source, 0.2, 1.0, &mut dest, &boundary, &fluid);

        for (a, b) in source.data().as_slice().iter().zip(dest.data().as_slice()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_collocated_vector_diffusion_spreads_componentwise() {
        let size = Size2::new(5, 5);
        let mut source = VectorGrid2::new(size, Vec2::ONE, Vec2::ZERO, Vec2::ZERO);
        source.data_mut()[(2, 2)] = Vec2::new(4.0, -2.0);
        let mut dest = source.clone();

        let (boundary, fluid) = all_fluid();
        let mut solver = GridForwardEulerDiffusionSolver2::new();
        solver.solve_collocated(&source, 0.2, 1.0, &mut dest, &boundary, &fluid);

        assert!(dest.data()[(2, 2)].x < 4.0);
        assert!(dest.data()[(2, 2)].y > -2.0);
        assert!(dest.data()[(1, 2)].x > 0.0);
        assert!(dest.data()[(1, 2)].y < 0.0);
    }

    #[test]
    fn test_face_diffusion_smooths_both_components() {
        let size = Size2::new(4, 4);
        let mut source = FaceCenteredGrid2::new(size, Vec2::ONE, Vec2::ZERO);
        source.u_mut()[(2, 2)] = 1.0;
        source.v_mut()[(2, 2)] = -1.0;
        let mut dest = source.clone();

        let (boundary, fluid) = all_fluid();
        let mut solver = GridForwardEulerDiffusionSolver2::new();
        solver.solve_faces(&source, 0.1, 1.0, &mut dest, &boundary, &fluid);

        assert!(dest.u()[(2, 2)] < 1.0);
        assert!(dest.u()[(1, 2)] > 0.0);
        assert!(dest.v()[(2, 2)] > -1.0);
        assert!(dest.v()[(2, 1)] < 0.0);
    }

    #[test]
    fn test_marker_classification_is_partition() {
        // Left half boundary, right-bottom fluid, rest air; each cell gets
        // exactly one class per the SDF precedence rule.
        let size = Size2::new(4, 4);
        let source = ScalarGrid2::new(size, Vec2::ONE, Vec2::ZERO, 0.0);
        let mut dest = source.clone();

        let boundary = |p: Vec2| if p.x < 2.0 { -1.0 } else { 1.0 };
        let fluid = |p: Vec2| if p.y < 2.0 { -1.0 } else { 1.0 };

        let mut solver = GridForwardEulerDiffusionSolver2::new();
        solver.solve_scalar(&source, 0.1, 1.0, &mut dest, &boundary, &fluid);

        for j in 0..4 {
            for i in 0..4 {
                let expected = if (i as f32) + 0.5 < 2.0 {
                    Marker::Boundary
                } else if (j as f32) + 0.5 < 2.0 {
                    Marker::Fluid
                } else {
                    Marker::Air
                };
                assert_eq!(solver.markers[(i, j)], expected, "cell ({}, {})", i, j);
            }
        }
    }
}
