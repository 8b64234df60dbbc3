//! Forward-Euler diffusion solver.

use freshet_core::{is_inside_sdf, Array3, ScalarField3, Size3};
use glam::Vec3;

use crate::grid::{FaceCenteredGrid3, ScalarGrid3, VectorGrid3};
use crate::marker::Marker;

/// Grid-based forward-Euler diffusion solver.
///
/// Uses second-order central differencing in space with explicit time
/// integration, gated by a Fluid/Air/Boundary marker grid so diffusion
/// never reads across a non-fluid face. Being explicit, stability bounds
/// the coefficient by `h / (12 dt)`; the solver does not enforce it.
#[derive(Default)]
pub struct GridForwardEulerDiffusionSolver3 {
    markers: Array3<Marker>,
}

/// Marker-gated 7-point Laplacian: differences toward non-Fluid neighbors
/// contribute zero (a Neumann-like degeneration at the fluid border).
fn laplacian(
    data: &Array3<f32>,
    markers: &Array3<Marker>,
    grid_spacing: Vec3,
    i: usize,
    j: usize,
    k: usize,
) -> f32 {
    let center = data[(i, j, k)];
    let ds = data.size();

    let mut dleft = 0.0;
    let mut dright = 0.0;
    let mut ddown = 0.0;
    let mut dup = 0.0;
    let mut dback = 0.0;
    let mut dfront = 0.0;

    if i > 0 && markers[(i - 1, j, k)] == Marker::Fluid {
        dleft = center - data[(i - 1, j, k)];
    }
    if i + 1 < ds.x && markers[(i + 1, j, k)] == Marker::Fluid {
        dright = data[(i + 1, j, k)] - center;
    }
    if j > 0 && markers[(i, j - 1, k)] == Marker::Fluid {
        ddown = center - data[(i, j - 1, k)];
    }
    if j + 1 < ds.y && markers[(i, j + 1, k)] == Marker::Fluid {
        dup = data[(i, j + 1, k)] - center;
    }
    if k > 0 && markers[(i, j, k - 1)] == Marker::Fluid {
        dback = center - data[(i, j, k - 1)];
    }
    if k + 1 < ds.z && markers[(i, j, k + 1)] == Marker::Fluid {
        dfront = data[(i, j, k + 1)] - center;
    }

    (dright - dleft) / (grid_spacing.x * grid_spacing.x)
        + (dup - ddown) / (grid_spacing.y * grid_spacing.y)
        + (dfront - dback) / (grid_spacing.z * grid_spacing.z)
}

/// Same stencil for collocated vector data.
fn laplacian_vec(
    data: &Array3<Vec3>,
    markers: &Array3<Marker>,
    grid_spacing: Vec3,
    i: usize,
    j: usize,
    k: usize,
) -> Vec3 {
    let center = data[(i, j, k)];
    let ds = data.size();

    let mut dleft = Vec3::ZERO;
    let mut dright = Vec3::ZERO;
    let mut ddown = Vec3::ZERO;
    let mut dup = Vec3::ZERO;
    let mut dback = Vec3::ZERO;
    let mut dfront = Vec3::ZERO;

    if i > 0 && markers[(i - 1, j, k)] == Marker::Fluid {
        dleft = center - data[(i - 1, j, k)];
    }
    if i + 1 < ds.x && markers[(i + 1, j, k)] == Marker::Fluid {
        dright = data[(i + 1, j, k)] - center;
    }
    if j > 0 && markers[(i, j - 1, k)] == Marker::Fluid {
        ddown = center - data[(i, j - 1, k)];
    }
    if j + 1 < ds.y && markers[(i, j + 1, k)] == Marker::Fluid {
        dup = data[(i, j + 1, k)] - center;
    }
    if k > 0 && markers[(i, j, k - 1)] == Marker::Fluid {
        dback = center - data[(i, j, k - 1)];
    }
    if k + 1 < ds.z && markers[(i, j, k + 1)] == Marker::Fluid {
        dfront = data[(i, j, k + 1)] - center;
    }

    (dright - dleft) / (grid_spacing.x * grid_spacing.x)
        + (dup - ddown) / (grid_spacing.y * grid_spacing.y)
        + (dfront - dback) / (grid_spacing.z * grid_spacing.z)
}

impl GridForwardEulerDiffusionSolver3 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffuses a scalar grid: Fluid cells step
    /// `dest = src + coeff * dt * laplacian(src)`, all other cells copy
    /// through. Panics if `dest` shape differs from `source`.
    pub fn solve_scalar(
        &mut self,
        source: &ScalarGrid3,
        diffusion_coefficient: f32,
        time_interval_in_seconds: f32,
        dest: &mut ScalarGrid3,
        boundary_sdf: &dyn ScalarField3,
        fluid_sdf: &dyn ScalarField3,
    ) {
        assert_eq!(
            source.resolution(),
            dest.resolution(),
            "diffusion: dest shape mismatch"
        );
        let h = source.grid_spacing();

        self.build_markers(
            source.resolution(),
            |i, j, k| source.data_position(i, j, k),
            boundary_sdf,
            fluid_sdf,
        );

        let markers = &self.markers;
        let src = source.data();
        dest.data_mut().par_fill_with(|i, j, k| {
            if markers[(i, j, k)] == Marker::Fluid {
                src[(i, j, k)]
                    + diffusion_coefficient
                        * time_interval_in_seconds
                        * laplacian(src, markers, h, i, j, k)
            } else {
                src[(i, j, k)]
            }
        });
    }

    /// Diffuses a collocated vector grid, component-wise.
    pub fn solve_collocated(
        &mut self,
        source: &VectorGrid3,
        diffusion_coefficient: f32,
        time_interval_in_seconds: f32,
        dest: &mut VectorGrid3,
        boundary_sdf: &dyn ScalarField3,
        fluid_sdf: &dyn ScalarField3,
    ) {
        assert_eq!(
            source.resolution(),
            dest.resolution(),
            "diffusion: dest shape mismatch"
        );
        let h = source.grid_spacing();

        self.build_markers(
            source.resolution(),
            |i, j, k| source.data_position(i, j, k),
            boundary_sdf,
            fluid_sdf,
        );

        let markers = &self.markers;
        let src = source.data();
        dest.data_mut().par_fill_with(|i, j, k| {
            if markers[(i, j, k)] == Marker::Fluid {
                src[(i, j, k)]
                    + diffusion_coefficient
                        * time_interval_in_seconds
                        * laplacian_vec(src, markers, h, i, j, k)
            } else {
                src[(i, j, k)]
            }
        });
    }

    /// Diffuses a face-centered grid, rebuilding the markers at each
    /// component's face positions.
    pub fn solve_faces(
        &mut self,
        source: &FaceCenteredGrid3,
        diffusion_coefficient: f32,
        time_interval_in_seconds: f32,
        dest: &mut FaceCenteredGrid3,
        boundary_sdf: &dyn ScalarField3,
        fluid_sdf: &dyn ScalarField3,
    ) {
        assert_eq!(
            source.resolution(),
            dest.resolution(),
            "diffusion: dest shape mismatch"
        );
        let h = source.grid_spacing();

        self.build_markers(
            source.u_size(),
            |i, j, k| source.u_position(i, j, k),
            boundary_sdf,
            fluid_sdf,
        );
        {
            let markers = &self.markers;
            let src = source.u();
            dest.u_mut().par_fill_with(|i, j, k| {
                if markers[(i, j, k)] == Marker::Fluid {
                    src[(i, j, k)]
                        + diffusion_coefficient
                            * time_interval_in_seconds
                            * laplacian(src, markers, h, i, j, k)
                } else {
                    src[(i, j, k)]
                }
            });
        }

        self.build_markers(
            source.v_size(),
            |i, j, k| source.v_position(i, j, k),
            boundary_sdf,
            fluid_sdf,
        );
        {
            let markers = &self.markers;
            let src = source.v();
            dest.v_mut().par_fill_with(|i, j, k| {
                if markers[(i, j, k)] == Marker::Fluid {
                    src[(i, j, k)]
                        + diffusion_coefficient
                            * time_interval_in_seconds
                            * laplacian(src, markers, h, i, j, k)
                } else {
                    src[(i, j, k)]
                }
            });
        }

        self.build_markers(
            source.w_size(),
            |i, j, k| source.w_position(i, j, k),
            boundary_sdf,
            fluid_sdf,
        );
        {
            let markers = &self.markers;
            let src = source.w();
            dest.w_mut().par_fill_with(|i, j, k| {
                if markers[(i, j, k)] == Marker::Fluid {
                    src[(i, j, k)]
                        + diffusion_coefficient
                            * time_interval_in_seconds
                            * laplacian(src, markers, h, i, j, k)
                } else {
                    src[(i, j, k)]
                }
            });
        }
    }

    fn build_markers<P: Fn(usize, usize, usize) -> Vec3 + Sync>(
        &mut self,
        size: Size3,
        pos: P,
        boundary_sdf: &dyn ScalarField3,
        fluid_sdf: &dyn ScalarField3,
    ) {
        self.markers.resize(size, Marker::Air);
        self.markers.par_fill_with(|i, j, k| {
            let pt = pos(i, j, k);
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
    use freshet_core::ConstantScalarField3;

    use super::*;

    #[test]
    fn test_spike_spreads() {
        let size = Size3::new(5, 5, 5);
        let mut source = ScalarGrid3::new(size, Vec3::ONE, Vec3::ZERO, 0.0);
        source.data_mut()[(2, 2, 2)] = 6.0;
        let mut dest = source.clone();

        let boundary = ConstantScalarField3::new(f32::MAX);
        let fluid = ConstantScalarField3::new(-f32::MAX);
        let mut solver = GridForwardEulerDiffusionSolver3::new();
        solver.solve_scalar(&source, 0.1, 1.0, &mut dest, &boundary, &fluid);

        assert!(dest.data()[(2, 2, 2)] < 6.0);
        assert!(dest.data()[(1, 2, 2)] > 0.0);
        assert!(dest.data()[(2, 2, 3)] > 0.0);
        assert_eq!(dest.data()[(0, 0, 0)], 0.0);
    }

    #[test]
    fn test_boundary_blocks_diffusion() {
        // A boundary wall at x < 1 must stay untouched and must not leak
        // heat out of the fluid.
        let size = Size3::new(4, 4, 4);
        let mut source = ScalarGrid3::new(size, Vec3::ONE, Vec3::ZERO, 0.0);
        source.data_mut()[(1, 1, 1)] = 4.0;
        let mut dest = source.clone();

        let boundary = |p: Vec3| if p.x < 1.0 { -1.0 } else { 1.0 };
        let fluid = ConstantScalarField3::new(-f32::MAX);

        let mut solver = GridForwardEulerDiffusionSolver3::new();
        solver.solve_scalar(&source, 0.1, 1.0, &mut dest, &boundary, &fluid);

        for k in 0..4 {
            for j in 0..4 {
                assert_eq!(dest.data()[(0, j, k)], 0.0, "boundary cell must pass through");
            }
        }
        assert!(dest.data()[(1, 1, 1)] < 4.0);
    }

    #[test]
    fn test_collocated_vector_diffusion_spreads_componentwise() {
        let size = Size3::new(5, 5, 5);
        let mut source = VectorGrid3::new(size, Vec3::ONE, Vec3::ZERO, Vec3::ZERO);
        source.data_mut()[(2, 2, 2)] = Vec3::new(6.0, -3.0, 1.5);
        let mut dest = source.clone();

        let boundary = ConstantScalarField3::new(f32::MAX);
        let fluid = ConstantScalarField3::new(-f32::MAX);
        let mut solver = GridForwardEulerDiffusionSolver3::new();
        solver.solve_collocated(&source, 0.1, 1.0, &mut dest, &boundary, &fluid);

        assert!(dest.data()[(2, 2, 2)].x < 6.0);
        assert!(dest.data()[(2, 2, 2)].y > -3.0);
        assert!(dest.data()[(1, 2, 2)].x > 0.0);
        assert!(dest.data()[(1, 2, 2)].y < 0.0);
    }

    #[test]
    fn test_face_diffusion_smooths_u() {
        let size = Size3::new(4, 4, 4);
        let mut source = FaceCenteredGrid3::new(size, Vec3::ONE, Vec3::ZERO);
        source.u_mut()[(2, 2, 2)] = 1.0;
        let mut dest = source.clone();

        let boundary = ConstantScalarField3::new(f32::MAX);
        let fluid = ConstantScalarField3::new(-f32::MAX);
        let mut solver = GridForwardEulerDiffusionSolver3::new();
        solver.solve_faces(&source, 0.1, 1.0, &mut dest, &boundary, &fluid);

        assert!(dest.u()[(2, 2, 2)] < 1.0);
        assert!(dest.u()[(1, 2, 2)] > 0.0);
    }
}
