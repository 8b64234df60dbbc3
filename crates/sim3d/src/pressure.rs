//! Single-phase pressure solver.

use freshet_core::{is_inside_sdf, Array3, ScalarField3, Size3, VectorField3};
use freshet_fdm::{
    FdmIccgSolver3, FdmLinearSystem3, FdmLinearSystemSolver3, FdmMatrix3, FdmMgLinearSystem3,
    FdmMgSolver3, FdmMgUtils3, FdmVector3,
};
use glam::Vec3;

use crate::grid::FaceCenteredGrid3;
use crate::marker::Marker;

/// Default max iterations for the flat ICCG solver.
const DEFAULT_MAX_ITERATIONS: u32 = 100;
/// Default residual tolerance.
const DEFAULT_TOLERANCE: f32 = 1e-6;

/// Active linear-system storage.
///
/// Flat and multigrid systems are mutually exclusive by construction:
/// selecting a solver switches the variant and drops the other storage
/// wholesale, so there is no "cleared but allocated" state to misuse.
pub enum PressureSystem3 {
    Flat {
        system: FdmLinearSystem3,
        solver: Box<dyn FdmLinearSystemSolver3>,
    },
    Multigrid {
        system: FdmMgLinearSystem3,
        solver: FdmMgSolver3,
    },
}

/// 3-D single-phase pressure solver.
///
/// Encodes boundaries block-wise: each cell center is classified as
/// Boundary, Fluid, or Air from the signed-distance inputs, the Poisson
/// system is assembled over Fluid cells only (identity rows elsewhere),
/// solved by the injected linear-system solver, and the pressure gradient
/// is applied back onto the face velocities. Air pressure is pinned to
/// zero, so free surfaces see a constant-pressure atmosphere.
pub struct GridSinglePhasePressureSolver3 {
    storage: PressureSystem3,
    markers: Vec<Array3<Marker>>,
}

impl Default for GridSinglePhasePressureSolver3 {
    fn default() -> Self {
        Self::new()
    }
}

impl GridSinglePhasePressureSolver3 {
    /// Creates a solver backed by flat ICCG.
    pub fn new() -> Self {
        Self {
            storage: PressureSystem3::Flat {
                system: FdmLinearSystem3::new(),
                solver: Box::new(FdmIccgSolver3::new(DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE)),
            },
            markers: Vec::new(),
        }
    }

    /// Switches to a flat iterative solver, dropping any multigrid state.
    pub fn set_linear_system_solver(&mut self, solver: Box<dyn FdmLinearSystemSolver3>) {
        self.storage = PressureSystem3::Flat {
            system: FdmLinearSystem3::new(),
            solver,
        };
    }

    /// Switches to a multigrid solver, dropping any flat state.
    pub fn set_multigrid_solver(&mut self, solver: FdmMgSolver3) {
        self.storage = PressureSystem3::Multigrid {
            system: FdmMgLinearSystem3::new(),
            solver,
        };
    }

    /// The active system storage (flat or multigrid).
    pub fn system(&self) -> &PressureSystem3 {
        &self.storage
    }

    /// The solved pressure field on the finest level.
    pub fn pressure(&self) -> &FdmVector3 {
        match &self.storage {
            PressureSystem3::Flat { system, .. } => &system.x,
            PressureSystem3::Multigrid { system, .. } => &system.x.levels[0],
        }
    }

    /// The finest-level marker grid from the last solve.
    pub fn markers(&self) -> &Array3<Marker> {
        &self.markers[0]
    }

    /// Solves for the pressure and writes the projected velocity into
    /// `output`.
    ///
    /// Negative `boundary_sdf` marks solid cells, negative `fluid_sdf`
    /// marks fluid; everything else is open air. `boundary_velocity` is
    /// part of the pressure-solver contract for boundary-aware
    /// implementations; the block-style solver pins boundary faces
    /// instead of sampling it.
    pub fn solve(
        &mut self,
        input: &FaceCenteredGrid3,
        _time_interval_in_seconds: f32,
        output: &mut FaceCenteredGrid3,
        boundary_sdf: &dyn ScalarField3,
        _boundary_velocity: &dyn VectorField3,
        fluid_sdf: &dyn ScalarField3,
    ) {
        self.build_markers(input, boundary_sdf, fluid_sdf);
        self.build_system(input);

        let converged = match &mut self.storage {
            PressureSystem3::Flat { system, solver } => solver.solve(system),
            PressureSystem3::Multigrid { system, solver } => solver.solve(system),
        };
        if !converged {
            log::debug!("pressure solve below tolerance; using best-effort field");
        }

        output.set_from(input);
        self.apply_pressure_gradient(input, output);
    }

    fn max_number_of_levels(&self) -> usize {
        match &self.storage {
            PressureSystem3::Flat { .. } => 1,
            PressureSystem3::Multigrid { solver, .. } => solver.params().max_number_of_levels,
        }
    }

    fn build_markers(
        &mut self,
        input: &FaceCenteredGrid3,
        boundary_sdf: &dyn ScalarField3,
        fluid_sdf: &dyn ScalarField3,
    ) {
        let size = input.resolution();
        let max_levels = self.max_number_of_levels();
        FdmMgUtils3::resize_array_with_finest(size, max_levels, &mut self.markers);

        // Top level samples the SDFs at cell centers.
        self.markers[0].par_fill_with(|i, j, k| {
            let pt = input.cell_center_position(i, j, k);
            if is_inside_sdf(boundary_sdf.sample(pt)) {
                Marker::Boundary
            } else if is_inside_sdf(fluid_sdf.sample(pt)) {
                Marker::Fluid
            } else {
                Marker::Air
            }
        });

        // Coarser levels take the majority over the clamped 4x4x4 finer
        // footprint, with the Marker enum's documented tie-break order.
        for l in 1..self.markers.len() {
            let (finer_levels, coarser_levels) = self.markers.split_at_mut(l);
            let finer = &finer_levels[l - 1];
            let coarser = &mut coarser_levels[0];
            let n = coarser.size();

            coarser.par_fill_with(|i, j, k| {
                let i_indices = [
                    if i > 0 { 2 * i - 1 } else { 2 * i },
                    2 * i,
                    2 * i + 1,
                    if i + 1 < n.x { 2 * i + 2 } else { 2 * i + 1 },
                ];
                let j_indices = [
                    if j > 0 { 2 * j - 1 } else { 2 * j },
                    2 * j,
                    2 * j + 1,
                    if j + 1 < n.y { 2 * j + 2 } else { 2 * j + 1 },
                ];
                let k_indices = [
                    if k > 0 { 2 * k - 1 } else { 2 * k },
                    2 * k,
                    2 * k + 1,
                    if k + 1 < n.z { 2 * k + 2 } else { 2 * k + 1 },
                ];

                let mut counts = [0usize; 3];
                for &kk in &k_indices {
                    for &jj in &j_indices {
                        for &ii in &i_indices {
                            counts[finer[(ii, jj, kk)] as usize] += 1;
                        }
                    }
                }
                Marker::vote(counts)
            });
        }
    }

    fn build_system(&mut self, input: &FaceCenteredGrid3) {
        let size = input.resolution();
        match &mut self.storage {
            PressureSystem3::Flat { system, .. } => {
                system.resize(size);
                build_single_system(&mut system.a, &mut system.b, &self.markers[0], input);
            }
            PressureSystem3::Multigrid { system, solver } => {
                let max_levels = solver.params().max_number_of_levels;
                system.resize_with_finest(size, max_levels);
                let num_levels = system.number_of_levels();

                build_single_system(
                    &mut system.a.levels[0],
                    &mut system.b.levels[0],
                    &self.markers[0],
                    input,
                );

                // Each sub-level re-samples the finer grid at half the
                // resolution and doubled spacing.
                let mut finer = input.clone();
                for l in 1..num_levels {
                    let res = Size3::new(
                        finer.resolution().x >> 1,
                        finer.resolution().y >> 1,
                        finer.resolution().z >> 1,
                    );
                    let h = finer.grid_spacing() * 2.0;
                    let mut coarser = FaceCenteredGrid3::new(res, h, finer.origin());
                    coarser.fill_with(|p| finer.sample(p));

                    build_single_system(
                        &mut system.a.levels[l],
                        &mut system.b.levels[l],
                        &self.markers[l],
                        &coarser,
                    );
                    finer = coarser;
                }
            }
        }
    }

    fn apply_pressure_gradient(&self, input: &FaceCenteredGrid3, output: &mut FaceCenteredGrid3) {
        let size = input.resolution();
        let markers = &self.markers[0];
        let x = self.pressure();
        let inv_h = Vec3::ONE / input.grid_spacing();

        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    if markers[(i, j, k)] != Marker::Fluid {
                        continue;
                    }
                    if i + 1 < size.x && markers[(i + 1, j, k)] != Marker::Boundary {
                        output.u_mut()[(i + 1, j, k)] = input.u()[(i + 1, j, k)]
                            + inv_h.x * (x[(i + 1, j, k)] - x[(i, j, k)]);
                    }
                    if j + 1 < size.y && markers[(i, j + 1, k)] != Marker::Boundary {
                        output.v_mut()[(i, j + 1, k)] = input.v()[(i, j + 1, k)]
                            + inv_h.y * (x[(i, j + 1, k)] - x[(i, j, k)]);
                    }
                    if k + 1 < size.z && markers[(i, j, k + 1)] != Marker::Boundary {
                        output.w_mut()[(i, j, k + 1)] = input.w()[(i, j, k + 1)]
                            + inv_h.z * (x[(i, j, k + 1)] - x[(i, j, k)]);
                    }
                }
            }
        }
    }
}

/// Assembles one level of the Poisson system.
///
/// Fluid rows take `1/h^2` on the diagonal per non-Boundary neighbor and
/// `-1/h^2` toward Fluid neighbors (positive directions stored, negative
/// directions feed only the diagonal), with the velocity divergence as
/// RHS. Non-fluid rows are identity with zero RHS.
fn build_single_system(
    a: &mut FdmMatrix3,
    b: &mut FdmVector3,
    markers: &Array3<Marker>,
    input: &FaceCenteredGrid3,
) {
    let size = input.resolution();
    let inv_h = Vec3::ONE / input.grid_spacing();
    let inv_h_sqr = inv_h * inv_h;

    for k in 0..size.z {
        for j in 0..size.y {
            for i in 0..size.x {
                let row = &mut a[(i, j, k)];
                row.center = 0.0;
                row.right = 0.0;
                row.up = 0.0;
                row.front = 0.0;
                b[(i, j, k)] = 0.0;

                if markers[(i, j, k)] != Marker::Fluid {
                    row.center = 1.0;
                    continue;
                }

                b[(i, j, k)] = input.divergence_at_cell_center(i, j, k);

                if i + 1 < size.x && markers[(i + 1, j, k)] != Marker::Boundary {
                    row.center += inv_h_sqr.x;
                    if markers[(i + 1, j, k)] == Marker::Fluid {
                        row.right -= inv_h_sqr.x;
                    }
                }
                if i > 0 && markers[(i - 1, j, k)] != Marker::Boundary {
                    row.center += inv_h_sqr.x;
                }
                if j + 1 < size.y && markers[(i, j + 1, k)] != Marker::Boundary {
                    row.center += inv_h_sqr.y;
                    if markers[(i, j + 1, k)] == Marker::Fluid {
                        row.up -= inv_h_sqr.y;
                    }
                }
                if j > 0 && markers[(i, j - 1, k)] != Marker::Boundary {
                    row.center += inv_h_sqr.y;
                }
                if k + 1 < size.z && markers[(i, j, k + 1)] != Marker::Boundary {
                    row.center += inv_h_sqr.z;
                    if markers[(i, j, k + 1)] == Marker::Fluid {
                        row.front -= inv_h_sqr.z;
                    }
                }
                if k > 0 && markers[(i, j, k - 1)] != Marker::Boundary {
                    row.center += inv_h_sqr.z;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use freshet_core::{ConstantScalarField3, ConstantVectorField3};

    use super::*;

    fn solve_on(
        input: &FaceCenteredGrid3,
        solver: &mut GridSinglePhasePressureSolver3,
        boundary: &dyn ScalarField3,
        fluid: &dyn ScalarField3,
    ) -> FaceCenteredGrid3 {
        let mut output = input.clone();
        solver.solve(
            input,
            1.0 / 60.0,
            &mut output,
            boundary,
            &ConstantVectorField3::new(Vec3::ZERO),
            fluid,
        );
        output
    }

    #[test]
    fn test_enclosed_zero_divergence_region_is_untouched() {
        let size = Size3::new(6, 6, 6);
        let input = FaceCenteredGrid3::new(size, Vec3::ONE, Vec3::ZERO);

        let boundary = |p: Vec3| {
            if p.x < 1.0 || p.x > 5.0 || p.y < 1.0 || p.y > 5.0 || p.z < 1.0 || p.z > 5.0 {
                -1.0
            } else {
                1.0
            }
        };
        let fluid = ConstantScalarField3::new(-f32::MAX);

        let mut solver = GridSinglePhasePressureSolver3::new();
        let output = solve_on(&input, &mut solver, &boundary, &fluid);

        for v in output.u().as_slice() {
            assert!(v.abs() < 1e-4);
        }
        for v in output.v().as_slice() {
            assert!(v.abs() < 1e-4);
        }
        for v in output.w().as_slice() {
            assert!(v.abs() < 1e-4);
        }
    }

    #[test]
    fn test_projection_reduces_divergence() {
        let size = Size3::new(8, 8, 8);
        let mut input = FaceCenteredGrid3::new(size, Vec3::ONE, Vec3::ZERO);
        input.u_mut()[(4, 4, 4)] = 1.0;

        let boundary = |p: Vec3| {
            if p.x < 1.0 || p.x > 7.0 || p.y < 1.0 || p.y > 7.0 || p.z < 1.0 || p.z > 7.0 {
                -1.0
            } else {
                1.0
            }
        };
        let fluid = ConstantScalarField3::new(-f32::MAX);

        let mut solver = GridSinglePhasePressureSolver3::new();
        let output = solve_on(&input, &mut solver, &boundary, &fluid);

        let mut max_div: f32 = 0.0;
        for k in 1..7 {
            for j in 1..7 {
                for i in 1..7 {
                    max_div = max_div.max(output.divergence_at_cell_center(i, j, k).abs());
                }
            }
        }
        assert!(max_div < 0.5, "divergence not reduced: {}", max_div);
    }

    #[test]
    fn test_free_surface_air_is_passive() {
        // Bottom half fluid, top half air: air rows must be identity and
        // air face velocities untouched by the gradient step.
        let size = Size3::new(4, 4, 4);
        let mut input = FaceCenteredGrid3::new(size, Vec3::ONE, Vec3::ZERO);
        input.v_mut().fill(-1.0);

        let boundary = ConstantScalarField3::new(f32::MAX);
        let fluid = |p: Vec3| if p.y < 2.0 { -1.0 } else { 1.0 };

        let mut solver = GridSinglePhasePressureSolver3::new();
        let _ = solve_on(&input, &mut solver, &boundary, &fluid);

        assert_eq!(solver.markers()[(0, 0, 0)], Marker::Fluid);
        assert_eq!(solver.markers()[(0, 3, 0)], Marker::Air);

        match solver.system() {
            PressureSystem3::Flat { system, .. } => {
                assert_eq!(system.a[(0, 3, 0)].center, 1.0);
                assert_eq!(system.a[(0, 3, 0)].right, 0.0);
                assert_ne!(system.a[(0, 0, 0)].center, 1.0);
            }
            PressureSystem3::Multigrid { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_multigrid_marker_hierarchy() {
        let size = Size3::new(16, 16, 16);
        let mut input = FaceCenteredGrid3::new(size, Vec3::ONE, Vec3::ZERO);
        input.u_mut()[(8, 8, 8)] = 1.0;

        let boundary = |p: Vec3| if p.y < 2.0 { -1.0 } else { 1.0 };
        let fluid = ConstantScalarField3::new(-f32::MAX);

        let mut solver = GridSinglePhasePressureSolver3::new();
        solver.set_multigrid_solver(FdmMgSolver3::new(3));
        let _ = solve_on(&input, &mut solver, &boundary, &fluid);

        match solver.system() {
            PressureSystem3::Multigrid { system, .. } => {
                assert_eq!(system.number_of_levels(), 3);
                // The coarse boundary layer survives the majority vote.
                assert_eq!(solver.markers.len(), 3);
                assert_eq!(solver.markers[2].size(), Size3::new(4, 4, 4));
                assert_eq!(solver.markers[2][(0, 0, 0)], Marker::Boundary);
                assert_eq!(solver.markers[2][(0, 3, 0)], Marker::Fluid);
            }
            PressureSystem3::Flat { .. } => unreachable!(),
        }
    }
}
