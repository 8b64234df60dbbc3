//! Single-phase pressure solver.

use freshet_core::{is_inside_sdf, Array2, ScalarField2, Size2, VectorField2};
use freshet_fdm::{
    FdmIccgSolver2, FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrix2, FdmMgLinearSystem2,
    FdmMgSolver2, FdmMgUtils2, FdmVector2,
};
use glam::Vec2;

use crate::grid::FaceCenteredGrid2;
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
pub enum PressureSystem2 {
    Flat {
        system: FdmLinearSystem2,
        solver: Box<dyn FdmLinearSystemSolver2>,
    },
    Multigrid {
        system: FdmMgLinearSystem2,
        solver: FdmMgSolver2,
    },
}

/// 2-D single-phase pressure solver.
///
/// Encodes boundaries block-wise: each cell center is classified as
/// Boundary, Fluid, or Air from the signed-distance inputs, the Poisson
/// system is assembled over Fluid cells only (identity rows elsewhere),
/// solved by the injected linear-system solver, and the pressure gradient
/// is applied back onto the face velocities. Air pressure is pinned to
/// zero, so free surfaces see a constant-pressure atmosphere.
pub struct GridSinglePhasePressureSolver2 {
    storage: PressureSystem2,
    markers: Vec<Array2<Marker>>,
}

impl Default for GridSinglePhasePressureSolver2 {
    fn default() -> Self {
        Self::new()
    }
}

impl GridSinglePhasePressureSolver2 {
    /// Creates a solver backed by flat ICCG.
    pub fn new() -> Self {
        Self {
            storage: PressureSystem2::Flat {
                system: FdmLinearSystem2::new(),
                solver: Box::new(FdmIccgSolver2::new(DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE)),
            },
            markers: Vec::new(),
        }
    }

    /// Switches to a flat iterative solver, dropping any multigrid state.
    pub fn set_linear_system_solver(&mut self, solver: Box<dyn FdmLinearSystemSolver2>) {
        self.storage = PressureSystem2::Flat {
            system: FdmLinearSystem2::new(),
            solver,
        };
    }

    /// Switches to a multigrid solver, dropping any flat state.
    pub fn set_multigrid_solver(&mut self, solver: FdmMgSolver2) {
        self.storage = PressureSystem2::Multigrid {
            system: FdmMgLinearSystem2::new(),
            solver,
        };
    }

    /// The active system storage (flat or multigrid).
    pub fn system(&self) -> &PressureSystem2 {
        &self.storage
    }

    /// The solved pressure field on the finest level.
    pub fn pressure(&self) -> &FdmVector2 {
        match &self.storage {
            PressureSystem2::Flat { system, .. } => &system.x,
            PressureSystem2::Multigrid { system, .. } => &system.x.levels[0],
        }
    }

    /// The finest-level marker grid from the last solve.
    pub fn markers(&self) -> &Array2<Marker> {
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
        input: &FaceCenteredGrid2,
        _time_interval_in_seconds: f32,
        output: &mut FaceCenteredGrid2,
        boundary_sdf: &dyn ScalarField2,
        _boundary_velocity: &dyn VectorField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        self.build_markers(input, boundary_sdf, fluid_sdf);
        self.build_system(input);

        let converged = match &mut self.storage {
            PressureSystem2::Flat { system, solver } => solver.solve(system),
            PressureSystem2::Multigrid { system, solver } => solver.solve(system),
        };
        if !converged {
            log::debug!("pressure solve below tolerance; using best-effort field");
        }

        output.set_from(input);
        self.apply_pressure_gradient(input, output);
    }

    fn max_number_of_levels(&self) -> usize {
        match &self.storage {
            PressureSystem2::Flat { .. } => 1,
            PressureSystem2::Multigrid { solver, .. } => solver.params().max_number_of_levels,
        }
    }

    fn build_markers(
        &mut self,
        input: &FaceCenteredGrid2,
        boundary_sdf: &dyn ScalarField2,
        fluid_sdf: &dyn ScalarField2,
    ) {
        let size = input.resolution();
        let max_levels = self.max_number_of_levels();
        FdmMgUtils2::resize_array_with_finest(size, max_levels, &mut self.markers);

        // Top level samples the SDFs at cell centers.
        self.markers[0].par_fill_with(|i, j| {
            let pt = input.cell_center_position(i, j);
            if is_inside_sdf(boundary_sdf.sample(pt)) {
                Marker::Boundary
            } else if is_inside_sdf(fluid_sdf.sample(pt)) {
                Marker::Fluid
            } else {
                Marker::Air
            }
        });

        // Coarser levels take the majority over the clamped 4x4 finer
        // footprint, with the Marker enum's documented tie-break order.
        for l in 1..self.markers.len() {
            let (finer_levels, coarser_levels) = self.markers.split_at_mut(l);
            let finer = &finer_levels[l - 1];
            let coarser = &mut coarser_levels[0];
            let n = coarser.size();

            coarser.par_fill_with(|i, j| {
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

                let mut counts = [0usize; 3];
                for &jj in &j_indices {
                    for &ii in &i_indices {
                        counts[finer[(ii, jj)] as usize] += 1;
                    }
                }
                Marker::vote(counts)
            });
        }
    }

    fn build_system(&mut self, input: &FaceCenteredGrid2) {
        let size = input.resolution();
        match &mut self.storage {
            PressureSystem2::Flat { system, .. } => {
                system.resize(size);
                build_single_system(&mut system.a, &mut system.b, &self.markers[0], input);
            }
            PressureSystem2::Multigrid { system, solver } => {
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
                    let res = Size2::new(finer.resolution().x >> 1, finer.resolution().y >> 1);
                    let h = finer.grid_spacing() * 2.0;
                    let mut coarser = FaceCenteredGrid2::new(res, h, finer.origin());
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

    fn apply_pressure_gradient(&self, input: &FaceCenteredGrid2, output: &mut FaceCenteredGrid2) {
        let size = input.resolution();
        let markers = &self.markers[0];
        let x = self.pressure();
        let inv_h = Vec2::ONE / input.grid_spacing();

        for j in 0..size.y {
            for i in 0..size.x {
                if markers[(i, j)] != Marker::Fluid {
                    continue;
                }
                if i + 1 < size.x && markers[(i + 1, j)] != Marker::Boundary {
                    output.u_mut()[(i + 1, j)] =
                        input.u()[(i + 1, j)] + inv_h.x * (x[(i + 1, j)] - x[(i, j)]);
                }
                if j + 1 < size.y && markers[(i, j + 1)] != Marker::Boundary {
                    output.v_mut()[(i, j + 1)] =
                        input.v()[(i, j + 1)] + inv_h.y * (x[(i, j + 1)] - x[(i, j)]);
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
    a: &mut FdmMatrix2,
    b: &mut FdmVector2,
    markers: &Array2<Marker>,
    input: &FaceCenteredGrid2,
) {
    let size = input.resolution();
    let inv_h = Vec2::ONE / input.grid_spacing();
    let inv_h_sqr = inv_h * inv_h;

    for j in 0..size.y {
        for i in 0..size.x {
            let row = &mut a[(i, j)];
            row.center = 0.0;
            row.right = 0.0;
            row.up = 0.0;
            b[(i, j)] = 0.0;

            if markers[(i, j)] != Marker::Fluid {
                row.center = 1.0;
                continue;
            }

            b[(i, j)] = input.divergence_at_cell_center(i, j);

            if i + 1 < size.x && markers[(i + 1, j)] != Marker::Boundary {
                row.center += inv_h_sqr.x;
                if markers[(i + 1, j)] == Marker::Fluid {
                    row.right -= inv_h_sqr.x;
                }
            }
            if i > 0 && markers[(i - 1, j)] != Marker::Boundary {
                row.center += inv_h_sqr.x;
            }
            if j + 1 < size.y && markers[(i, j + 1)] != Marker::Boundary {
                row.center += inv_h_sqr.y;
                if markers[(i, j + 1)] == Marker::Fluid {
                    row.up -= inv_h_sqr.y;
                }
            }
            if j > 0 && markers[(i, j - 1)] != Marker::Boundary {
                row.center += inv_h_sqr.y;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use freshet_core::{ConstantScalarField2, ConstantVectorField2};

    use super::*;

    fn solve_on(
        input: &FaceCenteredGrid2,
        solver: &mut GridSinglePhasePressureSolver2,
        boundary: &dyn ScalarField2,
        fluid: &dyn ScalarField2,
    ) -> FaceCenteredGrid2 {
        let mut output = input.clone();
        solver.solve(
            input,
            1.0 / 60.0,
            &mut output,
            boundary,
            &ConstantVectorField2::new(Vec2::ZERO),
            fluid,
        );
        output
    }

    #[test]
    fn test_enclosed_zero_divergence_region_is_untouched() {
        // A fully enclosed fluid region with zero velocity has zero
        // divergence; the projection must leave the velocity unchanged.
        let size = Size2::new(6, 6);
        let input = FaceCenteredGrid2::new(size, Vec2::ONE, Vec2::ZERO);

        let boundary = |p: Vec2| {
            if p.x < 1.0 || p.x > 5.0 || p.y < 1.0 || p.y > 5.0 {
                -1.0
            } else {
                1.0
            }
        };
        let fluid = ConstantScalarField2::new(-f32::MAX);

        let mut solver = GridSinglePhasePressureSolver2::new();
        let output = solve_on(&input, &mut solver, &boundary, &fluid);

        for v in output.u().as_slice() {
            assert!(v.abs() < 1e-4, "u velocity changed: {}", v);
        }
        for v in output.v().as_slice() {
            assert!(v.abs() < 1e-4, "v velocity changed: {}", v);
        }
    }

    #[test]
    fn test_single_fluid_cell_gets_non_identity_row() {
        // 4x4 domain, one fluid cell at (1, 1) surrounded by boundary and
        // a divergence source injected through its faces.
        let size = Size2::new(4, 4);
        let mut input = FaceCenteredGrid2::new(size, Vec2::ONE, Vec2::ZERO);
        input.u_mut()[(2, 1)] = 1.0;

        let boundary = |p: Vec2| {
            let inside_cell = p.x > 1.0 && p.x < 2.0 && p.y > 1.0 && p.y < 2.0;
            if inside_cell {
                1.0
            } else {
                -1.0
            }
        };
        let fluid = ConstantScalarField2::new(-f32::MAX);

        let mut solver = GridSinglePhasePressureSolver2::new();
        let _ = solve_on(&input, &mut solver, &boundary, &fluid);

        assert_eq!(solver.markers()[(1, 1)], Marker::Fluid);
        assert_eq!(solver.markers()[(0, 0)], Marker::Boundary);

        match solver.system() {
            PressureSystem2::Flat { system, .. } => {
                // All neighbors are boundary, so the row keeps a zero
                // diagonal (pure Neumann cell) and a nonzero RHS -- a
                // non-identity row, unlike every boundary cell around it.
                let row = system.a[(1, 1)];
                let rhs = system.b[(1, 1)];
                assert_ne!(
                    (row.center, row.right, row.up),
                    (1.0, 0.0, 0.0),
                    "fluid cell must not get the identity row"
                );
                assert!(rhs.abs() > 0.5, "divergence must reach the RHS, got {}", rhs);
                assert_eq!(system.a[(0, 0)].center, 1.0);
            }
            PressureSystem2::Multigrid { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_divergent_source_builds_pressure_gradient() {
        // Fluid block in the middle of a solid box; a velocity source on
        // one internal face must produce a non-uniform pressure.
        let size = Size2::new(8, 8);
        let mut input = FaceCenteredGrid2::new(size, Vec2::ONE, Vec2::ZERO);
        input.u_mut()[(4, 4)] = 1.0;

        let boundary = |p: Vec2| {
            if p.x < 1.0 || p.x > 7.0 || p.y < 1.0 || p.y > 7.0 {
                -1.0
            } else {
                1.0
            }
        };
        let fluid = ConstantScalarField2::new(-f32::MAX);

        let mut solver = GridSinglePhasePressureSolver2::new();
        let output = solve_on(&input, &mut solver, &boundary, &fluid);

        let p = solver.pressure();
        let spread = p.as_slice().iter().fold(f32::MIN, |a, &b| a.max(b))
            - p.as_slice().iter().fold(f32::MAX, |a, &b| a.min(b));
        assert!(spread > 1e-4, "pressure should vary, spread = {}", spread);

        // The projection should reduce the divergence of the fluid cells.
        let mut max_div: f32 = 0.0;
        for j in 1..7 {
            for i in 1..7 {
                max_div = max_div.max(output.divergence_at_cell_center(i, j).abs());
            }
        }
        assert!(max_div < 0.5, "divergence not reduced: {}", max_div);
    }

    #[test]
    fn test_multigrid_storage_replaces_flat() {
        let mut solver = GridSinglePhasePressureSolver2::new();
        solver.set_multigrid_solver(FdmMgSolver2::new(3));
        assert!(matches!(
            solver.system(),
            PressureSystem2::Multigrid { .. }
        ));

        solver.set_linear_system_solver(Box::new(FdmIccgSolver2::new(50, 1e-5)));
        assert!(matches!(solver.system(), PressureSystem2::Flat { .. }));
    }

    #[test]
    fn test_multigrid_solve_runs() {
        let size = Size2::new(16, 16);
        let mut input = FaceCenteredGrid2::new(size, Vec2::ONE, Vec2::ZERO);
        input.u_mut()[(8, 8)] = 1.0;

        let boundary = |p: Vec2| {
            if p.x < 1.0 || p.x > 15.0 || p.y < 1.0 || p.y > 15.0 {
                -1.0
            } else {
                1.0
            }
        };
        let fluid = ConstantScalarField2::new(-f32::MAX);

        let mut solver = GridSinglePhasePressureSolver2::new();
        solver.set_multigrid_solver(FdmMgSolver2::new(3));
        let _ = solve_on(&input, &mut solver, &boundary, &fluid);

        match solver.system() {
            PressureSystem2::Multigrid { system, .. } => {
                assert_eq!(system.number_of_levels(), 3);
            }
            PressureSystem2::Flat { .. } => unreachable!(),
        }
    }
}
