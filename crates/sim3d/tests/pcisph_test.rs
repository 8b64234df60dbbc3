//! PCISPH density-error scenarios.

use freshet_core::BoundingBox3;
use freshet_sim3d::PciSphSolver3;
use glam::Vec3;

/// BCC block of particles covering `bound` at the given unit-cell edge.
fn lattice(bound: BoundingBox3, spacing: f32) -> Vec<Vec3> {
    let half = spacing / 2.0;
    let mut points = Vec::new();
    let mut has_offset = false;
    let mut k = 0;
    while k as f32 * half <= bound.depth() {
        let z = k as f32 * half + bound.lower_corner.z;
        let offset = if has_offset { half } else { 0.0 };
        let mut j = 0;
        while j as f32 * spacing + offset <= bound.height() {
            let y = j as f32 * spacing + offset + bound.lower_corner.y;
            let mut i = 0;
            while i as f32 * spacing + offset <= bound.width() {
                points.push(Vec3::new(
                    i as f32 * spacing + offset + bound.lower_corner.x,
                    y,
                    z,
                ));
                i += 1;
            }
            j += 1;
        }
        has_offset = !has_offset;
        k += 1;
    }
    points
}

#[test]
fn resting_lattice_density_stays_within_error_bound() {
    // Spec property: once the corrective loop converges for a uniform
    // lattice at the rest spacing, interior densities sit within the max
    // density error ratio of the target.
    let target_spacing = 0.1;
    let mut solver = PciSphSolver3::with_params(1000.0, target_spacing, 1.8);
    solver.sph_mut().core.gravity = Vec3::ZERO;
    solver.sph_mut().core.drag_coefficient = 0.0;

    let bound = BoundingBox3::from_two_points(Vec3::splat(-0.3), Vec3::splat(0.3));
    let points = lattice(bound, target_spacing);
    solver
        .sph_mut()
        .sph_system_data_mut()
        .base_mut()
        .add_particles(&points, &[], &[]);

    solver.advance_sub_time_step(1e-3);

    // Re-measure densities on the post-step state.
    solver.sph_mut().sph_system_data_mut().build_neighbor_searcher();
    solver.sph_mut().sph_system_data_mut().update_densities();

    let data = solver.sph().sph_system_data();
    let target = data.target_density();

    // Interior particle nearest the block center.
    let center_idx = data
        .positions()
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.length_squared().partial_cmp(&b.length_squared()).unwrap())
        .map(|(i, _)| i)
        .unwrap();

    let density = data.densities()[center_idx];
    let error_ratio = (density - target).abs() / target;
    assert!(
        error_ratio < 0.05,
        "interior density error too large: density {}, target {}",
        density,
        target
    );
}

#[test]
fn sub_step_keeps_state_finite() {
    let mut solver = PciSphSolver3::with_params(1000.0, 0.1, 1.8);
    let bound = BoundingBox3::from_two_points(Vec3::splat(-0.2), Vec3::splat(0.2));
    let points = lattice(bound, 0.1);
    solver
        .sph_mut()
        .sph_system_data_mut()
        .base_mut()
        .add_particles(&points, &[], &[]);

    for _ in 0..3 {
        solver.advance_sub_time_step(1e-3);
    }

    let data = solver.sph().sph_system_data();
    for (p, v) in data.positions().iter().zip(data.velocities()) {
        assert!(p.is_finite(), "position blew up: {:?}", p);
        assert!(v.is_finite(), "velocity blew up: {:?}", v);
    }
}

#[test]
fn empty_solver_is_a_noop() {
    // Degenerate-but-valid: zero particles must not error anywhere in the
    // pipeline.
    let mut solver = PciSphSolver3::new();
    solver.advance_sub_time_step(1e-3);
    assert_eq!(
        solver.sph().sph_system_data().number_of_particles(),
        0
    );
}
