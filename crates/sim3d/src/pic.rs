//! Particle-in-cell solver.

use freshet_core::{
    extrapolate_to_region, is_inside_sdf, Array3, ConstantScalarField3, ConstantVectorField3,
    ScalarField3, Size3,
};
use glam::Vec3;
use rayon::prelude::*;

use crate::collider::Collider3;
use crate::emitter::ParticleEmitter3;
use crate::grid::{FaceCenteredGrid3, ScalarGrid3};
use crate::particles::ParticleSystemData3;
use crate::pressure::GridSinglePhasePressureSolver3;
use crate::sampler;
use crate::GRAVITY;

/// Closed-domain wall flags. A set flag means the wall is a solid
/// boundary: particles clamp against it and the outward velocity
/// component is zeroed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DomainBoundary(u32);

impl DomainBoundary {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1 << 0);
    pub const RIGHT: Self = Self(1 << 1);
    pub const DOWN: Self = Self(1 << 2);
    pub const UP: Self = Self(1 << 3);
    pub const BACK: Self = Self(1 << 4);
    pub const FRONT: Self = Self(1 << 5);
    pub const ALL: Self = Self(0b111111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for DomainBoundary {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 3-D particle-in-cell (PIC) fluid solver.
///
/// A grid-particle hybrid: particle velocities are scattered onto the MAC
/// grid (trilinear weights), the grid runs the incompressible update
/// (gravity, boundary conditions, pressure projection over the
/// particle-derived signed-distance field), and the particles pick the
/// result back up with a plain trilinear gather before being advected
/// through the grid velocity field.
pub struct PicSolver3 {
    velocity: FaceCenteredGrid3,
    sdf: ScalarGrid3,
    u_markers: Array3<u8>,
    v_markers: Array3<u8>,
    w_markers: Array3<u8>,
    particles: ParticleSystemData3,
    pressure_solver: GridSinglePhasePressureSolver3,
    emitter: Option<Box<dyn ParticleEmitter3>>,
    collider: Option<Box<dyn Collider3>>,
    boundary_sdf: Box<dyn ScalarField3>,
    /// Which domain walls are closed.
    pub closed_domain_boundary: DomainBoundary,
    /// Max allowed CFL number; sets the advection sub-step count and the
    /// velocity extrapolation depth.
    pub max_cfl: f32,
    /// Gravitational acceleration applied on the grid.
    pub gravity: Vec3,
    current_time: f32,
}

impl PicSolver3 {
    pub fn new(resolution: Size3, grid_spacing: Vec3, origin: Vec3) -> Self {
        let velocity = FaceCenteredGrid3::new(resolution, grid_spacing, origin);
        let sdf = ScalarGrid3::new(resolution, grid_spacing, origin, f32::MAX);
        Self {
            u_markers: Array3::with_size(velocity.u_size(), 0),
            v_markers: Array3::with_size(velocity.v_size(), 0),
            w_markers: Array3::with_size(velocity.w_size(), 0),
            velocity,
            sdf,
            particles: ParticleSystemData3::new(),
            pressure_solver: GridSinglePhasePressureSolver3::new(),
            emitter: None,
            collider: None,
            boundary_sdf: Box::new(ConstantScalarField3::new(f32::MAX)),
            closed_domain_boundary: DomainBoundary::ALL,
            max_cfl: 5.0,
            gravity: Vec3::new(0.0, GRAVITY, 0.0),
            current_time: 0.0,
        }
    }

    pub fn velocity(&self) -> &FaceCenteredGrid3 {
        &self.velocity
    }

    pub fn velocity_mut(&mut self) -> &mut FaceCenteredGrid3 {
        &mut self.velocity
    }

    /// The particle-derived signed-distance field of the fluid.
    pub fn signed_distance_field(&self) -> &ScalarGrid3 {
        &self.sdf
    }

    pub fn particle_system_data(&self) -> &ParticleSystemData3 {
        &self.particles
    }

    pub fn particle_system_data_mut(&mut self) -> &mut ParticleSystemData3 {
        &mut self.particles
    }

    pub fn pressure_solver_mut(&mut self) -> &mut GridSinglePhasePressureSolver3 {
        &mut self.pressure_solver
    }

    pub fn set_emitter(&mut self, emitter: Box<dyn ParticleEmitter3>) {
        self.emitter = Some(emitter);
    }

    pub fn set_collider(&mut self, collider: Box<dyn Collider3>) {
        self.collider = Some(collider);
    }

    /// Sets the solid-boundary SDF used by the pressure solve and the
    /// blocked boundary conditions.
    pub fn set_boundary_sdf(&mut self, boundary_sdf: Box<dyn ScalarField3>) {
        self.boundary_sdf = boundary_sdf;
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Advances one time step.
    pub fn advance(&mut self, time_interval_in_seconds: f32) {
        if let Some(emitter) = &mut self.emitter {
            emitter.update(self.current_time, time_interval_in_seconds, &mut self.particles);
        }
        if let Some(collider) = &mut self.collider {
            collider.update(self.current_time, time_interval_in_seconds);
        }

        if self.particles.number_of_particles() > 0 {
            self.transfer_from_particles_to_grids();
            self.build_signed_distance_field();
            self.extrapolate_velocity_to_air();
            self.apply_boundary_condition();

            self.apply_gravity(time_interval_in_seconds);
            self.apply_boundary_condition();

            self.apply_pressure(time_interval_in_seconds);
            self.extrapolate_velocity_to_air();
            self.apply_boundary_condition();

            self.transfer_from_grids_to_particles();
            self.move_particles(time_interval_in_seconds);
        }

        self.current_time += time_interval_in_seconds;
    }

    /// Scatters particle velocities onto the grid with trilinear weights.
    ///
    /// Momentum and weight accumulate separately and divide at the end;
    /// faces no particle touched stay at zero and are marked invalid for
    /// the extrapolation pass.
    pub fn transfer_from_particles_to_grids(&mut self) {
        self.velocity.fill(Vec3::ZERO);

        let spacing = self.velocity.grid_spacing();
        let u_origin = self.velocity.u_origin();
        let v_origin = self.velocity.v_origin();
        let w_origin = self.velocity.w_origin();

        let mut u_weight = Array3::with_size(self.velocity.u_size(), 0.0f32);
        let mut v_weight = Array3::with_size(self.velocity.v_size(), 0.0f32);
        let mut w_weight = Array3::with_size(self.velocity.w_size(), 0.0f32);
        self.u_markers.resize(self.velocity.u_size(), 0);
        self.v_markers.resize(self.velocity.v_size(), 0);
        self.w_markers.resize(self.velocity.w_size(), 0);
        self.u_markers.fill(0);
        self.v_markers.fill(0);
        self.w_markers.fill(0);

        // Scatter targets vary per particle, so this pass stays serial.
        for i in 0..self.particles.number_of_particles() {
            let position = self.particles.positions()[i];
            let velocity = self.particles.velocities()[i];

            let (indices, weights) = sampler::linear_coordinates_and_weights(
                self.velocity.u_size(),
                u_origin,
                spacing,
                position,
            );
            for (idx, w) in indices.iter().zip(weights) {
                self.velocity.u_mut()[*idx] += velocity.x * w;
                u_weight[*idx] += w;
                self.u_markers[*idx] = 1;
            }

            let (indices, weights) = sampler::linear_coordinates_and_weights(
                self.velocity.v_size(),
                v_origin,
                spacing,
                position,
            );
            for (idx, w) in indices.iter().zip(weights) {
                self.velocity.v_mut()[*idx] += velocity.y * w;
                v_weight[*idx] += w;
                self.v_markers[*idx] = 1;
            }

            let (indices, weights) = sampler::linear_coordinates_and_weights(
                self.velocity.w_size(),
                w_origin,
                spacing,
                position,
            );
            for (idx, w) in indices.iter().zip(weights) {
                self.velocity.w_mut()[*idx] += velocity.z * w;
                w_weight[*idx] += w;
                self.w_markers[*idx] = 1;
            }
        }

        // Divide momentum by accumulated weight; untouched faces keep
        // their zero-initialized value.
        let u_w = &u_weight;
        self.velocity.u_mut().par_for_each_mut(|i, j, k, u| {
            let w = u_w[(i, j, k)];
            if w > 0.0 {
                *u /= w;
            }
        });
        let v_w = &v_weight;
        self.velocity.v_mut().par_for_each_mut(|i, j, k, v| {
            let w = v_w[(i, j, k)];
            if w > 0.0 {
                *v /= w;
            }
        });
        let w_w = &w_weight;
        self.velocity.w_mut().par_for_each_mut(|i, j, k, w_vel| {
            let w = w_w[(i, j, k)];
            if w > 0.0 {
                *w_vel /= w;
            }
        });
    }

    /// Gathers grid velocity back onto the particles, overwriting their
    /// velocities unconditionally (pure PIC).
    pub fn transfer_from_grids_to_particles(&mut self) {
        let velocity_grid = &self.velocity;
        let (positions, velocities) = self.particles.positions_and_velocities_mut();
        velocities
            .par_iter_mut()
            .zip(positions.par_iter())
            .for_each(|(v, x)| {
                *v = velocity_grid.sample(*x);
            });
    }

    /// Rebuilds the particle signed-distance field: per cell, the distance
    /// to the nearest particle (scanned through the hash searcher) minus
    /// the particle radius, then extrapolated into the collider region.
    pub fn build_signed_distance_field(&mut self) {
        let spacing = self.sdf.grid_spacing();
        let max_h = spacing.x.max(spacing.y).max(spacing.z);
        let radius = 1.2 * max_h / 2.0f32.sqrt();
        let sdf_band_radius = 2.0 * radius;

        self.particles.build_neighbor_searcher(2.0 * radius);
        let searcher = self.particles.neighbor_searcher();

        let origin = self.sdf.origin();
        let grid_spacing = self.sdf.grid_spacing();
        self.sdf.data_mut().par_fill_with(|i, j, k| {
            let pt = origin
                + grid_spacing * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5);
            let mut min_dist = sdf_band_radius;
            searcher.for_each_nearby_point(pt, 3.0 * radius, |_, x| {
                min_dist = min_dist.min((pt - x).length());
            });
            min_dist - radius
        });

        self.extrapolate_into_collider();
    }

    /// Extrapolates grid velocity from particle-touched (valid) faces into
    /// air (invalid) faces; the reach is `ceil(max_cfl)` cells.
    pub fn extrapolate_velocity_to_air(&mut self) {
        let depth = self.max_cfl.ceil() as usize;

        let u_input = self.velocity.u().clone();
        extrapolate_to_region(
            u_input.view(),
            self.u_markers.view(),
            depth,
            &mut self.velocity.u_mut().view_mut(),
        );
        let v_input = self.velocity.v().clone();
        extrapolate_to_region(
            v_input.view(),
            self.v_markers.view(),
            depth,
            &mut self.velocity.v_mut().view_mut(),
        );
        let w_input = self.velocity.w().clone();
        extrapolate_to_region(
            w_input.view(),
            self.w_markers.view(),
            depth,
            &mut self.velocity.w_mut().view_mut(),
        );
    }

    /// Blocked boundary conditions: zero the normal component on closed
    /// domain walls and on faces whose position lies inside the solid
    /// boundary SDF.
    pub fn apply_boundary_condition(&mut self) {
        let res = self.velocity.resolution();
        let flags = self.closed_domain_boundary;

        if flags.contains(DomainBoundary::LEFT) || flags.contains(DomainBoundary::RIGHT) {
            for k in 0..res.z {
                for j in 0..res.y {
                    if flags.contains(DomainBoundary::LEFT) {
                        self.velocity.u_mut()[(0, j, k)] = 0.0;
                    }
                    if flags.contains(DomainBoundary::RIGHT) {
                        self.velocity.u_mut()[(res.x, j, k)] = 0.0;
                    }
                }
            }
        }
        if flags.contains(DomainBoundary::DOWN) || flags.contains(DomainBoundary::UP) {
            for k in 0..res.z {
                for i in 0..res.x {
                    if flags.contains(DomainBoundary::DOWN) {
                        self.velocity.v_mut()[(i, 0, k)] = 0.0;
                    }
                    if flags.contains(DomainBoundary::UP) {
                        self.velocity.v_mut()[(i, res.y, k)] = 0.0;
                    }
                }
            }
        }
        if flags.contains(DomainBoundary::BACK) || flags.contains(DomainBoundary::FRONT) {
            for j in 0..res.y {
                for i in 0..res.x {
                    if flags.contains(DomainBoundary::BACK) {
                        self.velocity.w_mut()[(i, j, 0)] = 0.0;
                    }
                    if flags.contains(DomainBoundary::FRONT) {
                        self.velocity.w_mut()[(i, j, res.z)] = 0.0;
                    }
                }
            }
        }

        // Solid-boundary faces.
        let boundary_sdf = &self.boundary_sdf;
        let spacing = self.velocity.grid_spacing();
        let grid_origin = self.velocity.origin();
        let u_origin = grid_origin + Vec3::new(0.0, 0.5 * spacing.y, 0.5 * spacing.z);
        let v_origin = grid_origin + Vec3::new(0.5 * spacing.x, 0.0, 0.5 * spacing.z);
        let w_origin = grid_origin + Vec3::new(0.5 * spacing.x, 0.5 * spacing.y, 0.0);

        self.velocity.u_mut().par_for_each_mut(|i, j, k, u| {
            let pt = u_origin + spacing * Vec3::new(i as f32, j as f32, k as f32);
            if is_inside_sdf(boundary_sdf.sample(pt)) {
                *u = 0.0;
            }
        });
        self.velocity.v_mut().par_for_each_mut(|i, j, k, v| {
            let pt = v_origin + spacing * Vec3::new(i as f32, j as f32, k as f32);
            if is_inside_sdf(boundary_sdf.sample(pt)) {
                *v = 0.0;
            }
        });
        self.velocity.w_mut().par_for_each_mut(|i, j, k, w| {
            let pt = w_origin + spacing * Vec3::new(i as f32, j as f32, k as f32);
            if is_inside_sdf(boundary_sdf.sample(pt)) {
                *w = 0.0;
            }
        });
    }

    fn apply_gravity(&mut self, time_interval_in_seconds: f32) {
        let g = self.gravity * time_interval_in_seconds;
        if g.x.abs() > f32::EPSILON {
            self.velocity.u_mut().par_for_each_mut(|_, _, _, u| *u += g.x);
        }
        if g.y.abs() > f32::EPSILON {
            self.velocity.v_mut().par_for_each_mut(|_, _, _, v| *v += g.y);
        }
        if g.z.abs() > f32::EPSILON {
            self.velocity.w_mut().par_for_each_mut(|_, _, _, w| *w += g.z);
        }
    }

    fn apply_pressure(&mut self, time_interval_in_seconds: f32) {
        let input = self.velocity.clone();
        self.pressure_solver.solve(
            &input,
            time_interval_in_seconds,
            &mut self.velocity,
            self.boundary_sdf.as_ref(),
            &ConstantVectorField3::new(Vec3::ZERO),
            &self.sdf,
        );
    }

    /// CFL-substepped midpoint-rule advection, clamped against closed
    /// domain walls (zeroing the outward component) and finally against
    /// the collider.
    pub fn move_particles(&mut self, time_interval_in_seconds: f32) {
        let flow = &self.velocity;
        let bbox = flow.bounding_box();
        let flags = self.closed_domain_boundary;
        let num_sub_steps = (self.max_cfl.max(1.0)) as u32;
        let dt = time_interval_in_seconds / num_sub_steps as f32;

        let (positions, velocities) = self.particles.positions_and_velocities_mut();
        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .for_each(|(position, velocity)| {
                let mut pt = *position;
                let mut vel = *velocity;

                for _ in 0..num_sub_steps {
                    let vel0 = flow.sample(pt);
                    // Mid-point rule.
                    let mid_pt = pt + 0.5 * dt * vel0;
                    let mid_vel = flow.sample(mid_pt);
                    pt += dt * mid_vel;
                }

                if flags.contains(DomainBoundary::LEFT) && pt.x <= bbox.lower_corner.x {
                    pt.x = bbox.lower_corner.x;
                    vel.x = 0.0;
                }
                if flags.contains(DomainBoundary::RIGHT) && pt.x >= bbox.upper_corner.x {
                    pt.x = bbox.upper_corner.x;
                    vel.x = 0.0;
                }
                if flags.contains(DomainBoundary::DOWN) && pt.y <= bbox.lower_corner.y {
                    pt.y = bbox.lower_corner.y;
                    vel.y = 0.0;
                }
                if flags.contains(DomainBoundary::UP) && pt.y >= bbox.upper_corner.y {
                    pt.y = bbox.upper_corner.y;
                    vel.y = 0.0;
                }
                if flags.contains(DomainBoundary::BACK) && pt.z <= bbox.lower_corner.z {
                    pt.z = bbox.lower_corner.z;
                    vel.z = 0.0;
                }
                if flags.contains(DomainBoundary::FRONT) && pt.z >= bbox.upper_corner.z {
                    pt.z = bbox.upper_corner.z;
                    vel.z = 0.0;
                }

                *position = pt;
                *velocity = vel;
            });

        if let Some(collider) = &self.collider {
            positions
                .par_iter_mut()
                .zip(velocities.par_iter_mut())
                .for_each(|(position, velocity)| {
                    collider.resolve_collision(0.0, 0.0, position, velocity);
                });
        }
    }

    /// Propagates SDF values from free cells into collider-occupied cells
    /// so the surface stays well defined at solid boundaries.
    fn extrapolate_into_collider(&mut self) {
        let size = self.sdf.resolution();
        let mut valid = Array3::with_size(size, 0u8);
        let boundary_sdf = &self.boundary_sdf;
        let origin = self.sdf.origin();
        let spacing = self.sdf.grid_spacing();
        valid.par_fill_with(|i, j, k| {
            let pt = origin
                + spacing * Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5);
            if is_inside_sdf(boundary_sdf.sample(pt)) {
                0
            } else {
                1
            }
        });

        let depth = self.max_cfl.ceil() as usize;
        let input = self.sdf.data().clone();
        extrapolate_to_region(
            input.view(),
            valid.view(),
            depth,
            &mut self.sdf.data_mut().view_mut(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_block(solver: &mut PicSolver3, lo: Vec3, hi: Vec3, spacing: f32) {
        let mut points = Vec::new();
        let mut z = lo.z;
        while z <= hi.z {
            let mut y = lo.y;
            while y <= hi.y {
                let mut x = lo.x;
                while x <= hi.x {
                    points.push(Vec3::new(x, y, z));
                    x += spacing;
                }
                y += spacing;
            }
            z += spacing;
        }
        solver.particle_system_data_mut().add_particles(&points, &[], &[]);
    }

    #[test]
    fn test_transfer_round_trip_uniform_velocity() {
        let mut solver = PicSolver3::new(Size3::new(8, 8, 8), Vec3::ONE, Vec3::ZERO);
        spawn_block(&mut solver, Vec3::splat(2.0), Vec3::splat(6.0), 0.5);

        let n = solver.particle_system_data().number_of_particles();
        {
            let velocities = solver.particle_system_data_mut().velocities_mut();
            velocities.fill(Vec3::new(1.0, 0.0, 0.0));
        }

        solver.transfer_from_particles_to_grids();
        solver.transfer_from_grids_to_particles();

        // Interior particles should keep their uniform velocity through a
        // scatter/gather cycle.
        let positions = solver.particle_system_data().positions().to_vec();
        let velocities = solver.particle_system_data().velocities().to_vec();
        for i in 0..n {
            let p = positions[i];
            if p.cmpgt(Vec3::splat(3.0)).all() && p.cmplt(Vec3::splat(5.0)).all() {
                assert!(
                    (velocities[i].x - 1.0).abs() < 1e-3,
                    "interior particle lost velocity: {:?}",
                    velocities[i]
                );
            }
        }
    }

    #[test]
    fn test_sdf_negative_inside_positive_outside() {
        let mut solver = PicSolver3::new(Size3::new(8, 8, 8), Vec3::ONE, Vec3::ZERO);
        spawn_block(&mut solver, Vec3::splat(3.0), Vec3::splat(5.0), 0.4);

        solver.build_signed_distance_field();

        let inside = solver.signed_distance_field().sample(Vec3::splat(4.0));
        let outside = solver.signed_distance_field().sample(Vec3::new(1.0, 1.0, 1.0));
        assert!(inside < 0.0, "inside sdf = {}", inside);
        assert!(outside > 0.0, "outside sdf = {}", outside);
    }

    #[test]
    fn test_particles_fall_and_stay_in_domain() {
        let mut solver = PicSolver3::new(Size3::new(8, 8, 8), Vec3::ONE, Vec3::ZERO);
        spawn_block(&mut solver, Vec3::new(2.0, 5.0, 2.0), Vec3::new(6.0, 7.0, 6.0), 0.5);

        let y0: f32 = solver
            .particle_system_data()
            .positions()
            .iter()
            .map(|p| p.y)
            .sum::<f32>()
            / solver.particle_system_data().number_of_particles() as f32;

        for _ in 0..10 {
            solver.advance(1.0 / 60.0);
        }

        let positions = solver.particle_system_data().positions();
        let y1: f32 =
            positions.iter().map(|p| p.y).sum::<f32>() / positions.len() as f32;
        assert!(y1 < y0, "particles should fall: {} -> {}", y0, y1);

        let bbox = solver.velocity().bounding_box();
        for p in positions {
            assert!(
                bbox.contains(*p),
                "particle escaped the closed domain: {:?}",
                p
            );
        }
    }

    #[test]
    fn test_extrapolation_reaches_air_faces() {
        let mut solver = PicSolver3::new(Size3::new(6, 6, 6), Vec3::ONE, Vec3::ZERO);
        spawn_block(&mut solver, Vec3::splat(2.5), Vec3::splat(3.5), 0.4);
        {
            let velocities = solver.particle_system_data_mut().velocities_mut();
            velocities.fill(Vec3::new(2.0, 0.0, 0.0));
        }

        solver.transfer_from_particles_to_grids();
        solver.extrapolate_velocity_to_air();

        // A face a couple of cells outside the particle block picks up the
        // extrapolated velocity.
        let u = solver.velocity().u();
        assert!(u[(1, 3, 3)].abs() > 0.0, "air face should receive velocity");
    }
}
