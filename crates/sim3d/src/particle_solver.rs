//! Basic particle system solver.

use freshet_core::{ConstantVectorField3, VectorField3};
use glam::Vec3;
use rayon::prelude::*;

use crate::collider::Collider3;
use crate::emitter::ParticleEmitter3;
use crate::particles::ParticleSystemData3;
use crate::GRAVITY;

/// Shared stepping machinery for particle solvers.
///
/// Holds the external-force configuration (gravity, drag, wind), the
/// optional collider, and the double buffers for the semi-implicit Euler
/// step. The SPH solvers reuse it by composition instead of duplicating
/// the pipeline.
pub struct ParticleSolverCore3 {
    /// Linear air-drag coefficient; zero disables drag.
    pub drag_coefficient: f32,
    /// Bounciness on collider contact, clamped to [0, 1].
    pub restitution_coefficient: f32,
    /// Gravitational acceleration.
    pub gravity: Vec3,
    /// Optional collision resolver.
    pub collider: Option<Box<dyn Collider3>>,
    /// Ambient wind field feeding the drag force.
    pub wind: Box<dyn VectorField3>,
    new_positions: Vec<Vec3>,
    new_velocities: Vec<Vec3>,
}

impl Default for ParticleSolverCore3 {
    fn default() -> Self {
        Self {
            drag_coefficient: 1e-4,
            restitution_coefficient: 0.0,
            gravity: Vec3::new(0.0, GRAVITY, 0.0),
            collider: None,
            wind: Box::new(ConstantVectorField3::new(Vec3::ZERO)),
            new_positions: Vec::new(),
            new_velocities: Vec::new(),
        }
    }
}

impl ParticleSolverCore3 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the double buffers for `n` particles.
    pub fn resize_buffers(&mut self, n: usize) {
        self.new_positions.resize(n, Vec3::ZERO);
        self.new_velocities.resize(n, Vec3::ZERO);
    }

    /// Adds gravity and drag into the force layer.
    pub fn accumulate_external_forces(&self, data: &mut ParticleSystemData3) {
        let mass = data.mass();
        let gravity = self.gravity;
        let drag_coefficient = self.drag_coefficient;
        let wind = &self.wind;

        let (forces, positions, velocities) = data.forces_with_kinematics_mut();
        forces.par_iter_mut().enumerate().for_each(|(i, force)| {
            let relative_vel = velocities[i] - wind.sample(positions[i]);
            *force += mass * gravity - drag_coefficient * relative_vel;
        });
    }

    /// Semi-implicit Euler into the double buffers: velocity first, then
    /// position with the updated velocity.
    pub fn time_integration(&mut self, time_step_in_seconds: f32, data: &ParticleSystemData3) {
        let mass = data.mass();
        let positions = data.positions();
        let velocities = data.velocities();
        let forces = data.forces();

        self.new_velocities
            .par_iter_mut()
            .zip(self.new_positions.par_iter_mut())
            .enumerate()
            .for_each(|(i, (new_v, new_x))| {
                *new_v = velocities[i] + time_step_in_seconds * forces[i] / mass;
                *new_x = positions[i] + time_step_in_seconds * *new_v;
            });
    }

    /// Resolves collisions on the double-buffered state.
    pub fn resolve_collision(&mut self, radius: f32) {
        let (new_positions, new_velocities) = (&mut self.new_positions, &mut self.new_velocities);
        if let Some(collider) = &self.collider {
            let restitution = self.restitution_coefficient;
            new_positions
                .par_iter_mut()
                .zip(new_velocities.par_iter_mut())
                .for_each(|(position, velocity)| {
                    collider.resolve_collision(radius, restitution, position, velocity);
                });
        }
    }

    /// Resolves collisions on caller-provided state (used on predicted
    /// positions mid-iteration).
    pub fn resolve_collision_on(
        &self,
        radius: f32,
        positions: &mut [Vec3],
        velocities: &mut [Vec3],
    ) {
        if let Some(collider) = &self.collider {
            let restitution = self.restitution_coefficient;
            positions
                .par_iter_mut()
                .zip(velocities.par_iter_mut())
                .for_each(|(position, velocity)| {
                    collider.resolve_collision(radius, restitution, position, velocity);
                });
        }
    }

    /// Commits the double buffers into the live particle state, so
    /// mid-step readers always saw the pre-step state.
    pub fn commit(&self, data: &mut ParticleSystemData3) {
        let (positions, velocities) = data.positions_and_velocities_mut();
        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .enumerate()
            .for_each(|(i, (x, v))| {
                *x = self.new_positions[i];
                *v = self.new_velocities[i];
            });
    }

    /// Advances any collider state.
    pub fn update_collider(&mut self, current_time: f32, dt: f32) {
        if let Some(collider) = &mut self.collider {
            collider.update(current_time, dt);
        }
    }
}

/// Basic particle system solver: gravity, air drag, and collisions, with
/// no particle-to-particle interaction. Suitable for spray-like effects
/// and the foundation the SPH solvers build on.
pub struct ParticleSystemSolver3 {
    /// Stepping machinery and external-force configuration.
    pub core: ParticleSolverCore3,
    data: ParticleSystemData3,
    emitter: Option<Box<dyn ParticleEmitter3>>,
    current_time: f32,
}

impl Default for ParticleSystemSolver3 {
    fn default() -> Self {
        Self::new(1e-3, 1e-3)
    }
}

impl ParticleSystemSolver3 {
    /// Creates a solver with the given particle radius and mass.
    pub fn new(radius: f32, mass: f32) -> Self {
        let mut data = ParticleSystemData3::new();
        data.set_radius(radius);
        data.set_mass(mass);
        Self {
            core: ParticleSolverCore3::new(),
            data,
            emitter: None,
            current_time: 0.0,
        }
    }

    pub fn particle_system_data(&self) -> &ParticleSystemData3 {
        &self.data
    }

    pub fn particle_system_data_mut(&mut self) -> &mut ParticleSystemData3 {
        &mut self.data
    }

    pub fn set_emitter(&mut self, emitter: Box<dyn ParticleEmitter3>) {
        self.emitter = Some(emitter);
    }

    pub fn set_collider(&mut self, collider: Box<dyn Collider3>) {
        self.core.collider = Some(collider);
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Advances one time step.
    pub fn advance(&mut self, time_step_in_seconds: f32) {
        // Clear forces and refresh collaborators.
        self.data.forces_mut().fill(Vec3::ZERO);
        self.core.update_collider(self.current_time, time_step_in_seconds);
        if let Some(emitter) = &mut self.emitter {
            emitter.update(self.current_time, time_step_in_seconds, &mut self.data);
        }

        let n = self.data.number_of_particles();
        self.core.resize_buffers(n);

        self.core.accumulate_external_forces(&mut self.data);
        self.core.time_integration(time_step_in_seconds, &self.data);
        self.core.resolve_collision(self.data.radius());
        self.core.commit(&mut self.data);

        self.current_time += time_step_in_seconds;
    }
}
