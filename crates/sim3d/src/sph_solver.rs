//! Weakly compressible SPH solver.

use glam::Vec3;
use rayon::prelude::*;

use crate::collider::Collider3;
use crate::emitter::ParticleEmitter3;
use crate::particle_solver::ParticleSolverCore3;
use crate::sph::SphSystemData3;
use crate::sph_kernels::SphSpikyKernel3;

const TIME_STEP_LIMIT_BY_SPEED_FACTOR: f32 = 0.4;
const TIME_STEP_LIMIT_BY_FORCE_FACTOR: f32 = 0.25;

/// Computes pressure from the Murnaghan-Tait equation of state, with
/// asymmetric scaling of negative pressures to prevent surface clumping.
pub fn compute_pressure_from_eos(
    density: f32,
    target_density: f32,
    eos_scale: f32,
    eos_exponent: f32,
    negative_pressure_scale: f32,
) -> f32 {
    let mut p = eos_scale / eos_exponent * ((density / target_density).powf(eos_exponent) - 1.0);
    if p < 0.0 {
        p *= negative_pressure_scale;
    }
    p
}

/// 3-D weakly compressible SPH solver.
///
/// Pressure comes from an equation of state over the kernel-summed
/// density; viscosity is the SPH Laplacian of velocity; a pseudo-viscosity
/// pass smooths velocities after integration as a safety net for the
/// parameter-sensitive EOS formulation. Sub-stepping is bounded by the
/// speed of sound and peak force.
pub struct SphSolver3 {
    /// Stepping machinery and external-force configuration.
    pub core: ParticleSolverCore3,
    data: SphSystemData3,
    eos_exponent: f32,
    negative_pressure_scale: f32,
    viscosity_coefficient: f32,
    pseudo_viscosity_coefficient: f32,
    speed_of_sound: f32,
    time_step_limit_scale: f32,
    emitter: Option<Box<dyn ParticleEmitter3>>,
    current_time: f32,
}

impl Default for SphSolver3 {
    fn default() -> Self {
        Self::new()
    }
}

impl SphSolver3 {
    pub fn new() -> Self {
        Self::from_data(SphSystemData3::new())
    }

    /// Creates a solver with the given rest density, particle spacing, and
    /// relative kernel radius.
    pub fn with_params(
        target_density: f32,
        target_spacing: f32,
        relative_kernel_radius: f32,
    ) -> Self {
        let mut data = SphSystemData3::new();
        data.set_relative_kernel_radius(relative_kernel_radius);
        data.set_target_spacing(target_spacing);
        data.set_target_density(target_density);
        Self::from_data(data)
    }

    fn from_data(data: SphSystemData3) -> Self {
        Self {
            core: ParticleSolverCore3::new(),
            data,
            eos_exponent: 7.0,
            negative_pressure_scale: 0.0,
            viscosity_coefficient: 0.01,
            pseudo_viscosity_coefficient: 10.0,
            speed_of_sound: 100.0,
            time_step_limit_scale: 1.0,
            emitter: None,
            current_time: 0.0,
        }
    }

    pub fn sph_system_data(&self) -> &SphSystemData3 {
        &self.data
    }

    pub fn sph_system_data_mut(&mut self) -> &mut SphSystemData3 {
        &mut self.data
    }

    pub fn eos_exponent(&self) -> f32 {
        self.eos_exponent
    }

    /// Sets the equation-of-state exponent (Tait's equation). Inputs below
    /// 1.0 are clamped.
    pub fn set_eos_exponent(&mut self, new_eos_exponent: f32) {
        self.eos_exponent = new_eos_exponent.max(1.0);
    }

    pub fn negative_pressure_scale(&self) -> f32 {
        self.negative_pressure_scale
    }

    /// Sets the negative-pressure damping: 0 clamps negative pressures
    /// entirely, 1 leaves them untouched. Clamped to [0, 1].
    pub fn set_negative_pressure_scale(&mut self, scale: f32) {
        self.negative_pressure_scale = scale.clamp(0.0, 1.0);
    }

    pub fn viscosity_coefficient(&self) -> f32 {
        self.viscosity_coefficient
    }

    pub fn set_viscosity_coefficient(&mut self, coefficient: f32) {
        self.viscosity_coefficient = coefficient.max(0.0);
    }

    pub fn pseudo_viscosity_coefficient(&self) -> f32 {
        self.pseudo_viscosity_coefficient
    }

    pub fn set_pseudo_viscosity_coefficient(&mut self, coefficient: f32) {
        self.pseudo_viscosity_coefficient = coefficient.max(0.0);
    }

    pub fn speed_of_sound(&self) -> f32 {
        self.speed_of_sound
    }

    pub fn set_speed_of_sound(&mut self, speed: f32) {
        self.speed_of_sound = speed.max(f32::EPSILON);
    }

    pub fn time_step_limit_scale(&self) -> f32 {
        self.time_step_limit_scale
    }

    pub fn set_time_step_limit_scale(&mut self, scale: f32) {
        self.time_step_limit_scale = scale.max(0.0);
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

    /// Number of sub-steps needed to keep the explicit step stable, from
    /// the CFL-like speed-of-sound bound and the peak-force bound.
    pub fn number_of_sub_time_steps(&self, time_interval_in_seconds: f32) -> u32 {
        let kernel_radius = self.data.kernel_radius();
        let mass = self.data.mass();

        let max_force_magnitude = self
            .data
            .forces()
            .iter()
            .fold(0.0f32, |acc, f| acc.max(f.length()));

        let time_step_limit_by_speed =
            TIME_STEP_LIMIT_BY_SPEED_FACTOR * kernel_radius / self.speed_of_sound;
        let time_step_limit_by_force = if max_force_magnitude > 0.0 {
            TIME_STEP_LIMIT_BY_FORCE_FACTOR
                * (kernel_radius * mass / max_force_magnitude).sqrt()
        } else {
            f32::MAX
        };

        let desired_time_step = self.time_step_limit_scale
            * time_step_limit_by_speed.min(time_step_limit_by_force);

        (time_interval_in_seconds / desired_time_step).ceil().max(1.0) as u32
    }

    /// Advances one frame, sub-stepping as the stability bounds require.
    pub fn advance(&mut self, time_interval_in_seconds: f32) {
        let num_sub_steps = self.number_of_sub_time_steps(time_interval_in_seconds);
        let sub_dt = time_interval_in_seconds / num_sub_steps as f32;
        for _ in 0..num_sub_steps {
            self.advance_sub_time_step(sub_dt);
        }
    }

    /// One explicit sub-step of the full pipeline.
    pub fn advance_sub_time_step(&mut self, time_step_in_seconds: f32) {
        self.begin_advance_time_step(time_step_in_seconds);

        self.accumulate_non_pressure_forces(time_step_in_seconds);
        self.accumulate_pressure_force(time_step_in_seconds);

        self.integrate_and_collide(time_step_in_seconds);

        self.end_advance_time_step(time_step_in_seconds);

        self.current_time += time_step_in_seconds;
    }

    /// Semi-implicit Euler into the double buffers, collider resolution on
    /// the new state, then commit.
    pub fn integrate_and_collide(&mut self, time_step_in_seconds: f32) {
        self.core.time_integration(time_step_in_seconds, self.data.base());
        self.core.resolve_collision(self.data.base().radius());
        self.core.commit(self.data.base_mut());
    }

    /// Advances the solver clock (for derived solvers driving the pipeline
    /// themselves).
    pub fn tick(&mut self, time_step_in_seconds: f32) {
        self.current_time += time_step_in_seconds;
    }

    /// Clears forces, refreshes collaborators, and rebuilds the neighbor
    /// structures and densities.
    pub fn begin_advance_time_step(&mut self, time_step_in_seconds: f32) {
        self.data.base_mut().forces_mut().fill(Vec3::ZERO);
        self.core.update_collider(self.current_time, time_step_in_seconds);
        if let Some(emitter) = &mut self.emitter {
            emitter.update(
                self.current_time,
                time_step_in_seconds,
                self.data.base_mut(),
            );
        }

        let n = self.data.number_of_particles();
        self.core.resize_buffers(n);

        self.data.build_neighbor_searcher();
        self.data.build_neighbor_lists();
        self.data.update_densities();
    }

    /// Post-step pseudo-viscosity smoothing and density report.
    pub fn end_advance_time_step(&mut self, time_step_in_seconds: f32) {
        self.compute_pseudo_viscosity(time_step_in_seconds);

        let max_density = self
            .data
            .densities()
            .iter()
            .fold(0.0f32, |acc, &d| acc.max(d));
        log::info!(
            "max density: {}, ratio to target: {}",
            max_density,
            max_density / self.data.target_density()
        );
    }

    /// External (gravity, drag) plus viscosity forces.
    pub fn accumulate_non_pressure_forces(&mut self, _time_step_in_seconds: f32) {
        self.core.accumulate_external_forces(self.data.base_mut());
        self.accumulate_viscosity_force();
    }

    /// SPH viscosity: `f_i += mu * m^2 * (v_j - v_i) / rho_j * W''`.
    pub fn accumulate_viscosity_force(&mut self) {
        let n = self.data.number_of_particles();
        let mass_squared = self.data.mass() * self.data.mass();
        let viscosity = self.viscosity_coefficient;
        let kernel = SphSpikyKernel3::new(self.data.kernel_radius());

        let increments: Vec<Vec3> = {
            let positions = self.data.positions();
            let velocities = self.data.velocities();
            let densities = self.data.densities();
            let neighbor_lists = self.data.neighbor_lists();

            (0..n)
                .into_par_iter()
                .map(|i| {
                    let mut f = Vec3::ZERO;
                    for &j in &neighbor_lists[i] {
                        let dist = (positions[i] - positions[j]).length();
                        f += viscosity * mass_squared * (velocities[j] - velocities[i])
                            / densities[j]
                            * kernel.second_derivative(dist);
                    }
                    f
                })
                .collect()
        };

        self.data
            .base_mut()
            .forces_mut()
            .par_iter_mut()
            .zip(increments.par_iter())
            .for_each(|(f, inc)| *f += *inc);
    }

    /// EOS pressure plus symmetric pressure-gradient force.
    pub fn accumulate_pressure_force(&mut self, _time_step_in_seconds: f32) {
        self.compute_pressure();

        let n = self.data.number_of_particles();
        let mut pressure_forces = vec![Vec3::ZERO; n];
        self.accumulate_pressure_force_on(
            self.data.positions(),
            self.data.densities(),
            self.data.pressures(),
            &mut pressure_forces,
        );

        self.data
            .base_mut()
            .forces_mut()
            .par_iter_mut()
            .zip(pressure_forces.par_iter())
            .for_each(|(f, pf)| *f += *pf);
    }

    /// Fills the pressure layer from the equation of state.
    pub fn compute_pressure(&mut self) {
        let target_density = self.data.target_density();
        let eos_scale = target_density * self.speed_of_sound * self.speed_of_sound;
        let eos_exponent = self.eos_exponent;
        let negative_pressure_scale = self.negative_pressure_scale;

        let pressures: Vec<f32> = self
            .data
            .densities()
            .par_iter()
            .map(|&d| {
                compute_pressure_from_eos(
                    d,
                    target_density,
                    eos_scale,
                    eos_exponent,
                    negative_pressure_scale,
                )
            })
            .collect();

        self.data
            .pressures_mut()
            .par_iter_mut()
            .zip(pressures.par_iter())
            .for_each(|(p, src)| *p = *src);
    }

    /// Accumulates the symmetric pressure-gradient force into
    /// `pressure_forces`, reading an arbitrary (position, density,
    /// pressure) state. PCISPH re-enters this with predicted state.
    pub fn accumulate_pressure_force_on(
        &self,
        positions: &[Vec3],
        densities: &[f32],
        pressures: &[f32],
        pressure_forces: &mut [Vec3],
    ) {
        let mass_squared = self.data.mass() * self.data.mass();
        let kernel = SphSpikyKernel3::new(self.data.kernel_radius());
        let neighbor_lists = self.data.neighbor_lists();

        pressure_forces
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, pf)| {
                for &j in &neighbor_lists[i] {
                    let dist = (positions[i] - positions[j]).length();
                    if dist > 0.0 {
                        let dir = (positions[j] - positions[i]) / dist;
                        let para = mass_squared
                            * (pressures[i] / (densities[i] * densities[i])
                                + pressures[j] / (densities[j] * densities[j]));
                        *pf -= para * kernel.gradient_at(dist, dir);
                    }
                }
            });
    }

    /// Blends each velocity toward its SPH-interpolated neighborhood
    /// average; the blend factor saturates at 1.
    pub fn compute_pseudo_viscosity(&mut self, time_step_in_seconds: f32) {
        let n = self.data.number_of_particles();
        if n == 0 {
            return;
        }
        let mass = self.data.mass();
        let kernel = SphSpikyKernel3::new(self.data.kernel_radius());

        let smoothed: Vec<Vec3> = {
            let positions = self.data.positions();
            let velocities = self.data.velocities();
            let densities = self.data.densities();
            let neighbor_lists = self.data.neighbor_lists();

            (0..n)
                .into_par_iter()
                .map(|i| {
                    let mut weight_sum = 0.0f32;
                    let mut smoothed_velocity = Vec3::ZERO;
                    for &j in &neighbor_lists[i] {
                        let dist = (positions[i] - positions[j]).length();
                        let wj = mass / densities[j] * kernel.value(dist);
                        weight_sum += wj;
                        smoothed_velocity += wj * velocities[j];
                    }
                    let wi = mass / densities[i];
                    weight_sum += wi;
                    smoothed_velocity += wi * velocities[i];

                    if weight_sum > 0.0 {
                        smoothed_velocity /= weight_sum;
                    }
                    smoothed_velocity
                })
                .collect()
        };

        let factor = (time_step_in_seconds * self.pseudo_viscosity_coefficient).clamp(0.0, 1.0);
        self.data
            .base_mut()
            .velocities_mut()
            .par_iter_mut()
            .zip(smoothed.par_iter())
            .for_each(|(v, sv)| {
                *v = (1.0 - factor) * *v + factor * *sv;
            });
    }
}
