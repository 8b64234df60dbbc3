//! Predictive-corrective incompressible SPH.

use freshet_core::BoundingBox3;
use glam::Vec3;
use rayon::prelude::*;

use crate::sph::bcc_lattice_points;
use crate::sph_kernels::{SphSpikyKernel3, SphStdKernel3};
use crate::sph_solver::SphSolver3;

const DEFAULT_TIME_STEP_LIMIT_SCALE: f32 = 5.0;

/// 3-D PCISPH solver.
///
/// Replaces the equation-of-state pressure stage with the
/// predictive-corrective iteration of Solenthaler and Pajarola (SIGGRAPH
/// 2009): predict positions under the accumulated pressure force, measure
/// the resulting density error, convert it to a pressure increment through
/// the precomputed compressibility coefficient delta, and repeat until the
/// error ratio falls under the threshold or the iteration budget runs out.
pub struct PciSphSolver3 {
    base: SphSolver3,
    max_density_error_ratio: f32,
    max_number_of_iterations: u32,
    temp_positions: Vec<Vec3>,
    temp_velocities: Vec<Vec3>,
    pressure_forces: Vec<Vec3>,
    density_errors: Vec<f32>,
}

impl Default for PciSphSolver3 {
    fn default() -> Self {
        Self::from_base(SphSolver3::new())
    }
}

impl PciSphSolver3 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a solver with the given rest density, particle spacing, and
    /// relative kernel radius.
    pub fn with_params(
        target_density: f32,
        target_spacing: f32,
        relative_kernel_radius: f32,
    ) -> Self {
        Self::from_base(SphSolver3::with_params(
            target_density,
            target_spacing,
            relative_kernel_radius,
        ))
    }

    fn from_base(mut base: SphSolver3) -> Self {
        // The corrective loop absorbs much larger time steps than raw
        // WCSPH, so the default sub-step bound is relaxed.
        base.set_time_step_limit_scale(DEFAULT_TIME_STEP_LIMIT_SCALE);
        Self {
            base,
            max_density_error_ratio: 0.01,
            max_number_of_iterations: 5,
            temp_positions: Vec::new(),
            temp_velocities: Vec::new(),
            pressure_forces: Vec::new(),
            density_errors: Vec::new(),
        }
    }

    /// The underlying SPH solver (data, viscosity, collider plumbing).
    pub fn sph(&self) -> &SphSolver3 {
        &self.base
    }

    pub fn sph_mut(&mut self) -> &mut SphSolver3 {
        &mut self.base
    }

    pub fn max_density_error_ratio(&self) -> f32 {
        self.max_density_error_ratio
    }

    /// Sets the allowed max density error ratio during the iteration.
    /// Default is 0.01 (1 %); negative inputs are clamped to zero.
    pub fn set_max_density_error_ratio(&mut self, ratio: f32) {
        self.max_density_error_ratio = ratio.max(0.0);
    }

    pub fn max_number_of_iterations(&self) -> u32 {
        self.max_number_of_iterations
    }

    /// Sets the iteration budget of the corrective loop. Default is 5.
    pub fn set_max_number_of_iterations(&mut self, n: u32) {
        self.max_number_of_iterations = n;
    }

    /// Advances one frame, sub-stepping as the stability bounds require.
    pub fn advance(&mut self, time_interval_in_seconds: f32) {
        let num_sub_steps = self.base.number_of_sub_time_steps(time_interval_in_seconds);
        let sub_dt = time_interval_in_seconds / num_sub_steps as f32;
        for _ in 0..num_sub_steps {
            self.advance_sub_time_step(sub_dt);
        }
    }

    /// One sub-step: the WCSPH pipeline with the pressure stage swapped
    /// for the predictive-corrective loop.
    pub fn advance_sub_time_step(&mut self, time_step_in_seconds: f32) {
        self.base.begin_advance_time_step(time_step_in_seconds);

        // Temp buffers track the (possibly emitter-grown) particle count.
        let n = self.base.sph_system_data().number_of_particles();
        self.temp_positions.resize(n, Vec3::ZERO);
        self.temp_velocities.resize(n, Vec3::ZERO);
        self.pressure_forces.resize(n, Vec3::ZERO);
        self.density_errors.resize(n, 0.0);

        self.base.accumulate_non_pressure_forces(time_step_in_seconds);
        self.accumulate_pressure_force(time_step_in_seconds);

        self.base.integrate_and_collide(time_step_in_seconds);

        self.base.end_advance_time_step(time_step_in_seconds);
        self.base.tick(time_step_in_seconds);
    }

    /// The predictive-corrective pressure loop.
    pub fn accumulate_pressure_force(&mut self, time_step_in_seconds: f32) {
        let n = self.base.sph_system_data().number_of_particles();
        if n == 0 {
            return;
        }

        let delta = self.compute_delta(time_step_in_seconds);
        let target_density = self.base.sph_system_data().target_density();
        let mass = self.base.sph_system_data().mass();
        let negative_pressure_scale = self.base.negative_pressure_scale();
        let kernel = SphStdKernel3::new(self.base.sph_system_data().kernel_radius());

        // Accumulated pressure and predicted densities.
        let mut pressures = vec![0.0f32; n];
        let mut predicted_densities: Vec<f32> =
            self.base.sph_system_data().densities().to_vec();

        self.pressure_forces.fill(Vec3::ZERO);
        self.density_errors.fill(0.0);

        let mut max_num_iter = 0u32;
        let mut max_density_error = 0.0f32;
        let mut density_error_ratio = 0.0f32;

        for k in 0..self.max_number_of_iterations {
            // Predict velocity and position under the current force plus
            // the accumulated pressure force.
            {
                let data = self.base.sph_system_data();
                let positions = data.positions();
                let velocities = data.velocities();
                let forces = data.forces();
                let pressure_forces = &self.pressure_forces;

                self.temp_velocities
                    .par_iter_mut()
                    .zip(self.temp_positions.par_iter_mut())
                    .enumerate()
                    .for_each(|(i, (tv, tp))| {
                        *tv = velocities[i]
                            + time_step_in_seconds / mass * (forces[i] + pressure_forces[i]);
                        *tp = positions[i] + time_step_in_seconds * *tv;
                    });
            }

            // Resolve collisions on the *predicted* state.
            let radius = self.base.sph_system_data().base().radius();
            self.base.core.resolve_collision_on(
                radius,
                &mut self.temp_positions,
                &mut self.temp_velocities,
            );

            // Re-estimate density at the predicted positions and convert
            // the error to a pressure increment.
            {
                let data = self.base.sph_system_data();
                let neighbor_lists = data.neighbor_lists();
                let temp_positions = &self.temp_positions;

                let updates: Vec<(f32, f32, f32)> = (0..n)
                    .into_par_iter()
                    .map(|i| {
                        let mut weight_sum = 0.0f32;
                        for &j in &neighbor_lists[i] {
                            let dist = (temp_positions[j] - temp_positions[i]).length();
                            weight_sum += kernel.value(dist);
                        }
                        weight_sum += kernel.value(0.0);

                        let density = mass * weight_sum;
                        let mut density_error = density - target_density;
                        let mut pressure = delta * density_error;

                        if pressure < 0.0 {
                            pressure *= negative_pressure_scale;
                            density_error *= negative_pressure_scale;
                        }
                        (pressure, density, density_error)
                    })
                    .collect();

                for (i, (pressure, density, density_error)) in updates.into_iter().enumerate() {
                    pressures[i] += pressure;
                    predicted_densities[i] = density;
                    self.density_errors[i] = density_error;
                }
            }

            // Rebuild the pressure-gradient force from scratch with the
            // accumulated pressures and predicted densities.
            self.pressure_forces.fill(Vec3::ZERO);
            self.base.accumulate_pressure_force_on(
                self.base.sph_system_data().positions(),
                &predicted_densities,
                &pressures,
                &mut self.pressure_forces,
            );

            // Convergence check on the worst density error.
            max_density_error = self
                .density_errors
                .iter()
                .fold(0.0f32, |acc, &e| if e.abs() > acc.abs() { e } else { acc });
            density_error_ratio = max_density_error / target_density;
            max_num_iter = k + 1;

            if density_error_ratio.abs() < self.max_density_error_ratio {
                break;
            }
        }

        log::info!("number of PCI iterations: {}", max_num_iter);
        log::info!("max density error after PCI iteration: {}", max_density_error);
        if density_error_ratio.abs() > self.max_density_error_ratio {
            log::warn!(
                "max density error ratio is greater than the threshold: ratio {}, threshold {}",
                density_error_ratio,
                self.max_density_error_ratio
            );
        }

        // Store the accumulated pressures and fold the pressure force into
        // the force layer.
        self.base
            .sph_system_data_mut()
            .pressures_mut()
            .par_iter_mut()
            .zip(pressures.par_iter())
            .for_each(|(p, src)| *p = *src);

        let pressure_forces = &self.pressure_forces;
        self.base
            .sph_system_data_mut()
            .base_mut()
            .forces_mut()
            .par_iter_mut()
            .zip(pressure_forces.par_iter())
            .for_each(|(f, pf)| *f += *pf);
    }

    /// Precomputes the compressibility coefficient from a synthetic BCC
    /// lattice sample around the origin; live particle geometry never
    /// enters this term.
    pub fn compute_delta(&self, time_step_in_seconds: f32) -> f32 {
        let kernel_radius = self.base.sph_system_data().kernel_radius();

        let mut sample_bound =
            BoundingBox3::from_two_points(Vec3::ZERO, Vec3::ZERO);
        sample_bound.expand(1.5 * kernel_radius);
        let points = bcc_lattice_points(&sample_bound, self.base.sph_system_data().target_spacing());

        let kernel = SphSpikyKernel3::new(kernel_radius);

        let mut denom = 0.0f32;
        let mut denom1 = Vec3::ZERO;
        let mut denom2 = 0.0f32;

        for &point in &points {
            let distance_squared = point.length_squared();
            if distance_squared < kernel_radius * kernel_radius {
                let distance = distance_squared.sqrt();
                let direction = if distance > 0.0 { point / distance } else { Vec3::ZERO };

                // grad(W_ij)
                let grad_wij = kernel.gradient_at(distance, direction);
                denom1 += grad_wij;
                denom2 += grad_wij.dot(grad_wij);
            }
        }

        denom += -denom1.dot(denom1) - denom2;

        // A zero denominator means no kernel support at all; no
        // correction is applied rather than erroring out.
        if denom.abs() > 0.0 {
            -1.0 / (self.compute_beta(time_step_in_seconds) * denom)
        } else {
            0.0
        }
    }

    fn compute_beta(&self, time_step_in_seconds: f32) -> f32 {
        let data = self.base.sph_system_data();
        let x = data.mass() * time_step_in_seconds / data.target_density();
        3.0 * x * x
    }
}
