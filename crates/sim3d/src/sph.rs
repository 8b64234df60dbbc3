//! SPH particle system data.

use freshet_core::BoundingBox3;
use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::particles::ParticleSystemData3;
use crate::sph_kernels::SphStdKernel3;
use crate::WATER_DENSITY;

/// Particle system data specialized for SPH.
///
/// Adds density and pressure layers plus the SPH constants
/// {target density, target spacing, kernel radius}. The per-particle mass
/// is *derived* from the target density by sampling a synthetic
/// body-centered-cubic lattice at the target spacing and normalizing the
/// peak number density -- changing any of the three constants triggers a
/// mass recomputation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SphSystemData3 {
    base: ParticleSystemData3,
    target_density: f32,
    target_spacing: f32,
    kernel_radius_over_target_spacing: f32,
    kernel_radius: f32,
    pressure_idx: usize,
    density_idx: usize,
}

impl Default for SphSystemData3 {
    fn default() -> Self {
        Self::new()
    }
}

impl SphSystemData3 {
    pub fn new() -> Self {
        Self::with_particles(0)
    }

    pub fn with_particles(number_of_particles: usize) -> Self {
        let mut base = ParticleSystemData3::with_particles(number_of_particles);
        let density_idx = base.add_scalar_data(0.0);
        let pressure_idx = base.add_scalar_data(0.0);

        let mut data = Self {
            base,
            target_density: WATER_DENSITY,
            target_spacing: 0.1,
            kernel_radius_over_target_spacing: 1.8,
            kernel_radius: 0.0,
            pressure_idx,
            density_idx,
        };
        data.set_target_spacing(data.target_spacing);
        data
    }

    pub fn base(&self) -> &ParticleSystemData3 {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut ParticleSystemData3 {
        &mut self.base
    }

    pub fn number_of_particles(&self) -> usize {
        self.base.number_of_particles()
    }

    pub fn mass(&self) -> f32 {
        self.base.mass()
    }

    pub fn positions(&self) -> &[Vec3] {
        self.base.positions()
    }

    pub fn velocities(&self) -> &[Vec3] {
        self.base.velocities()
    }

    pub fn forces(&self) -> &[Vec3] {
        self.base.forces()
    }

    pub fn neighbor_lists(&self) -> &[Vec<usize>] {
        self.base.neighbor_lists()
    }

    pub fn densities(&self) -> &[f32] {
        self.base.scalar_data_at(self.density_idx)
    }

    pub fn densities_mut(&mut self) -> &mut [f32] {
        let idx = self.density_idx;
        self.base.scalar_data_at_mut(idx)
    }

    pub fn pressures(&self) -> &[f32] {
        self.base.scalar_data_at(self.pressure_idx)
    }

    pub fn pressures_mut(&mut self) -> &mut [f32] {
        let idx = self.pressure_idx;
        self.base.scalar_data_at_mut(idx)
    }

    pub fn target_density(&self) -> f32 {
        self.target_density
    }

    /// Sets the rest density; recomputes the particle mass.
    pub fn set_target_density(&mut self, target_density: f32) {
        self.target_density = target_density;
        self.compute_mass();
    }

    pub fn target_spacing(&self) -> f32 {
        self.target_spacing
    }

    /// Sets the rest particle spacing; updates the kernel radius and
    /// recomputes the particle mass.
    pub fn set_target_spacing(&mut self, spacing: f32) {
        self.base.set_radius(spacing);
        self.target_spacing = spacing;
        self.kernel_radius = self.kernel_radius_over_target_spacing * spacing;
        self.compute_mass();
    }

    pub fn relative_kernel_radius(&self) -> f32 {
        self.kernel_radius_over_target_spacing
    }

    /// Sets the kernel radius as a multiple of the target spacing;
    /// recomputes the particle mass.
    pub fn set_relative_kernel_radius(&mut self, relative_radius: f32) {
        self.kernel_radius_over_target_spacing = relative_radius;
        self.kernel_radius = relative_radius * self.target_spacing;
        self.compute_mass();
    }

    pub fn kernel_radius(&self) -> f32 {
        self.kernel_radius
    }

    /// Rebuilds the neighbor searcher at the kernel radius.
    pub fn build_neighbor_searcher(&mut self) {
        let radius = self.kernel_radius;
        self.base.build_neighbor_searcher(radius);
    }

    /// Rebuilds the neighbor lists at the kernel radius.
    pub fn build_neighbor_lists(&mut self) {
        let radius = self.kernel_radius;
        self.base.build_neighbor_lists(radius);
    }

    /// Kernel summation at `origin` over nearby particles.
    pub fn sum_of_kernel_nearby(&self, origin: Vec3) -> f32 {
        let mut sum = 0.0;
        let kernel = SphStdKernel3::new(self.kernel_radius);
        self.base
            .neighbor_searcher()
            .for_each_nearby_point(origin, self.kernel_radius, |_, neighbor_position| {
                sum += kernel.value((origin - neighbor_position).length());
            });
        sum
    }

    /// Recomputes the density layer from the current positions:
    /// `rho_i = m * sum_j W(|x_i - x_j|)` (self included at distance 0).
    ///
    /// The neighbor searcher must be up to date.
    pub fn update_densities(&mut self) {
        let m = self.mass();
        let positions = self.positions();
        let sums: Vec<f32> = positions
            .par_iter()
            .map(|&x| self.sum_of_kernel_nearby(x))
            .collect();

        self.densities_mut()
            .par_iter_mut()
            .zip(sums.par_iter())
            .for_each(|(d, sum)| *d = m * sum);
    }

    /// SPH-weighted average of scalar `values` at `origin`.
    ///
    /// The neighbor searcher and densities must be up to date.
    pub fn interpolate(&self, origin: Vec3, values: &[f32]) -> f32 {
        let mut sum = 0.0;
        let kernel = SphStdKernel3::new(self.kernel_radius);
        let m = self.mass();
        let densities = self.densities();

        self.base
            .neighbor_searcher()
            .for_each_nearby_point(origin, self.kernel_radius, |i, neighbor_position| {
                let dist = (origin - neighbor_position).length();
                let weight = m / densities[i] * kernel.value(dist);
                sum += weight * values[i];
            });
        sum
    }

    /// SPH-weighted average of vector `values` at `origin`.
    pub fn interpolate_vec(&self, origin: Vec3, values: &[Vec3]) -> Vec3 {
        let mut sum = Vec3::ZERO;
        let kernel = SphStdKernel3::new(self.kernel_radius);
        let m = self.mass();
        let densities = self.densities();

        self.base
            .neighbor_searcher()
            .for_each_nearby_point(origin, self.kernel_radius, |i, neighbor_position| {
                let dist = (origin - neighbor_position).length();
                let weight = m / densities[i] * kernel.value(dist);
                sum += weight * values[i];
            });
        sum
    }

    /// Symmetrized SPH gradient of `values` at the i-th particle.
    ///
    /// The neighbor lists and densities must be up to date.
    pub fn gradient_at(&self, i: usize, values: &[f32]) -> Vec3 {
        let mut sum = Vec3::ZERO;
        let positions = self.positions();
        let densities = self.densities();
        let origin = positions[i];
        let kernel = SphStdKernel3::new(self.kernel_radius);
        let m = self.mass();

        for &j in &self.neighbor_lists()[i] {
            let neighbor_position = positions[j];
            let dist = (origin - neighbor_position).length();
            if dist > 0.0 {
                let dir = (neighbor_position - origin) / dist;
                let para = densities[i]
                    * m
                    * (values[i] / (densities[i] * densities[i])
                        + values[j] / (densities[j] * densities[j]));
                sum += para * kernel.gradient_at(dist, dir);
            }
        }
        sum
    }

    /// SPH Laplacian of scalar `values` at the i-th particle.
    pub fn laplacian_at(&self, i: usize, values: &[f32]) -> f32 {
        let mut sum = 0.0;
        let positions = self.positions();
        let densities = self.densities();
        let origin = positions[i];
        let kernel = SphStdKernel3::new(self.kernel_radius);
        let m = self.mass();

        for &j in &self.neighbor_lists()[i] {
            let neighbor_position = positions[j];
            let dist = (origin - neighbor_position).length();
            sum += m * (values[j] - values[i]) / densities[j] * kernel.second_derivative(dist);
        }
        sum
    }

    /// SPH Laplacian of vector `values` at the i-th particle.
    pub fn laplacian_at_vec(&self, i: usize, values: &[Vec3]) -> Vec3 {
        let mut sum = Vec3::ZERO;
        let positions = self.positions();
        let densities = self.densities();
        let origin = positions[i];
        let kernel = SphStdKernel3::new(self.kernel_radius);
        let m = self.mass();

        for &j in &self.neighbor_lists()[i] {
            let neighbor_position = positions[j];
            let dist = (origin - neighbor_position).length();
            sum += m * (values[j] - values[i]) / densities[j] * kernel.second_derivative(dist);
        }
        sum
    }

    /// Calibrates the particle mass so a rest-spacing lattice reaches the
    /// target density.
    fn compute_mass(&mut self) {
        let bound = BoundingBox3::from_two_points(
            Vec3::splat(-1.5 * self.kernel_radius),
            Vec3::splat(1.5 * self.kernel_radius),
        );
        let points = bcc_lattice_points(&bound, self.target_spacing);

        let kernel = SphStdKernel3::new(self.kernel_radius);
        let mut max_number_density = 0.0f32;
        for &point in &points {
            let sum: f32 = points
                .iter()
                .map(|&neighbor| kernel.value((neighbor - point).length()))
                .sum();
            max_number_density = max_number_density.max(sum);
        }

        assert!(max_number_density > 0.0, "degenerate lattice sampling");
        self.base.set_mass(self.target_density / max_number_density);
    }
}

/// Body-centered-cubic lattice points inside `bounding_box`, where
/// `spacing` is the unit cell edge.
pub(crate) fn bcc_lattice_points(bounding_box: &BoundingBox3, spacing: f32) -> Vec<Vec3> {
    let half_spacing = spacing / 2.0;
    let box_width = bounding_box.width();
    let box_height = bounding_box.height();
    let box_depth = bounding_box.depth();

    let mut points = Vec::new();
    let mut has_offset = false;
    let mut k = 0;
    while k as f32 * half_spacing <= box_depth {
        let z = k as f32 * half_spacing + bounding_box.lower_corner.z;
        let offset = if has_offset { half_spacing } else { 0.0 };

        let mut j = 0;
        while j as f32 * spacing + offset <= box_height {
            let y = j as f32 * spacing + offset + bounding_box.lower_corner.y;
            let mut i = 0;
            while i as f32 * spacing + offset <= box_width {
                let x = i as f32 * spacing + offset + bounding_box.lower_corner.x;
                points.push(Vec3::new(x, y, z));
                i += 1;
            }
            j += 1;
        }

        has_offset = !has_offset;
        k += 1;
    }
    points
}
