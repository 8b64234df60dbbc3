//! Particle system data.

use freshet_core::{Array1, PointParallelHashGridSearcher3, Size3};
use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default bucket resolution of the neighbor searcher.
const DEFAULT_HASH_GRID_RESOLUTION: usize = 64;

/// Key data structure for particle-based simulation.
///
/// Every particle carries position, velocity, and force; solvers add
/// custom scalar/vector layers (density, pressure, temperature). All
/// layers resize in lock-step with the particle count.
///
/// Resizing or adding particles invalidates the neighbor searcher and the
/// neighbor lists; callers must rebuild them via
/// [`build_neighbor_searcher`](Self::build_neighbor_searcher) and
/// [`build_neighbor_lists`](Self::build_neighbor_lists) before the next
/// query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleSystemData3 {
    radius: f32,
    mass: f32,
    number_of_particles: usize,
    position_idx: usize,
    velocity_idx: usize,
    force_idx: usize,
    scalar_data_list: Vec<Array1<f32>>,
    vector_data_list: Vec<Array1<Vec3>>,
    neighbor_searcher: PointParallelHashGridSearcher3,
    neighbor_lists: Vec<Vec<usize>>,
}

impl Default for ParticleSystemData3 {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleSystemData3 {
    /// Creates an empty particle set.
    pub fn new() -> Self {
        Self::with_particles(0)
    }

    /// Creates a particle set with `number_of_particles` zeroed particles.
    pub fn with_particles(number_of_particles: usize) -> Self {
        let radius = 1e-3f32;
        let mut data = Self {
            radius,
            mass: 1e-3,
            number_of_particles: 0,
            position_idx: 0,
            velocity_idx: 0,
            force_idx: 0,
            scalar_data_list: Vec::new(),
            vector_data_list: Vec::new(),
            neighbor_searcher: PointParallelHashGridSearcher3::new(
                Size3::new(
                    DEFAULT_HASH_GRID_RESOLUTION,
                    DEFAULT_HASH_GRID_RESOLUTION,
                    DEFAULT_HASH_GRID_RESOLUTION,
                ),
                2.0 * radius,
            ),
            neighbor_lists: Vec::new(),
        };
        data.position_idx = data.add_vector_data(Vec3::ZERO);
        data.velocity_idx = data.add_vector_data(Vec3::ZERO);
        data.force_idx = data.add_vector_data(Vec3::ZERO);
        data.resize(number_of_particles);
        data
    }

    /// Resizes every layer to `new_number_of_particles`, zero-filling new
    /// slots. Invalidates the neighbor searcher and neighbor lists.
    pub fn resize(&mut self, new_number_of_particles: usize) {
        self.number_of_particles = new_number_of_particles;
        for layer in &mut self.scalar_data_list {
            layer.resize(new_number_of_particles, 0.0);
        }
        for layer in &mut self.vector_data_list {
            layer.resize(new_number_of_particles, Vec3::ZERO);
        }
    }

    pub fn number_of_particles(&self) -> usize {
        self.number_of_particles
    }

    /// Adds a scalar layer (e.g. temperature) and returns its index.
    pub fn add_scalar_data(&mut self, initial_value: f32) -> usize {
        let idx = self.scalar_data_list.len();
        self.scalar_data_list
            .push(Array1::with_size(self.number_of_particles, initial_value));
        idx
    }

    /// Adds a vector layer (e.g. vorticity) and returns its index.
    pub fn add_vector_data(&mut self, initial_value: Vec3) -> usize {
        let idx = self.vector_data_list.len();
        self.vector_data_list
            .push(Array1::with_size(self.number_of_particles, initial_value));
        idx
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, new_radius: f32) {
        self.radius = new_radius.max(0.0);
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn set_mass(&mut self, new_mass: f32) {
        self.mass = new_mass.max(0.0);
    }

    pub fn positions(&self) -> &[Vec3] {
        self.vector_data_list[self.position_idx].as_slice()
    }

    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        let idx = self.position_idx;
        self.vector_data_list[idx].as_mut_slice()
    }

    pub fn velocities(&self) -> &[Vec3] {
        self.vector_data_list[self.velocity_idx].as_slice()
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        let idx = self.velocity_idx;
        self.vector_data_list[idx].as_mut_slice()
    }

    pub fn forces(&self) -> &[Vec3] {
        self.vector_data_list[self.force_idx].as_slice()
    }

    pub fn forces_mut(&mut self) -> &mut [Vec3] {
        let idx = self.force_idx;
        self.vector_data_list[idx].as_mut_slice()
    }

    pub fn scalar_data_at(&self, idx: usize) -> &[f32] {
        self.scalar_data_list[idx].as_slice()
    }

    pub fn scalar_data_at_mut(&mut self, idx: usize) -> &mut [f32] {
        self.scalar_data_list[idx].as_mut_slice()
    }

    pub fn vector_data_at(&self, idx: usize) -> &[Vec3] {
        self.vector_data_list[idx].as_slice()
    }

    pub fn vector_data_at_mut(&mut self, idx: usize) -> &mut [Vec3] {
        self.vector_data_list[idx].as_mut_slice()
    }

    /// Force layer mutable alongside shared position/velocity layers.
    pub fn forces_with_kinematics_mut(&mut self) -> (&mut [Vec3], &[Vec3], &[Vec3]) {
        assert!(self.position_idx < self.force_idx && self.velocity_idx < self.force_idx);
        let (lo, hi) = self.vector_data_list.split_at_mut(self.force_idx);
        (
            hi[0].as_mut_slice(),
            lo[self.position_idx].as_slice(),
            lo[self.velocity_idx].as_slice(),
        )
    }

    /// Positions and velocities, both mutable.
    pub fn positions_and_velocities_mut(&mut self) -> (&mut [Vec3], &mut [Vec3]) {
        let (p_idx, v_idx) = (self.position_idx, self.velocity_idx);
        assert_ne!(p_idx, v_idx);
        let (lo, hi) = self.vector_data_list.split_at_mut(p_idx.max(v_idx));
        if p_idx < v_idx {
            (lo[p_idx].as_mut_slice(), hi[0].as_mut_slice())
        } else {
            (hi[0].as_mut_slice(), lo[v_idx].as_mut_slice())
        }
    }

    /// Appends a single particle. Custom layers get zeros.
    pub fn add_particle(&mut self, new_position: Vec3, new_velocity: Vec3, new_force: Vec3) {
        self.add_particles(&[new_position], &[new_velocity], &[new_force]);
    }

    /// Appends a batch of particles. Custom layers get zeros for the new
    /// slots.
    ///
    /// `new_velocities`/`new_forces` must be empty or match
    /// `new_positions` in length; a mismatch is a contract violation and
    /// panics. Invalidates the neighbor searcher and neighbor lists.
    pub fn add_particles(
        &mut self,
        new_positions: &[Vec3],
        new_velocities: &[Vec3],
        new_forces: &[Vec3],
    ) {
        assert!(
            new_velocities.is_empty() || new_velocities.len() == new_positions.len(),
            "velocity array length must match positions or be empty"
        );
        assert!(
            new_forces.is_empty() || new_forces.len() == new_positions.len(),
            "force array length must match positions or be empty"
        );

        let old_number_of_particles = self.number_of_particles;
        let new_number_of_particles = old_number_of_particles + new_positions.len();
        self.resize(new_number_of_particles);

        let positions = self.positions_mut();
        positions[old_number_of_particles..]
            .par_iter_mut()
            .zip(new_positions.par_iter())
            .for_each(|(dst, src)| *dst = *src);

        if !new_velocities.is_empty() {
            let velocities = self.velocities_mut();
            velocities[old_number_of_particles..]
                .par_iter_mut()
                .zip(new_velocities.par_iter())
                .for_each(|(dst, src)| *dst = *src);
        }

        if !new_forces.is_empty() {
            let forces = self.forces_mut();
            forces[old_number_of_particles..]
                .par_iter_mut()
                .zip(new_forces.par_iter())
                .for_each(|(dst, src)| *dst = *src);
        }
    }

    /// The current neighbor searcher. Valid only after
    /// [`build_neighbor_searcher`](Self::build_neighbor_searcher).
    pub fn neighbor_searcher(&self) -> &PointParallelHashGridSearcher3 {
        &self.neighbor_searcher
    }

    /// Neighbor index lists per particle. Valid only after
    /// [`build_neighbor_lists`](Self::build_neighbor_lists) and until the
    /// next resize/add.
    pub fn neighbor_lists(&self) -> &[Vec<usize>] {
        &self.neighbor_lists
    }

    /// Rebuilds the hash-grid searcher over the current positions with
    /// bucket spacing `2 * max_search_radius`.
    pub fn build_neighbor_searcher(&mut self, max_search_radius: f32) {
        self.neighbor_searcher = PointParallelHashGridSearcher3::new(
            Size3::new(
                DEFAULT_HASH_GRID_RESOLUTION,
                DEFAULT_HASH_GRID_RESOLUTION,
                DEFAULT_HASH_GRID_RESOLUTION,
            ),
            2.0 * max_search_radius,
        );
        let positions = self.vector_data_list[self.position_idx].as_slice();
        self.neighbor_searcher.build(positions);
    }

    /// Rebuilds the per-particle neighbor lists (self excluded).
    ///
    /// The output is a variable-length list per particle, so this build is
    /// intentionally single-threaded per particle slot; it requires a
    /// previously built searcher.
    pub fn build_neighbor_lists(&mut self, max_search_radius: f32) {
        let n = self.number_of_particles;
        let mut lists = vec![Vec::new(); n];

        let positions = self.positions();
        for (i, list) in lists.iter_mut().enumerate() {
            let origin = positions[i];
            self.neighbor_searcher
                .for_each_nearby_point(origin, max_search_radius, |j, _| {
                    if i != j {
                        list.push(j);
                    }
                });
        }

        self.neighbor_lists = lists;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layers() {
        let data = ParticleSystemData3::with_particles(12);
        assert_eq!(data.number_of_particles(), 12);
        assert_eq!(data.positions().len(), 12);
        assert_eq!(data.velocities().len(), 12);
        assert_eq!(data.forces().len(), 12);
    }

    #[test]
    fn test_custom_layers_resize_in_lockstep() {
        let mut data = ParticleSystemData3::new();
        let temperature = data.add_scalar_data(5.0);
        data.add_particles(&[Vec3::ONE, Vec3::ZERO], &[], &[]);
        assert_eq!(data.scalar_data_at(temperature).len(), 2);
        // New slots are zero-initialized, not layer-default.
        assert_eq!(data.scalar_data_at(temperature)[0], 0.0);
    }

    #[test]
    fn test_add_particles_appends() {
        let mut data = ParticleSystemData3::new();
        data.add_particle(Vec3::new(1.0, 2.0, 3.0), Vec3::X, Vec3::ZERO);
        data.add_particles(
            &[Vec3::splat(4.0), Vec3::splat(5.0)],
            &[Vec3::Y, Vec3::Z],
            &[],
        );
        assert_eq!(data.number_of_particles(), 3);
        assert_eq!(data.positions()[0], Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(data.positions()[2], Vec3::splat(5.0));
        assert_eq!(data.velocities()[1], Vec3::Y);
        assert_eq!(data.forces()[2], Vec3::ZERO);
    }

    #[test]
    #[should_panic(expected = "velocity array length must match")]
    fn test_add_particles_length_mismatch_panics() {
        let mut data = ParticleSystemData3::new();
        data.add_particles(&[Vec3::ZERO, Vec3::ONE], &[Vec3::X], &[]);
    }

    #[test]
    fn test_neighbor_lists_exclude_self() {
        let mut data = ParticleSystemData3::new();
        data.add_particles(
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.05, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 10.0),
            ],
            &[],
            &[],
        );
        data.build_neighbor_searcher(0.1);
        data.build_neighbor_lists(0.1);

        assert_eq!(data.neighbor_lists()[0], vec![1]);
        assert_eq!(data.neighbor_lists()[1], vec![0]);
        assert!(data.neighbor_lists()[2].is_empty());
    }
}
