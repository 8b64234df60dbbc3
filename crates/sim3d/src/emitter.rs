//! Particle emitter contract.

use crate::particles::ParticleSystemData3;

/// Opaque particle source invoked once per step before transfers.
///
/// Implementations push new particles into the target data via
/// [`ParticleSystemData3::add_particles`].
pub trait ParticleEmitter3 {
    fn update(
        &mut self,
        current_time_in_seconds: f32,
        time_interval_in_seconds: f32,
        particles: &mut ParticleSystemData3,
    );
}
