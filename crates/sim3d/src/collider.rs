//! Collider contract.

use glam::Vec3;

/// Opaque collision resolver consumed by the particle solvers.
///
/// `resolve_collision` corrects a single particle's state in place and is
/// invoked from parallel regions with disjoint particles, hence the `Sync`
/// bound. Implementations own their geometry (plane, SDF, rigid body);
/// the solvers never look inside.
pub trait Collider3: Sync {
    /// Corrects `position`/`velocity` for a particle of the given radius,
    /// applying the restitution coefficient on the normal component.
    fn resolve_collision(
        &self,
        radius: f32,
        restitution_coefficient: f32,
        position: &mut Vec3,
        velocity: &mut Vec3,
    );

    /// Advances any internal collider state (moving bodies).
    fn update(&mut self, _current_time_in_seconds: f32, _time_interval_in_seconds: f32) {}
}
