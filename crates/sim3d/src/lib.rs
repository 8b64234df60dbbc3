//! 3-D fluid solvers.
//!
//! Grid side: cell-centered/collocated/face-centered grids, forward-Euler
//! diffusion, and the single-phase pressure solver (flat ICCG or
//! multigrid). Particle side: the particle system data/solver core, SPH
//! with equation-of-state pressure, the predictive-corrective PCISPH
//! solver, and the hybrid grid-particle PIC solver.

pub mod collider;
pub mod diffusion;
pub mod emitter;
pub mod grid;
pub mod marker;
pub mod particle_solver;
pub mod particles;
pub mod pcisph;
pub mod pic;
pub mod pressure;
pub mod sampler;
pub mod sph;
pub mod sph_kernels;
pub mod sph_solver;

pub use collider::Collider3;
pub use diffusion::GridForwardEulerDiffusionSolver3;
pub use emitter::ParticleEmitter3;
pub use grid::{FaceCenteredGrid3, ScalarGrid3, VectorGrid3};
pub use marker::Marker;
pub use particle_solver::{ParticleSolverCore3, ParticleSystemSolver3};
pub use particles::ParticleSystemData3;
pub use pcisph::PciSphSolver3;
pub use pic::{DomainBoundary, PicSolver3};
pub use pressure::{GridSinglePhasePressureSolver3, PressureSystem3};
pub use sph::SphSystemData3;
pub use sph_kernels::{SphSpikyKernel3, SphStdKernel3};
pub use sph_solver::SphSolver3;

/// Standard gravitational acceleration (negative Y).
pub const GRAVITY: f32 = -9.8;
/// Density of water in kg/m^3.
pub const WATER_DENSITY: f32 = 1000.0;
