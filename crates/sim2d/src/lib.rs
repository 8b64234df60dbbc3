//! 2-D grid solvers: diffusion and single-phase pressure.

pub mod diffusion;
pub mod grid;
pub mod marker;
pub mod pressure;
pub mod sampler;

pub use diffusion::GridForwardEulerDiffusionSolver2;
pub use grid::{FaceCenteredGrid2, ScalarGrid2, VectorGrid2};
pub use marker::Marker;
pub use pressure::{GridSinglePhasePressureSolver2, PressureSystem2};
