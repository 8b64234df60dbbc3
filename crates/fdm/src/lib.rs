//! Finite-difference-method linear systems and solvers.
//!
//! The systems store one matrix row per grid point with the symmetric
//! Laplacian-like stencil (center plus one off-diagonal per positive axis
//! direction). Solvers: Gauss-Seidel relaxation (natural and red-black),
//! incomplete-Cholesky-preconditioned conjugate gradient, and a V-cycle
//! multigrid that doubles as the pressure solver's acceleration structure.

pub mod blas;
pub mod cg;
pub mod gauss_seidel2;
pub mod gauss_seidel3;
pub mod iccg2;
pub mod iccg3;
pub mod mg;
pub mod mg_solver2;
pub mod mg_solver3;
pub mod mg_system2;
pub mod mg_system3;
pub mod system2;
pub mod system3;

pub use blas::Blas;
pub use cg::{pcg, Preconditioner};
pub use gauss_seidel2::FdmGaussSeidelSolver2;
pub use gauss_seidel3::FdmGaussSeidelSolver3;
pub use iccg2::FdmIccgSolver2;
pub use iccg3::FdmIccgSolver3;
pub use mg::{mg_v_cycle, MgMatrix, MgParameters, MgResult, MgVector};
pub use mg_solver2::FdmMgSolver2;
pub use mg_solver3::FdmMgSolver3;
pub use mg_system2::{FdmMgLinearSystem2, FdmMgMatrix2, FdmMgUtils2, FdmMgVector2};
pub use mg_system3::{FdmMgLinearSystem3, FdmMgMatrix3, FdmMgUtils3, FdmMgVector3};
pub use system2::{
    FdmBlas2, FdmLinearSystem2, FdmLinearSystemSolver2, FdmMatrix2, FdmMatrixRow2, FdmVector2,
};
pub use system3::{
    FdmBlas3, FdmLinearSystem3, FdmLinearSystemSolver3, FdmMatrix3, FdmMatrixRow3, FdmVector3,
};
