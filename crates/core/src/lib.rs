//! Core data structures for grid/particle fluid simulation.
//!
//! This crate holds everything the solvers share: flat dense arrays with
//! value-preserving resize, borrowed array views, a thread-pool fan-out
//! substrate, bounding boxes with slab-test ray intersection, field traits,
//! a parallel hash-grid point searcher, and a generic octree.

pub mod array1;
pub mod array2;
pub mod array3;
pub mod array_utils;
pub mod bounding_box2;
pub mod bounding_box3;
pub mod field;
pub mod octree;
pub mod parallel;
pub mod ray;
pub mod search;
pub mod size;
pub mod view;

pub use array1::Array1;
pub use array2::Array2;
pub use array3::Array3;
pub use array_utils::extrapolate_to_region;
pub use bounding_box2::{BoundingBox2, BoundingBoxRayIntersection2};
pub use bounding_box3::{BoundingBox3, BoundingBoxRayIntersection3};
pub use field::{
    is_inside_sdf, ConstantScalarField2, ConstantScalarField3, ConstantVectorField2,
    ConstantVectorField3, ScalarField2, ScalarField3, VectorField2, VectorField3,
};
pub use glam::{Vec2, Vec3};
pub use octree::{ClosestIntersectionQueryResult, NearestNeighborQueryResult, Octree};
pub use parallel::ExecutionPolicy;
pub use ray::{Ray2, Ray3};
pub use search::PointParallelHashGridSearcher3;
pub use size::{Size2, Size3};
pub use view::{ArrayView1, ArrayView2, ArrayView3, ArrayViewMut1, ArrayViewMut2, ArrayViewMut3};
