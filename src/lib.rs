//! Pointlod - level-of-detail octrees for point cloud splat rendering

pub mod core;
pub mod math;
pub mod points;
pub mod octree;
pub mod select;
pub mod render;
