//! Point cloud octree: construction, node summaries and the binary cache

pub mod node;
pub mod cluster;
pub mod builder;
pub mod octree;
pub mod cache;

pub use node::{NodeSummary, OctreeNode, MAX_CLUSTERS, NO_CHILD};
pub use octree::Octree;
pub use builder::{OctreeBuilder, MAX_DEPTH};
pub use cache::OctreeCache;
