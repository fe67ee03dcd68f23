//! GPU interfaces: headless compute context and the wavefront backend

pub mod context;
pub mod octree_buffer;
pub mod wavefront;

pub use context::GpuContext;
pub use octree_buffer::OctreeBuffer;
pub use wavefront::GpuWavefront;
