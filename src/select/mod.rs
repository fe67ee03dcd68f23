//! Level-of-detail vertex selection over a built octree

pub mod lod;
pub mod sequential;
pub mod parallel;
pub mod host;

pub use lod::{local_camera_position, resolve_vertices, LodQuery, SIZE_EPSILON};
pub use sequential::{LevelSnapshots, SequentialSelector};
pub use parallel::{ParallelSelector, Slot, WaveOutcome, WavefrontBackend};
pub use host::HostWavefront;
