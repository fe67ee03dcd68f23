//! Error types for the point cloud octree

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot build an octree from an empty point set")]
    EmptyPointSet,

    #[error("max depth {0} exceeds the supported limit")]
    InvalidDepth(u8),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Point load error: {0}")]
    PointLoad(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("corrupt node array: {0}")]
    CorruptTree(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Config error: {0}")]
    Config(String),
}
