//! Binary octree cache
//!
//! Layout: `[u32 node count (LE)][count x OctreeNode]`, node 0 first, in
//! construction order. Records are a verbatim dump of the Pod node array.
//! No magic number or version; the build depth is part of the file name.

use std::path::{Path, PathBuf};

use bytemuck::Zeroable;

use super::node::OctreeNode;
use super::Octree;
use crate::core::error::Error;
use crate::core::types::Result;

/// Cache file extension
pub const CACHE_EXTENSION: &str = "pcoctree";

const HEADER_SIZE: usize = std::mem::size_of::<u32>();

/// Serialize an octree into the cache blob layout
pub fn serialize_octree(octree: &Octree) -> Vec<u8> {
    let body: &[u8] = bytemuck::cast_slice(octree.nodes());
    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(&(octree.node_count() as u32).to_le_bytes());
    bytes.extend_from_slice(body);
    bytes
}

/// Deserialize a cache blob
pub fn deserialize_octree(data: &[u8]) -> Result<Octree> {
    if data.len() < HEADER_SIZE {
        return Err(Error::Cache(format!("blob too short ({} bytes)", data.len())));
    }
    let count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    let expected = count
        .checked_mul(std::mem::size_of::<OctreeNode>())
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .ok_or_else(|| Error::Cache(format!("node count {} overflows", count)))?;
    if data.len() != expected {
        return Err(Error::Cache(format!(
            "header says {} nodes ({} bytes) but blob has {} bytes",
            count,
            expected,
            data.len()
        )));
    }

    // Copy into an aligned node array; the byte slice itself may be unaligned
    let mut nodes = vec![OctreeNode::zeroed(); count];
    bytemuck::cast_slice_mut::<OctreeNode, u8>(&mut nodes).copy_from_slice(&data[HEADER_SIZE..]);

    Octree::from_nodes(nodes)
}

/// Disk cache keyed by the source dataset's file stem
#[derive(Debug, Clone)]
pub struct OctreeCache {
    dir: PathBuf,
    max_depth: u8,
}

impl OctreeCache {
    pub fn new(dir: &Path, max_depth: u8) -> Self {
        Self {
            dir: dir.to_path_buf(),
            max_depth,
        }
    }

    /// Get the cache file path for a source dataset
    pub fn path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pointcloud".to_string());
        self.dir
            .join(format!("{}_d{}.{}", stem, self.max_depth, CACHE_EXTENSION))
    }

    /// Check if a cache file exists for the source
    pub fn exists(&self, source: &Path) -> bool {
        self.path_for(source).exists()
    }

    /// Load the cached octree, `Ok(None)` when no cache exists
    pub fn load(&self, source: &Path) -> Result<Option<Octree>> {
        let path = self.path_for(source);
        if !path.exists() {
            return Ok(None);
        }

        let data = std::fs::read(&path)?;
        let octree = deserialize_octree(&data)?;
        log::info!("Loaded {} octree nodes from {}", octree.node_count(), path.display());
        Ok(Some(octree))
    }

    /// Write the octree unless a cache file already exists.
    /// Returns whether a file was written.
    pub fn store(&self, source: &Path, octree: &Octree) -> Result<bool> {
        let path = self.path_for(source);
        if path.exists() {
            log::debug!("Octree cache {} already exists, not overwriting", path.display());
            return Ok(false);
        }

        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, serialize_octree(octree))?;
        log::info!("Wrote {} octree nodes to {}", octree.node_count(), path.display());
        Ok(true)
    }

    /// Async variant of [`load`](Self::load) for callers inside a tokio runtime
    pub async fn load_async(&self, source: &Path) -> Result<Option<Octree>> {
        let path = self.path_for(source);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }

        let data = tokio::fs::read(&path).await?;
        deserialize_octree(&data).map(Some)
    }

    /// Async variant of [`store`](Self::store)
    pub async fn store_async(&self, source: &Path, octree: &Octree) -> Result<bool> {
        let path = self.path_for(source);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, serialize_octree(octree)).await?;
        Ok(true)
    }
}
