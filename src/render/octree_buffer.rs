//! GPU storage buffer for the octree node array

use crate::core::error::Error;
use crate::octree::{Octree, OctreeNode};

/// Read-only node array resident on the GPU.
///
/// Records keep the 80-byte `OctreeNode` layout; `Node` in
/// octree_wavefront.wgsl must match it.
pub struct OctreeBuffer {
    node_buffer: wgpu::Buffer,
    node_count: u32,
}

impl OctreeBuffer {
    /// Upload all nodes of `octree`
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, octree: &Octree) -> Result<Self, Error> {
        let size = octree.memory_usage() as u64;
        let limits = device.limits();
        let max_binding = limits.max_storage_buffer_binding_size as u64;
        if size > max_binding || size > limits.max_buffer_size {
            return Err(Error::Gpu(format!(
                "octree of {} nodes ({}MB) exceeds storage binding limit ({}MB)",
                octree.node_count(),
                size / 1024 / 1024,
                max_binding / 1024 / 1024
            )));
        }

        let node_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("octree_nodes"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&node_buffer, 0, bytemuck::cast_slice::<OctreeNode, u8>(octree.nodes()));

        log::info!(
            "Uploaded {} octree nodes ({:.1}MB)",
            octree.node_count(),
            size as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            node_buffer,
            node_count: octree.node_count() as u32,
        })
    }

    /// Get node buffer
    pub fn node_buffer(&self) -> &wgpu::Buffer {
        &self.node_buffer
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }
}
