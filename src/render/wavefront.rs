//! wgpu compute backend for the parallel selector

use bytemuck::{Pod, Zeroable};

use super::context::GpuContext;
use super::octree_buffer::OctreeBuffer;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::octree::Octree;
use crate::select::{LodQuery, Slot, WaveOutcome, WavefrontBackend};

/// Must match `@workgroup_size` in octree_wavefront.wgsl
pub const WORKGROUP_SIZE: u32 = 64;

const U32_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Per-wave uniform (32 bytes, matches `WaveParams` in WGSL)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct WaveParams {
    pub camera: [f32; 3],
    pub splat_size: f32,
    pub fov_scale: f32,
    pub pending: u32,
    pub _pad: [u32; 2],
}

impl WaveParams {
    pub fn new(query: &LodQuery, pending: u32) -> Self {
        Self {
            camera: query.camera.to_array(),
            splat_size: query.splat_size,
            fov_scale: query.fov_scale,
            pending,
            _pad: [0; 2],
        }
    }
}

/// GPU-resident worklists and the traversal kernel.
///
/// Pending lists A/B and the vertex list each hold up to `node_count`
/// indices. After a traversal the vertex list is usable directly as the
/// draw list (indices into [`node_buffer`](Self::node_buffer)).
pub struct GpuWavefront {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    octree_buffer: OctreeBuffer,
    /// Pending worklists, indexed by `Slot::index`
    pending_lists: [wgpu::Buffer; 2],
    /// Occupancy counters for the pending worklists
    pending_counters: [wgpu::Buffer; 2],
    vertex_list: wgpu::Buffer,
    vertex_counter: wgpu::Buffer,
    /// [output pending count, vertex count]
    counter_staging: wgpu::Buffer,
    vertex_staging: wgpu::Buffer,
    /// Bind group per input slot (A->B, B->A)
    bind_groups: [wgpu::BindGroup; 2],
    capacity: u32,
    vertex_count: u32,
}

impl GpuWavefront {
    pub fn new(context: &GpuContext, octree: &Octree) -> Result<Self> {
        let device = &context.device;
        let octree_buffer = OctreeBuffer::new(device, &context.queue, octree)?;
        let capacity = octree_buffer.node_count();

        let list_size = capacity as u64 * U32_SIZE;
        if list_size > context.max_storage_binding() {
            return Err(Error::Gpu(format!(
                "worklist of {} entries exceeds storage binding limit",
                capacity
            )));
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("octree_wavefront_shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../shaders/octree_wavefront.wgsl").into(),
            ),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wave_params"),
            size: std::mem::size_of::<WaveParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let list = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: list_size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let counter = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: U32_SIZE,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let pending_lists = [list("pending_list_a"), list("pending_list_b")];
        let pending_counters = [counter("pending_counter_a"), counter("pending_counter_b")];
        let vertex_list = list("vertex_list");
        let vertex_counter = counter("vertex_counter");

        let counter_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wave_counter_staging"),
            size: 2 * U32_SIZE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let vertex_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vertex_list_staging"),
            size: list_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("octree_wavefront_layout"),
            entries: &[
                // Wave params
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),  // nodes
                storage(2, true),  // input pending list
                storage(3, false), // output pending list
                storage(4, false), // output pending counter
                storage(5, false), // vertex list
                storage(6, false), // vertex counter
            ],
        });

        let wave_bind_group = |input: Slot| {
            let output = input.other();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(match input {
                    Slot::A => "octree_wave_a_to_b",
                    Slot::B => "octree_wave_b_to_a",
                }),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: octree_buffer.node_buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: pending_lists[input.index()].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: pending_lists[output.index()].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: pending_counters[output.index()].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: vertex_list.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: vertex_counter.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [wave_bind_group(Slot::A), wave_bind_group(Slot::B)];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("octree_wavefront_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("octree_wavefront_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            pipeline,
            params_buffer,
            octree_buffer,
            pending_lists,
            pending_counters,
            vertex_list,
            vertex_counter,
            counter_staging,
            vertex_staging,
            bind_groups,
            capacity,
            vertex_count: 0,
        })
    }

    /// Node storage buffer the vertex indices refer to
    pub fn node_buffer(&self) -> &wgpu::Buffer {
        self.octree_buffer.node_buffer()
    }

    /// Emitted node indices; the first `vertex_count()` entries are valid
    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_list
    }

    /// Vertex count read back after the last wave
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Workgroup grid for `pending` items, folded into 2D past the per-dimension limit
    fn workgroup_grid(&self, pending: u32) -> (u32, u32) {
        let groups = pending.div_ceil(WORKGROUP_SIZE);
        if groups == 0 {
            return (0, 0);
        }
        let max_x = self.device.limits().max_compute_workgroups_per_dimension.max(1);
        let x = groups.min(max_x);
        (x, groups.div_ceil(x))
    }

    /// Map the first `bytes` of a staging buffer and copy them out.
    /// Blocks until the GPU has finished all submitted work.
    fn read_staging(&self, buffer: &wgpu::Buffer, bytes: u64) -> Result<Vec<u32>> {
        let slice = buffer.slice(..bytes);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::Gpu(format!("device poll failed: {}", e)))?;

        rx.recv()
            .map_err(|e| Error::Gpu(format!("readback channel closed: {}", e)))?
            .map_err(|e| Error::Gpu(format!("buffer map failed: {}", e)))?;

        let values = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&data).to_vec()
        };
        buffer.unmap();
        Ok(values)
    }
}

impl WavefrontBackend for GpuWavefront {
    fn reset(&mut self, slot: Slot) -> Result<()> {
        self.vertex_count = 0;
        self.queue.write_buffer(&self.pending_lists[slot.index()], 0, bytemuck::bytes_of(&0u32));
        self.queue.write_buffer(&self.pending_counters[slot.index()], 0, bytemuck::bytes_of(&1u32));
        self.queue.write_buffer(&self.pending_counters[slot.other().index()], 0, bytemuck::bytes_of(&0u32));
        self.queue.write_buffer(&self.vertex_counter, 0, bytemuck::bytes_of(&0u32));
        Ok(())
    }

    fn run_wave(
        &mut self,
        query: &LodQuery,
        input: Slot,
        pending: u32,
    ) -> Result<WaveOutcome> {
        let pending = pending.min(self.capacity);
        let output = input.other();
        self.queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::bytes_of(&WaveParams::new(query, pending)),
        );

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("octree_wave_encoder"),
        });
        encoder.clear_buffer(&self.pending_counters[output.index()], 0, None);

        let (x, y) = self.workgroup_grid(pending);
        if x > 0 {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("octree_wave_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[input.index()], &[]);
            pass.dispatch_workgroups(x, y, 1);
        }

        encoder.copy_buffer_to_buffer(
            &self.pending_counters[output.index()],
            0,
            &self.counter_staging,
            0,
            U32_SIZE,
        );
        encoder.copy_buffer_to_buffer(&self.vertex_counter, 0, &self.counter_staging, U32_SIZE, U32_SIZE);
        self.queue.submit(Some(encoder.finish()));

        let counters = self.read_staging(&self.counter_staging, 2 * U32_SIZE)?;
        if counters[0] > self.capacity || counters[1] > self.capacity {
            return Err(Error::CorruptTree(format!(
                "worklist overflow: {} pending, {} vertices for {} nodes",
                counters[0], counters[1], self.capacity
            )));
        }
        let outcome = WaveOutcome {
            pending: counters[0].min(self.capacity),
            vertices: counters[1].min(self.capacity),
        };
        self.vertex_count = outcome.vertices;
        Ok(outcome)
    }

    fn read_vertex_indices(&mut self) -> Result<Vec<u32>> {
        if self.vertex_count == 0 {
            return Ok(Vec::new());
        }
        let bytes = self.vertex_count as u64 * U32_SIZE;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("vertex_readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.vertex_list, 0, &self.vertex_staging, 0, bytes);
        self.queue.submit(Some(encoder.finish()));

        self.read_staging(&self.vertex_staging, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::points::sphere_cloud;
    use crate::select::{ParallelSelector, SequentialSelector};

    #[test]
    fn test_wave_params_layout() {
        assert_eq!(std::mem::size_of::<WaveParams>(), 32);
    }

    #[test]
    fn test_gpu_matches_sequential() {
        let context = match GpuContext::new_headless_blocking() {
            Ok(context) => context,
            Err(e) => {
                eprintln!("Skipping GPU wavefront test: {}", e);
                return;
            }
        };

        let octree = Octree::build(&sphere_cloud(4000, 2.0), 6).unwrap();
        let backend = GpuWavefront::new(&context, &octree).unwrap();
        let mut parallel = ParallelSelector::new(backend, &octree);
        let sequential = SequentialSelector::new(&octree);

        for splat_size in [0.0, 0.01, 100.0] {
            let query = LodQuery { camera: Vec3::new(0.0, 0.0, 6.0), splat_size, fov_scale: 0.828 };
            let mut expected = sequential.select_indices(&query);
            expected.sort_unstable();

            let count = parallel.select(&query);
            let mut actual = parallel.vertex_indices().unwrap();
            actual.sort_unstable();

            assert_eq!(count as usize, expected.len());
            assert_eq!(actual, expected);
        }
    }
}
