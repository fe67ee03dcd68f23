//! Level-synchronous ping-pong traversal
//!
//! Two pending worklists (A and B) alternate as input and output. Each wave
//! consumes one list entirely: emitted nodes are appended to the vertex
//! list, descended nodes append their children to the other pending list.
//! The occupancy read-back at the end of a wave is the only point where the
//! host waits on the backend.

use super::lod::LodQuery;
use crate::core::types::Result;
use crate::octree::Octree;

/// One of the two pending worklists
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// Occupancy counters read back after a wave
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaveOutcome {
    /// Entries appended to the output pending list
    pub pending: u32,
    /// Total entries in the vertex list so far
    pub vertices: u32,
}

/// Storage and execution for the worklists.
///
/// Implementations own a copy (or view) of the node array and three
/// append buffers sized to the node count: two pending lists and the
/// vertex list.
pub trait WavefrontBackend {
    /// Clear every list and seed `slot` with the root index
    fn reset(&mut self, slot: Slot) -> Result<()>;

    /// Clear the output list (`input.other()`), process the first `pending`
    /// entries of `input` and read back the occupancy counters.
    fn run_wave(&mut self, query: &LodQuery, input: Slot, pending: u32) -> Result<WaveOutcome>;

    /// Emitted node indices of the last traversal, in append order
    fn read_vertex_indices(&mut self) -> Result<Vec<u32>>;
}

/// Drives a [`WavefrontBackend`] through one traversal per frame
pub struct ParallelSelector<B> {
    backend: B,
    max_waves: u32,
    vertex_count: u32,
}

impl<B: WavefrontBackend> ParallelSelector<B> {
    /// The wave count is bounded by the number of levels in `octree`
    pub fn new(backend: B, octree: &Octree) -> Self {
        Self {
            backend,
            max_waves: octree.level_count(),
            vertex_count: 0,
        }
    }

    /// Run the traversal and return the number of emitted vertices.
    /// Backend failures are logged and yield an empty frame.
    pub fn select(&mut self, query: &LodQuery) -> u32 {
        match self.try_select(query) {
            Ok(count) => count,
            Err(e) => {
                log::error!("Parallel selection failed, drawing nothing this frame: {}", e);
                self.vertex_count = 0;
                0
            }
        }
    }

    /// Run the traversal, surfacing backend failures
    pub fn try_select(&mut self, query: &LodQuery) -> Result<u32> {
        self.vertex_count = 0;
        self.backend.reset(Slot::A)?;

        let mut input = Slot::A;
        let mut pending = 1;
        let mut vertices = 0;

        for wave in 0..self.max_waves {
            let outcome = self.backend.run_wave(query, input, pending)?;
            log::debug!(
                "Wave {}: {} in, {} pending, {} vertices",
                wave,
                pending,
                outcome.pending,
                outcome.vertices
            );

            pending = outcome.pending;
            vertices = outcome.vertices;
            input = input.other();

            if pending == 0 {
                break;
            }
        }

        if pending > 0 {
            log::warn!("Wave limit {} reached with {} nodes pending", self.max_waves, pending);
        }

        self.vertex_count = vertices;
        Ok(vertices)
    }

    /// Vertex count of the last traversal
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Emitted node indices of the last traversal (order unspecified)
    pub fn vertex_indices(&mut self) -> Result<Vec<u32>> {
        if self.vertex_count == 0 {
            return Ok(Vec::new());
        }
        self.backend.read_vertex_indices()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
