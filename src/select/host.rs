//! Host emulation of the wavefront backend using rayon

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use super::lod::LodQuery;
use super::parallel::{Slot, WaveOutcome, WavefrontBackend};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::octree::Octree;

/// Fixed-capacity list with atomic append and an occupancy counter
struct AppendBuffer {
    slots: Vec<AtomicU32>,
    len: AtomicU32,
}

impl AppendBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            len: AtomicU32::new(0),
        }
    }

    fn clear(&mut self) {
        *self.len.get_mut() = 0;
    }

    /// Append `value`; appends past capacity are counted but dropped
    fn push(&self, value: u32) {
        let slot = self.len.fetch_add(1, Ordering::Relaxed) as usize;
        if let Some(target) = self.slots.get(slot) {
            target.store(value, Ordering::Relaxed);
        }
    }

    fn get(&self, index: u32) -> u32 {
        self.slots[index as usize].load(Ordering::Relaxed)
    }

    /// Number of stored entries
    fn len(&self) -> u32 {
        self.requested().min(self.slots.len() as u32)
    }

    /// Number of appends attempted, including dropped ones
    fn requested(&self) -> u32 {
        self.len.load(Ordering::Acquire)
    }

    fn overflowed(&self) -> bool {
        self.requested() as usize > self.slots.len()
    }

    fn to_vec(&self) -> Vec<u32> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

/// Worklists in host memory, one rayon task per pending entry.
///
/// The end of each wave's `par_iter` is the barrier between levels.
pub struct HostWavefront<'a> {
    octree: &'a Octree,
    pending: [AppendBuffer; 2],
    vertices: AppendBuffer,
}

impl<'a> HostWavefront<'a> {
    pub fn new(octree: &'a Octree) -> Self {
        let capacity = octree.node_count();
        Self {
            octree,
            pending: [
                AppendBuffer::with_capacity(capacity),
                AppendBuffer::with_capacity(capacity),
            ],
            vertices: AppendBuffer::with_capacity(capacity),
        }
    }
}

impl WavefrontBackend for HostWavefront<'_> {
    fn reset(&mut self, slot: Slot) -> Result<()> {
        for list in &mut self.pending {
            list.clear();
        }
        self.vertices.clear();
        self.pending[slot.index()].push(0);
        Ok(())
    }

    fn run_wave(&mut self, query: &LodQuery, input: Slot, pending: u32) -> Result<WaveOutcome> {
        let [a, b] = &mut self.pending;
        let (input, output) = match input {
            Slot::A => (&*a, b),
            Slot::B => (&*b, a),
        };
        output.clear();
        let output: &AppendBuffer = output;

        let octree = self.octree;
        let vertices = &self.vertices;
        let pending = pending.min(input.len());

        (0..pending).into_par_iter().for_each(|i| {
            let index = input.get(i);
            let node = octree.node(index);
            if query.should_emit(node) {
                vertices.push(index);
            } else {
                for child in node.present_children() {
                    output.push(child);
                }
            }
        });

        // Each node is reachable from one parent only, so a valid tree never fills a list
        if output.overflowed() || vertices.overflowed() {
            return Err(Error::CorruptTree(format!(
                "worklist overflow: {} pending, {} vertices for {} nodes",
                output.requested(),
                vertices.requested(),
                octree.node_count()
            )));
        }

        Ok(WaveOutcome {
            pending: output.len(),
            vertices: vertices.len(),
        })
    }

    fn read_vertex_indices(&mut self) -> Result<Vec<u32>> {
        Ok(self.vertices.to_vec())
    }
}
