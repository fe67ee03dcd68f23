//! Octree construction from point records

use std::collections::VecDeque;
use std::ops::Range;
use std::time::Instant;

use super::cluster;
use super::node::{NodeSummary, OctreeNode};
use super::Octree;
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::math::{child_center, octant_of, Aabb};
use crate::points::PointRecord;

/// Deepest tree the builder accepts
pub const MAX_DEPTH: u8 = 24;

/// Pending node: a contiguous range of the point permutation plus its cube
struct NodeCreationEntry {
    range: Range<usize>,
    center: Vec3,
    size: f32,
    remaining_depth: u8,
    /// (parent index, octant in parent)
    parent: Option<(u32, u8)>,
}

/// Builder for constructing octrees from unstructured points
///
/// Nodes are created breadth-first from a FIFO queue, so node indices
/// follow construction order and every child index is greater than its
/// parent's. Node 0 is the root.
pub struct OctreeBuilder {
    /// Maximum octree depth (root is depth 0)
    max_depth: u8,
}

impl OctreeBuilder {
    pub fn new(max_depth: u8) -> Self {
        Self { max_depth }
    }

    /// Build the octree. Fails on an empty point set.
    pub fn build(&self, records: &[PointRecord]) -> Result<Octree> {
        if self.max_depth > MAX_DEPTH {
            return Err(Error::InvalidDepth(self.max_depth));
        }
        let bounds = Aabb::from_points(records.iter().map(|r| r.position))
            .ok_or(Error::EmptyPointSet)?;
        if records.len() > u32::MAX as usize {
            return Err(Error::PointLoad(format!("{} points exceed u32 indexing", records.len())));
        }

        let start = Instant::now();
        let (center, size) = bounds.bounding_cube();

        // Points are never copied; each node owns a range of this permutation
        let mut order: Vec<u32> = (0..records.len() as u32).collect();
        let mut scratch = vec![0u32; records.len()];

        let mut nodes: Vec<OctreeNode> = Vec::with_capacity(records.len() / 4 + 1);
        let mut queue = VecDeque::new();
        queue.push_back(NodeCreationEntry {
            range: 0..records.len(),
            center,
            size,
            remaining_depth: self.max_depth,
            parent: None,
        });

        let mut depth_reached = 0u8;

        while let Some(entry) = queue.pop_front() {
            let index = nodes.len() as u32;
            if let Some((parent, octant)) = entry.parent {
                nodes[parent as usize].children[octant as usize] = index;
            }

            let mut summary = NodeSummary::new(entry.center, entry.size);
            cluster::summarize(records, &order[entry.range.clone()], &mut summary);
            nodes.push(OctreeNode::new(summary));
            depth_reached = depth_reached.max(self.max_depth - entry.remaining_depth);

            if entry.remaining_depth == 0 {
                continue;
            }

            let counts = partition_octants(
                records,
                &mut order[entry.range.clone()],
                &mut scratch[entry.range.clone()],
                entry.center,
            );

            // Empty octants get no child at all
            let mut first = entry.range.start;
            for (octant, &count) in counts.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                queue.push_back(NodeCreationEntry {
                    range: first..first + count,
                    center: child_center(entry.center, entry.size, octant as u8),
                    size: entry.size * 0.5,
                    remaining_depth: entry.remaining_depth - 1,
                    parent: Some((index, octant as u8)),
                });
                first += count;
            }
        }

        log::info!(
            "Built octree: {} points -> {} nodes, depth {} (limit {}) in {:.1?}",
            records.len(),
            nodes.len(),
            depth_reached,
            self.max_depth,
            start.elapsed()
        );

        Ok(Octree::from_parts(nodes, depth_reached))
    }
}

/// Stable counting sort of `members` by octant around `center`.
/// Returns the number of points per octant; `members` ends up grouped in
/// octant order.
fn partition_octants(
    records: &[PointRecord],
    members: &mut [u32],
    scratch: &mut [u32],
    center: Vec3,
) -> [usize; 8] {
    let mut counts = [0usize; 8];
    for &m in members.iter() {
        counts[octant_of(records[m as usize].position, center) as usize] += 1;
    }

    let mut offsets = [0usize; 8];
    for octant in 1..8 {
        offsets[octant] = offsets[octant - 1] + counts[octant - 1];
    }

    for &m in members.iter() {
        let octant = octant_of(records[m as usize].position, center) as usize;
        scratch[offsets[octant]] = m;
        offsets[octant] += 1;
    }
    members.copy_from_slice(scratch);

    counts
}
