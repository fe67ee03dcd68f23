//! Single-threaded breadth-first selection

use std::collections::VecDeque;

use super::lod::{resolve_vertices, LodQuery};
use crate::octree::{NodeSummary, Octree};

/// Breadth-first CPU traversal of an [`Octree`].
///
/// Read-only over the node array; any number of selectors may run on the
/// same tree at once.
#[derive(Clone, Copy)]
pub struct SequentialSelector<'a> {
    octree: &'a Octree,
}

impl<'a> SequentialSelector<'a> {
    pub fn new(octree: &'a Octree) -> Self {
        Self { octree }
    }

    /// Indices of the nodes emitted by the distance-based query, in
    /// breadth-first order.
    pub fn select_indices(&self, query: &LodQuery) -> Vec<u32> {
        let mut emitted = Vec::new();
        let mut queue = VecDeque::from([0u32]);

        while let Some(index) = queue.pop_front() {
            let node = self.octree.node(index);
            if query.should_emit(node) {
                emitted.push(index);
            } else {
                queue.extend(node.present_children());
            }
        }

        emitted
    }

    /// Drawable vertices for the distance-based query
    pub fn vertices(&self, query: &LodQuery) -> Vec<NodeSummary> {
        resolve_vertices(self.octree, query, &self.select_indices(query))
    }

    /// Indices of every node exactly `level` steps below the root,
    /// ignoring distance and leaf status.
    pub fn indices_at_level(&self, level: u32) -> Vec<u32> {
        let mut emitted = Vec::new();
        let mut queue = VecDeque::from([(0u32, level)]);

        while let Some((index, remaining)) = queue.pop_front() {
            if remaining == 0 {
                emitted.push(index);
                continue;
            }
            let node = self.octree.node(index);
            queue.extend(node.present_children().map(|child| (child, remaining - 1)));
        }

        emitted
    }

    /// Stored summaries of the nodes at `level`, for fixed-resolution export
    pub fn vertices_at_level(&self, level: u32) -> Vec<NodeSummary> {
        self.indices_at_level(level)
            .into_iter()
            .map(|index| self.octree.node(index).summary)
            .collect()
    }

    /// Iterate `(level, vertices)` from the root down to the deepest level
    pub fn level_snapshots(&self) -> LevelSnapshots<'a> {
        LevelSnapshots { selector: *self, level: 0 }
    }
}

/// Iterator over per-level snapshots; ends at the first empty level
pub struct LevelSnapshots<'a> {
    selector: SequentialSelector<'a>,
    level: u32,
}

impl Iterator for LevelSnapshots<'_> {
    type Item = (u32, Vec<NodeSummary>);

    fn next(&mut self) -> Option<Self::Item> {
        let vertices = self.selector.vertices_at_level(self.level);
        if vertices.is_empty() {
            return None;
        }
        let level = self.level;
        self.level += 1;
        Some((level, vertices))
    }
}
