//! Flat-array octree container

use std::path::Path;

use super::builder::{OctreeBuilder, MAX_DEPTH};
use super::cache::OctreeCache;
use super::node::OctreeNode;
use crate::core::config::BuildConfig;
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::math::octant_of;
use crate::points::{PointRecord, PointSource};

/// Point cloud octree stored as a flat node array (root is at index 0)
///
/// Immutable after construction or load; both selectors read it
/// concurrently without synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    /// Deepest level present (root = 0)
    depth: u8,
}

impl Octree {
    /// Build from points with the given depth limit
    pub fn build(records: &[PointRecord], max_depth: u8) -> Result<Self> {
        OctreeBuilder::new(max_depth).build(records)
    }

    pub(crate) fn from_parts(nodes: Vec<OctreeNode>, depth: u8) -> Self {
        Self { nodes, depth }
    }

    /// Adopt a node array produced elsewhere (e.g. a cache file).
    ///
    /// Only the index structure is checked: every child index must point
    /// forward and stay in bounds, which also rules out cycles, and every
    /// node except the root must have exactly one parent. Summaries are
    /// taken as-is.
    pub fn from_nodes(nodes: Vec<OctreeNode>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::CorruptTree("node array is empty".into()));
        }

        let mut levels = vec![0u8; nodes.len()];
        let mut claimed = vec![false; nodes.len()];
        let mut depth = 0u8;

        for (index, node) in nodes.iter().enumerate() {
            for child in node.present_children() {
                let child = child as usize;
                if child <= index || child >= nodes.len() {
                    return Err(Error::CorruptTree(format!(
                        "node {} references child {} (node count {})",
                        index,
                        child,
                        nodes.len()
                    )));
                }
                if std::mem::replace(&mut claimed[child], true) {
                    return Err(Error::CorruptTree(format!(
                        "node {} is referenced by more than one child slot",
                        child
                    )));
                }
                let level = levels[index] + 1;
                if level > MAX_DEPTH {
                    return Err(Error::CorruptTree(format!("depth exceeds {}", MAX_DEPTH)));
                }
                levels[child] = level;
                depth = depth.max(level);
            }
        }

        if let Some(orphan) = claimed.iter().skip(1).position(|&c| !c) {
            return Err(Error::CorruptTree(format!("node {} has no parent", orphan + 1)));
        }

        Ok(Self { nodes, depth })
    }

    /// Load the octree for `source_path` from the cache, or build it from the
    /// point source and store a fresh cache file.
    ///
    /// Cache failures are never fatal: unreadable caches fall back to a
    /// rebuild, unwritable ones are skipped.
    pub fn open(source_path: &Path, config: &BuildConfig, source: &dyn PointSource) -> Result<Self> {
        let cache = OctreeCache::new(&config.cache_dir, config.max_depth);

        match cache.load(source_path) {
            Ok(Some(octree)) => return Ok(octree),
            Ok(None) => log::info!("No octree cache for {}", source_path.display()),
            Err(e) => log::warn!("Ignoring unreadable octree cache: {}", e),
        }

        let cloud = source.load_points(source_path)?;
        let octree = Octree::build(&cloud.records, config.max_depth)?;

        if let Err(e) = cache.store(source_path, &octree) {
            log::warn!("Could not write octree cache: {}", e);
        }

        Ok(octree)
    }

    /// Get root node
    pub fn root(&self) -> &OctreeNode {
        &self.nodes[0]
    }

    /// Get node by index
    pub fn node(&self, index: u32) -> &OctreeNode {
        &self.nodes[index as usize]
    }

    /// Get all nodes as slice (for GPU upload and caching)
    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    /// Get number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Deepest level present in the tree (root = 0)
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of levels, i.e. the number of waves a level-synchronous
    /// traversal needs at most
    pub fn level_count(&self) -> u32 {
        self.depth as u32 + 1
    }

    /// Root cube center and edge length
    pub fn bounding_cube(&self) -> (Vec3, f32) {
        let root = &self.root().summary;
        (root.center(), root.size)
    }

    /// Calculate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<OctreeNode>() * self.nodes.len()
    }

    /// Leaf reached by descending toward `position` with the construction
    /// octant rule. `None` if the path hits an absent child.
    pub fn locate_leaf(&self, position: Vec3) -> Option<u32> {
        let mut index = 0u32;
        loop {
            let node = self.nodes.get(index as usize)?;
            if node.is_leaf() {
                return Some(index);
            }
            index = node.child(octant_of(position, node.summary.center()))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::node::{NodeSummary, NO_CHILD};
    use crate::points::{sphere_cloud, PointCloud};

    struct CountingSource {
        points: Vec<PointRecord>,
        loads: std::cell::Cell<usize>,
    }

    impl PointSource for CountingSource {
        fn load_points(&self, _path: &Path) -> Result<PointCloud> {
            self.loads.set(self.loads.get() + 1);
            Ok(PointCloud::from_records(self.points.clone()))
        }
    }

    #[test]
    fn test_from_nodes_recomputes_depth() {
        let built = Octree::build(&sphere_cloud(800, 1.0), 4).unwrap();
        let adopted = Octree::from_nodes(built.nodes().to_vec()).unwrap();
        assert_eq!(adopted, built);
        assert_eq!(adopted.depth(), 4);
        assert_eq!(adopted.level_count(), 5);
    }

    #[test]
    fn test_from_nodes_rejects_bad_indices() {
        assert!(matches!(Octree::from_nodes(Vec::new()), Err(Error::CorruptTree(_))));

        let mut root = OctreeNode::new(NodeSummary::new(Vec3::ZERO, 1.0));
        root.children[2] = 5;
        let nodes = vec![root, OctreeNode::default()];
        assert!(matches!(Octree::from_nodes(nodes), Err(Error::CorruptTree(_))));

        // Self reference would make traversal loop forever
        let mut looping = OctreeNode::default();
        looping.children[0] = 0;
        assert!(matches!(Octree::from_nodes(vec![looping]), Err(Error::CorruptTree(_))));
    }

    #[test]
    fn test_from_nodes_rejects_shared_children() {
        let leaf = OctreeNode::new(NodeSummary::new(Vec3::splat(0.25), 0.5));

        // Two slots of one parent naming the same node
        let mut root = OctreeNode::new(NodeSummary::new(Vec3::ZERO, 1.0));
        root.children = [1; 8];
        assert!(matches!(Octree::from_nodes(vec![root, leaf]), Err(Error::CorruptTree(_))));

        // Two parents naming the same node
        let mut root = OctreeNode::new(NodeSummary::new(Vec3::ZERO, 1.0));
        root.children[0] = 1;
        root.children[7] = 2;
        let mut left = leaf;
        left.children[3] = 3;
        let mut right = leaf;
        right.children[4] = 3;
        let nodes = vec![root, left, right, leaf];
        assert!(matches!(Octree::from_nodes(nodes), Err(Error::CorruptTree(_))));
    }

    #[test]
    fn test_from_nodes_rejects_orphans() {
        let mut root = OctreeNode::new(NodeSummary::new(Vec3::ZERO, 1.0));
        root.children[0] = 2;
        let nodes = vec![root, OctreeNode::default(), OctreeNode::default()];
        assert!(matches!(Octree::from_nodes(nodes), Err(Error::CorruptTree(_))));
    }

    #[test]
    fn test_bounding_cube_and_stats() {
        let octree = Octree::build(&sphere_cloud(500, 2.0), 3).unwrap();
        let (center, size) = octree.bounding_cube();
        assert!(center.length() < 0.1);
        assert!((size - 4.0).abs() < 0.1);
        assert!(octree.leaf_count() > 0);
        assert!(octree.leaf_count() < octree.node_count());
        assert_eq!(octree.memory_usage(), octree.node_count() * 80);
    }

    #[test]
    fn test_locate_leaf_outside_data() {
        let points = vec![
            PointRecord::new(Vec3::ZERO, Vec3::Z, [0; 3]),
            PointRecord::new(Vec3::ONE, Vec3::Z, [0; 3]),
        ];
        let octree = Octree::build(&points, 2).unwrap();
        assert!(octree.locate_leaf(Vec3::ONE).is_some());
        // Octant (+x, -y, -z) of the root never received a point
        assert_eq!(octree.root().children[1], NO_CHILD);
        assert!(octree.locate_leaf(Vec3::new(1.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_open_builds_then_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            max_depth: 3,
            cache_dir: dir.path().join("cache"),
        };
        let source = CountingSource {
            points: sphere_cloud(400, 1.0),
            loads: std::cell::Cell::new(0),
        };
        let path = Path::new("scans/bunny.ply");

        let first = Octree::open(path, &config, &source).unwrap();
        assert_eq!(source.loads.get(), 1);

        let second = Octree::open(path, &config, &source).unwrap();
        assert_eq!(source.loads.get(), 1, "second open must hit the cache");
        assert_eq!(first, second);
    }

    #[test]
    fn test_open_rebuilds_on_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            max_depth: 2,
            cache_dir: dir.path().to_path_buf(),
        };
        let source = CountingSource {
            points: sphere_cloud(100, 1.0),
            loads: std::cell::Cell::new(0),
        };
        let path = Path::new("scan.ply");

        let cache = OctreeCache::new(&config.cache_dir, config.max_depth);
        std::fs::write(cache.path_for(path), [1u8, 2, 3]).unwrap();

        let octree = Octree::open(path, &config, &source).unwrap();
        assert_eq!(source.loads.get(), 1);
        assert_eq!(octree.root().summary.point_count, 100);
    }
}
