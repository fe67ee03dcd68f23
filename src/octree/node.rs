//! Octree node records

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;
use crate::math::encoding::{self, PolarNormal};

/// Maximum number of normal/color clusters per node
pub const MAX_CLUSTERS: usize = 6;

/// Child slot sentinel
pub const NO_CHILD: u32 = u32::MAX;

/// Drawable node summary ("node vertex") - exactly 48 bytes
///
/// Layout:
/// - position (12 bytes): cube center in local space
/// - size (4 bytes): cube edge length
/// - normals (12 bytes): 6 polar-encoded cluster normals
/// - colors (12 bytes): 6 RGB565 cluster colors
/// - weights (4 bytes): 6 x 5-bit cluster weights
/// - point_count (4 bytes): number of input points inside the cube
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NodeSummary {
    pub position: [f32; 3],
    pub size: f32,
    pub normals: [PolarNormal; MAX_CLUSTERS],
    pub colors: [u16; MAX_CLUSTERS],
    pub weights: u32,
    pub point_count: u32,
}

impl NodeSummary {
    /// Summary of an empty cube
    pub fn new(position: Vec3, size: f32) -> Self {
        Self {
            position: position.to_array(),
            size,
            ..Default::default()
        }
    }

    pub fn center(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Weight of a cluster slot in [0, 1]; unused slots report 0
    pub fn cluster_weight(&self, slot: usize) -> f32 {
        encoding::weight_fraction(self.weights, slot)
    }

    /// Decoded normal of a cluster slot (meaningless when its weight is 0)
    pub fn cluster_normal(&self, slot: usize) -> Vec3 {
        self.normals[slot].decode()
    }

    /// Decoded RGB color of a cluster slot
    pub fn cluster_color(&self, slot: usize) -> (u8, u8, u8) {
        encoding::rgb565_to_rgb(self.colors[slot])
    }

    /// Number of slots with non-zero weight
    pub fn active_clusters(&self) -> usize {
        (0..MAX_CLUSTERS)
            .filter(|&slot| encoding::unpack_weight(self.weights, slot) > 0)
            .count()
    }
}

/// Octree node - exactly 80 bytes
///
/// Node summary followed by 8 child indices into the flat node array.
/// Child `i` covers octant `i` (bit 0=+x, bit 1=+y, bit 2=+z); absent
/// children hold [`NO_CHILD`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct OctreeNode {
    pub summary: NodeSummary,
    pub children: [u32; 8],
}

impl OctreeNode {
    /// Create a childless node
    pub fn new(summary: NodeSummary) -> Self {
        Self {
            summary,
            children: [NO_CHILD; 8],
        }
    }

    /// Child index in octant, if present
    pub fn child(&self, octant: u8) -> Option<u32> {
        debug_assert!(octant < 8);
        let child = self.children[octant as usize];
        (child != NO_CHILD).then_some(child)
    }

    /// Iterate present child indices in octant order
    pub fn present_children(&self) -> impl Iterator<Item = u32> + '_ {
        self.children.iter().copied().filter(|&c| c != NO_CHILD)
    }

    /// Bitmask of present children
    pub fn child_mask(&self) -> u8 {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != NO_CHILD)
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }

    /// Count number of present children
    pub fn child_count(&self) -> u8 {
        self.child_mask().count_ones() as u8
    }

    /// A node is a leaf iff none of its child slots is present
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|&c| c == NO_CHILD)
    }
}

impl Default for OctreeNode {
    fn default() -> Self {
        Self::new(NodeSummary::default())
    }
}
