//! Distance-based level-of-detail test shared by all selectors

use crate::core::config::ViewSettings;
use crate::core::types::{Mat4, Vec3};
use crate::octree::{NodeSummary, Octree, OctreeNode};

/// Stored node sizes below this are treated as zero when emitting vertices
pub const SIZE_EPSILON: f32 = 1e-6;

/// One frame's LOD parameters, all in the octree's local space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodQuery {
    /// Camera position in local space
    pub camera: Vec3,
    /// Desired splat size as a fraction of the screen height
    pub splat_size: f32,
    /// `2 * tan(fov_y / 2)`
    pub fov_scale: f32,
}

impl LodQuery {
    pub fn new(camera: Vec3, view: &ViewSettings) -> Self {
        Self {
            camera,
            splat_size: view.splat_size(),
            fov_scale: view.fov_scale(),
        }
    }

    /// Same view, different splat size
    pub fn with_splat_size(mut self, splat_size: f32) -> Self {
        self.splat_size = splat_size;
        self
    }

    /// Local-space size a splat of the desired screen size covers at `center`
    #[inline]
    pub fn required_size(&self, center: Vec3) -> f32 {
        self.splat_size * self.fov_scale * self.camera.distance(center)
    }

    /// Emit the node as a splat (true) or descend into its children (false)
    #[inline]
    pub fn should_emit(&self, node: &OctreeNode) -> bool {
        node.is_leaf() || node.summary.size < self.required_size(node.summary.center())
    }

    /// Summary to hand to the renderer for an emitted node.
    /// Degenerate cubes take the required size so they still rasterize.
    pub fn emitted_summary(&self, node: &OctreeNode) -> NodeSummary {
        let mut summary = node.summary;
        if summary.size < SIZE_EPSILON {
            summary.size = self.required_size(summary.center());
        }
        summary
    }
}

/// Camera position expressed in the octree's local space
pub fn local_camera_position(world: &Mat4, camera_world: Vec3) -> Vec3 {
    world.inverse().transform_point3(camera_world)
}

/// Turn emitted node indices into drawable summaries
pub fn resolve_vertices(octree: &Octree, query: &LodQuery, indices: &[u32]) -> Vec<NodeSummary> {
    indices
        .iter()
        .map(|&index| query.emitted_summary(octree.node(index)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::NO_CHILD;

    fn query(camera: Vec3, splat_size: f32) -> LodQuery {
        LodQuery { camera, splat_size, fov_scale: 1.0 }
    }

    #[test]
    fn test_from_view_settings() {
        let view = ViewSettings::default();
        let q = LodQuery::new(Vec3::ZERO, &view);
        assert!((q.splat_size - 0.01).abs() < 1e-6);
        assert!((q.fov_scale - 2.0 * (std::f32::consts::FRAC_PI_8).tan()).abs() < 1e-6);
    }

    #[test]
    fn test_required_size_grows_with_distance() {
        let q = query(Vec3::ZERO, 0.5);
        assert_eq!(q.required_size(Vec3::ZERO), 0.0);
        assert!((q.required_size(Vec3::new(0.0, 0.0, 4.0)) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_should_emit() {
        let mut node = OctreeNode::new(NodeSummary::new(Vec3::new(10.0, 0.0, 0.0), 1.0));
        node.children[0] = 1;

        assert!(query(Vec3::ZERO, 0.5).should_emit(&node)); // required 5.0
        assert!(!query(Vec3::ZERO, 0.05).should_emit(&node)); // required 0.5
        // Equal size does not emit
        assert!(!query(Vec3::ZERO, 0.1).should_emit(&node));

        node.children[0] = NO_CHILD;
        assert!(query(Vec3::new(10.0, 0.0, 0.0), 0.0).should_emit(&node));
    }

    #[test]
    fn test_zero_size_substitution() {
        let node = OctreeNode::new(NodeSummary::new(Vec3::new(0.0, 3.0, 0.0), 0.0));
        let q = query(Vec3::ZERO, 0.1);
        assert!((q.emitted_summary(&node).size - 0.3).abs() < 1e-6);

        let sized = OctreeNode::new(NodeSummary::new(Vec3::ZERO, 0.25));
        assert_eq!(q.emitted_summary(&sized).size, 0.25);
    }

    #[test]
    fn test_local_camera_position() {
        let world = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::IDENTITY,
            Vec3::new(10.0, 0.0, 0.0),
        );
        let local = local_camera_position(&world, Vec3::new(14.0, 2.0, 0.0));
        assert!(local.distance(Vec3::new(2.0, 1.0, 0.0)) < 1e-5);
    }
}
