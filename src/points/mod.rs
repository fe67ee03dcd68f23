//! Point records and point sources
//!
//! Parsing of raw scan formats lives behind the [`PointSource`] trait; the
//! octree only ever sees an array of [`PointRecord`].

pub mod ply;

use std::path::Path;

use crate::core::types::{Result, Vec3};
use crate::math::Aabb;

pub use ply::PlyPointSource;

/// A single input point. Immutable once loaded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointRecord {
    pub position: Vec3,
    /// Unit surface normal
    pub normal: Vec3,
    pub color: [u8; 3],
}

impl PointRecord {
    pub fn new(position: Vec3, normal: Vec3, color: [u8; 3]) -> Self {
        Self { position, normal, color }
    }
}

impl Default for PointRecord {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            color: [0; 3],
        }
    }
}

/// Loaded point set together with its bounds
#[derive(Clone, Debug)]
pub struct PointCloud {
    pub records: Vec<PointRecord>,
    pub bounds: Aabb,
}

impl PointCloud {
    /// Wrap records, computing the bounding box. Empty input yields a zero box.
    pub fn from_records(records: Vec<PointRecord>) -> Self {
        let bounds = Aabb::from_points(records.iter().map(|r| r.position)).unwrap_or_default();
        Self { records, bounds }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Anything able to turn a file into point records
pub trait PointSource {
    /// Load all points of `path`, failing with `Error::PointLoad` on bad input.
    fn load_points(&self, path: &Path) -> Result<PointCloud>;
}

/// Deterministic sphere surface cloud (Fibonacci lattice) with outward normals
/// and position-derived colors. Used by tests and benchmarks.
pub fn sphere_cloud(count: usize, radius: f32) -> Vec<PointRecord> {
    let golden = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    (0..count)
        .map(|i| {
            let y = if count > 1 {
                1.0 - 2.0 * i as f32 / (count - 1) as f32
            } else {
                0.0
            };
            let r = (1.0 - y * y).max(0.0).sqrt();
            let theta = golden * i as f32;
            let normal = Vec3::new(theta.cos() * r, y, theta.sin() * r);
            let color = [
                ((normal.x * 0.5 + 0.5) * 255.0) as u8,
                ((normal.y * 0.5 + 0.5) * 255.0) as u8,
                ((normal.z * 0.5 + 0.5) * 255.0) as u8,
            ];
            PointRecord::new(normal * radius, normal, color)
        })
        .collect()
}
