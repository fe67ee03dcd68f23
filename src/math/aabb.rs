//! Axis-aligned bounding box and octant helpers

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight box around a set of positions, `None` when empty
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in iter {
            aabb.expand(p);
        }
        Some(aabb)
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Uniform cube sharing this box's center, edge = largest extent.
    /// Returns (center, edge length).
    pub fn bounding_cube(&self) -> (Vec3, f32) {
        (self.center(), self.size().max_element())
    }
}

/// Octant of `point` relative to `center`: bit 0=+x, bit 1=+y, bit 2=+z.
/// Coordinates equal to the center go to the positive side.
#[inline]
pub fn octant_of(point: Vec3, center: Vec3) -> u8 {
    (if point.x >= center.x { 1 } else { 0 })
        | (if point.y >= center.y { 2 } else { 0 })
        | (if point.z >= center.z { 4 } else { 0 })
}

/// Center of child `octant` of a cube with the given center and edge length
#[inline]
pub fn child_center(center: Vec3, size: f32, octant: u8) -> Vec3 {
    let quarter = size * 0.25;
    center
        + Vec3::new(
            if octant & 1 != 0 { quarter } else { -quarter },
            if octant & 2 != 0 { quarter } else { -quarter },
            if octant & 4 != 0 { quarter } else { -quarter },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
    }

    #[test]
    fn test_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());

        let aabb = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.0),
            Vec3::new(-1.0, 3.0, 0.5),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
    }

    #[test]
    fn test_bounding_cube_uses_largest_extent() {
        let aabb = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 1.0, 2.0));
        let (center, size) = aabb.bounding_cube();
        assert_eq!(center, Vec3::new(2.0, 0.5, 1.0));
        assert_eq!(size, 4.0);
    }

    #[test]
    fn test_octant_tie_goes_positive() {
        assert_eq!(octant_of(Vec3::ZERO, Vec3::ZERO), 7);
        assert_eq!(octant_of(Vec3::splat(-1.0), Vec3::ZERO), 0);
        assert_eq!(octant_of(Vec3::new(1.0, -1.0, 0.0), Vec3::ZERO), 0b101);
    }

    #[test]
    fn test_child_center() {
        let c = child_center(Vec3::ZERO, 2.0, 0);
        assert_eq!(c, Vec3::splat(-0.5));
        let c = child_center(Vec3::ZERO, 2.0, 7);
        assert_eq!(c, Vec3::splat(0.5));
        // Child center must classify back into the same octant
        for octant in 0..8u8 {
            assert_eq!(octant_of(child_center(Vec3::ONE, 4.0, octant), Vec3::ONE), octant);
        }
    }
}
