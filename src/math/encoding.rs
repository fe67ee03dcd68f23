//! Compact encodings used by node summaries
//!
//! - Normals: two 8-bit polar angles packed into a `u16`
//! - Colors: RGB565
//! - Cluster weights: 5 bits per cluster, six clusters per `u32`

use bytemuck::{Pod, Zeroable};
use std::f32::consts::PI;

use crate::core::types::Vec3;

/// Number of bits used for a single cluster weight
pub const WEIGHT_BITS: u32 = 5;
/// Largest representable weight (weight 1.0)
pub const WEIGHT_MAX: u32 = (1 << WEIGHT_BITS) - 1;

/// Unit normal stored as quantized polar angles.
///
/// High byte: inclination from +z in [0, pi]. Low byte: azimuth in [-pi, pi].
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PolarNormal(pub u16);

impl PolarNormal {
    /// Encode a (roughly) unit vector
    pub fn encode(normal: Vec3) -> Self {
        let n = normal.normalize_or(Vec3::Z);
        let theta = n.z.clamp(-1.0, 1.0).acos();
        let phi = n.y.atan2(n.x);

        let t = ((theta / PI) * 255.0).round() as u16;
        let p = (((phi + PI) / (2.0 * PI)) * 255.0).round() as u16;
        Self((t.min(255) << 8) | p.min(255))
    }

    /// Decode to a unit vector
    pub fn decode(self) -> Vec3 {
        let theta = (self.0 >> 8) as f32 / 255.0 * PI;
        let phi = (self.0 & 0xFF) as f32 / 255.0 * 2.0 * PI - PI;
        let (sin_t, cos_t) = theta.sin_cos();
        let (sin_p, cos_p) = phi.sin_cos();
        Vec3::new(sin_t * cos_p, sin_t * sin_p, cos_t)
    }
}

/// Convert RGB888 to RGB565
pub fn rgb_to_565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r as u16 >> 3) & 0x1F;
    let g6 = (g as u16 >> 2) & 0x3F;
    let b5 = (b as u16 >> 3) & 0x1F;
    (r5 << 11) | (g6 << 5) | b5
}

/// Convert RGB565 to RGB888
pub fn rgb565_to_rgb(color: u16) -> (u8, u8, u8) {
    let r5 = (color >> 11) & 0x1F;
    let g6 = (color >> 5) & 0x3F;
    let b5 = color & 0x1F;
    (
        ((r5 << 3) | (r5 >> 2)) as u8,
        ((g6 << 2) | (g6 >> 4)) as u8,
        ((b5 << 3) | (b5 >> 2)) as u8,
    )
}

/// Quantize `count / total` into a 5-bit weight (floor, like the renderer expects)
pub fn quantize_weight(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((WEIGHT_MAX as u64 * count as u64) / total as u64) as u32
}

/// Store a 5-bit weight into `slot` of a packed weight word
pub fn pack_weight(packed: u32, slot: usize, weight: u32) -> u32 {
    let shift = slot as u32 * WEIGHT_BITS;
    (packed & !(WEIGHT_MAX << shift)) | ((weight & WEIGHT_MAX) << shift)
}

/// Raw 5-bit weight of `slot`
pub fn unpack_weight(packed: u32, slot: usize) -> u32 {
    (packed >> (slot as u32 * WEIGHT_BITS)) & WEIGHT_MAX
}

/// Weight of `slot` as a fraction in [0, 1]
pub fn weight_fraction(packed: u32, slot: usize) -> f32 {
    unpack_weight(packed, slot) as f32 / WEIGHT_MAX as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angle_between(a: Vec3, b: Vec3) -> f32 {
        a.normalize().dot(b.normalize()).clamp(-1.0, 1.0).acos().to_degrees()
    }

    #[test]
    fn test_polar_axes() {
        for axis in [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z] {
            let decoded = PolarNormal::encode(axis).decode();
            assert!(angle_between(axis, decoded) < 1.5, "axis {:?} -> {:?}", axis, decoded);
        }
    }

    #[test]
    fn test_polar_error_bound() {
        // Sweep a grid of directions; every one must survive within 1.5 degrees
        for i in 0..24 {
            for j in 0..48 {
                let theta = i as f32 / 23.0 * PI;
                let phi = j as f32 / 48.0 * 2.0 * PI - PI;
                let n = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
                let decoded = PolarNormal::encode(n).decode();
                assert!((decoded.length() - 1.0).abs() < 1e-4);
                assert!(angle_between(n, decoded) < 1.5);
            }
        }
    }

    #[test]
    fn test_polar_degenerate_input() {
        // Zero vector falls back to +z instead of producing NaN
        let decoded = PolarNormal::encode(Vec3::ZERO).decode();
        assert!(angle_between(Vec3::Z, decoded) < 1.5);
    }

    #[test]
    fn test_rgb565() {
        assert_eq!(rgb_to_565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb_to_565(0, 0, 0), 0);
        assert_eq!(rgb565_to_rgb(0xFFFF), (255, 255, 255));
        let (r, g, b) = rgb565_to_rgb(rgb_to_565(200, 100, 50));
        assert!((r as i32 - 200).abs() <= 8);
        assert!((g as i32 - 100).abs() <= 4);
        assert!((b as i32 - 50).abs() <= 8);
    }

    #[test]
    fn test_weights() {
        assert_eq!(quantize_weight(1, 1), 31);
        assert_eq!(quantize_weight(1, 2), 15);
        assert_eq!(quantize_weight(0, 5), 0);
        assert_eq!(quantize_weight(3, 0), 0);

        let mut packed = 0;
        for slot in 0..6 {
            packed = pack_weight(packed, slot, slot as u32 * 5 + 1);
        }
        for slot in 0..6 {
            assert_eq!(unpack_weight(packed, slot), slot as u32 * 5 + 1);
        }
        // Overwriting a slot leaves neighbours intact
        packed = pack_weight(packed, 2, 0);
        assert_eq!(unpack_weight(packed, 2), 0);
        assert_eq!(unpack_weight(packed, 1), 6);
        assert_eq!(unpack_weight(packed, 3), 16);
        assert!((weight_fraction(pack_weight(0, 0, 31), 0) - 1.0).abs() < f32::EPSILON);
    }
}
