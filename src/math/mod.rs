//! Mathematical utilities and data structures

pub mod aabb;
pub mod encoding;

pub use aabb::{Aabb, octant_of, child_center};
pub use encoding::{PolarNormal, rgb_to_565, rgb565_to_rgb};
