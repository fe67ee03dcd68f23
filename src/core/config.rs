//! Engine configuration passed explicitly into construction and traversal

use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::types::Result;

/// Octree construction and caching parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum tree depth (root is depth 0).
    pub max_depth: u8,
    /// Directory holding cached node arrays.
    pub cache_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            cache_dir: PathBuf::from("cache"),
        }
    }
}

/// Viewer parameters consumed by the level-of-detail selectors.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Vertical framebuffer resolution in pixels
    pub resolution_y: u32,
    /// Desired on-screen splat size in pixels
    pub splat_size_px: f32,
    /// Splat enlargement so neighbouring tilted splats close gaps
    pub overlap_factor: f32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::FRAC_PI_4,
            resolution_y: 720,
            splat_size_px: 7.2,
            overlap_factor: 1.75,
        }
    }
}

impl ViewSettings {
    /// Desired splat size as a fraction of the screen height.
    pub fn splat_size(&self) -> f32 {
        self.splat_size_px / self.resolution_y.max(1) as f32
    }

    /// Local-space extent covered by the full screen height at distance 1.
    pub fn fov_scale(&self) -> f32 {
        2.0 * (self.fov_y * 0.5).tan()
    }

    /// Size in pixels the splat shading stage should rasterize.
    pub fn splat_size_pixels(&self) -> f32 {
        self.resolution_y as f32 * self.splat_size() * self.overlap_factor
    }
}

/// Complete configuration of a viewer session.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub build: BuildConfig,
    pub view: ViewSettings,
}

impl EngineConfig {
    /// Load configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write configuration as pretty JSON.
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_splat_size() {
        let view = ViewSettings::default();
        assert!((view.splat_size() - 0.01).abs() < 1e-6);
        assert!((view.splat_size_pixels() - 7.2 * 1.75).abs() < 1e-4);
    }

    #[test]
    fn test_fov_scale() {
        let view = ViewSettings {
            fov_y: std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };
        // 2 * tan(45deg) = 2
        assert!((view.fov_scale() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "build": { "max_depth": 4 } }"#).unwrap();
        assert_eq!(config.build.max_depth, 4);
        assert_eq!(config.build.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.view, ViewSettings::default());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.build.max_depth = 7;
        config.view.resolution_y = 1080;
        config.to_json_file(&path).unwrap();

        let loaded = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = EngineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
