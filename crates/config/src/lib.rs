//! Shared configuration for Umbra
//!
//! This crate is the single source of truth for the tunables of the decal and
//! shadow projection pipeline: atlas dimensions, clipping diagnostics, fade
//! distances and the capacity of the per-frame geometry sink.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Default side length of the square shadow atlas in pixels
pub const DEFAULT_ATLAS_SIZE: u32 = 512;

/// Default camera distance at which casters are fully faded out
pub const DEFAULT_FADE_DISTANCE: f32 = 60.0;

/// Default padding (pixels) added around every packed slice
pub const DEFAULT_SLICE_PADDING: u32 = 2;

/// Default atlas pixels per world unit of caster extent
pub const DEFAULT_PIXELS_PER_UNIT: f32 = 24.0;

/// Default minimum slice side length in pixels
pub const DEFAULT_MIN_SLICE_SIZE: u32 = 16;

/// Default world-space padding added to a caster's projection extent
pub const DEFAULT_EXTENT_PADDING: f32 = 0.5;

/// Default light direction change (degrees) that invalidates every cached set
pub const DEFAULT_LIGHT_INVALIDATE_ANGLE: f32 = 2.0;

/// Default number of vertices the geometry sink can hold per frame
pub const DEFAULT_SINK_VERTEX_CAPACITY: usize = 65536;

/// Default number of indices the geometry sink can hold per frame
pub const DEFAULT_SINK_INDEX_CAPACITY: usize = 98304;

/// Sentinel for `debug_clip_plane` meaning "clip against every plane"
pub const ALL_CLIP_PLANES: i32 = -1;

/// Errors produced while loading or validating a [`DecalConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Atlas size must be a non-zero power of two, got {0}")]
    InvalidAtlasSize(u32),
    #[error("Debug clip plane must be -1 or 0..=5, got {0}")]
    InvalidClipPlane(i32),
    #[error("Fade distance must be positive, got {0}")]
    InvalidFadeDistance(f32),
    #[error("Geometry sink needs a non-zero vertex capacity")]
    EmptySink,
}

/// Texture origin convention of the graphics backend.
///
/// Decides whether atlas viewports need a vertical flip before being handed
/// to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureOrigin {
    /// Row 0 is the top of the texture (D3D, Metal, Vulkan, wgpu)
    #[default]
    TopLeft,
    /// Row 0 is the bottom of the texture (OpenGL)
    BottomLeft,
}

/// Configuration for the decal / shadow projection pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecalConfig {
    /// Side length of the square atlas in pixels (power of two)
    pub atlas_size: u32,
    /// Master switch for plane clipping
    pub clip_enabled: bool,
    /// Clip against a single numbered plane only (-1 = all planes)
    pub debug_clip_plane: i32,
    /// Regenerate every cached decal set each frame
    pub invalidate_all: bool,
    /// Camera distance at which casters are fully faded out
    pub fade_distance: f32,
    /// Padding in pixels added around every packed slice
    pub slice_padding: u32,
    /// Atlas pixels per world unit of caster extent
    pub pixels_per_unit: f32,
    /// Smallest slice side length in pixels
    pub min_slice_size: u32,
    /// World-space padding added to a caster's projection extent
    pub extent_padding: f32,
    /// Light direction change in degrees that invalidates all cached sets
    pub light_invalidate_angle: f32,
    /// Vertex capacity of the per-frame geometry sink
    pub sink_vertex_capacity: usize,
    /// Index capacity of the per-frame geometry sink
    pub sink_index_capacity: usize,
    /// Run the clip/project/copy step on the rayon pool
    pub parallel_jobs: bool,
    /// Texture origin convention of the backend
    pub texture_origin: TextureOrigin,
}

impl Default for DecalConfig {
    fn default() -> Self {
        Self {
            atlas_size: DEFAULT_ATLAS_SIZE,
            clip_enabled: true,
            debug_clip_plane: ALL_CLIP_PLANES,
            invalidate_all: false,
            fade_distance: DEFAULT_FADE_DISTANCE,
            slice_padding: DEFAULT_SLICE_PADDING,
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            min_slice_size: DEFAULT_MIN_SLICE_SIZE,
            extent_padding: DEFAULT_EXTENT_PADDING,
            light_invalidate_angle: DEFAULT_LIGHT_INVALIDATE_ANGLE,
            sink_vertex_capacity: DEFAULT_SINK_VERTEX_CAPACITY,
            sink_index_capacity: DEFAULT_SINK_INDEX_CAPACITY,
            parallel_jobs: false,
            texture_origin: TextureOrigin::default(),
        }
    }
}

impl DecalConfig {
    /// Parse a config from JSON. Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `UMBRA_*` environment variable overrides.
    ///
    /// Recognized: `UMBRA_ATLAS_SIZE`, `UMBRA_CLIP` (0/1), `UMBRA_DEBUG_CLIP_PLANE`,
    /// `UMBRA_PARALLEL` (0/1). Unparseable values are ignored with a warning.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply `UMBRA_*` overrides read through `lookup`
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = parse_override::<u32>(&lookup, "UMBRA_ATLAS_SIZE") {
            self.atlas_size = size;
        }
        if let Some(clip) = parse_override::<u8>(&lookup, "UMBRA_CLIP") {
            self.clip_enabled = clip != 0;
        }
        if let Some(plane) = parse_override::<i32>(&lookup, "UMBRA_DEBUG_CLIP_PLANE") {
            self.debug_clip_plane = plane;
        }
        if let Some(parallel) = parse_override::<u8>(&lookup, "UMBRA_PARALLEL") {
            self.parallel_jobs = parallel != 0;
        }
        self
    }

    /// Check that every field is within its usable range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.atlas_size.is_power_of_two() {
            return Err(ConfigError::InvalidAtlasSize(self.atlas_size));
        }
        if !(ALL_CLIP_PLANES..=5).contains(&self.debug_clip_plane) {
            return Err(ConfigError::InvalidClipPlane(self.debug_clip_plane));
        }
        if !(self.fade_distance > 0.0) {
            return Err(ConfigError::InvalidFadeDistance(self.fade_distance));
        }
        if self.sink_vertex_capacity == 0 {
            return Err(ConfigError::EmptySink);
        }
        Ok(())
    }

    /// Cosine of `light_invalidate_angle`, for comparing unit directions
    pub fn light_invalidate_cos(&self) -> f32 {
        self.light_invalidate_angle.to_radians().cos()
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DecalConfig::default();
        assert_eq!(config.atlas_size, DEFAULT_ATLAS_SIZE);
        assert_eq!(config.debug_clip_plane, ALL_CLIP_PLANES);
        assert!(config.clip_enabled);
        assert!(!config.invalidate_all);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DecalConfig::from_json_str(r#"{ "atlas_size": 1024, "parallel_jobs": true }"#)
            .unwrap();
        assert_eq!(config.atlas_size, 1024);
        assert!(config.parallel_jobs);
        assert_eq!(config.slice_padding, DEFAULT_SLICE_PADDING);
        assert_eq!(config.texture_origin, TextureOrigin::TopLeft);
    }

    #[test]
    fn test_texture_origin_snake_case() {
        let config =
            DecalConfig::from_json_str(r#"{ "texture_origin": "bottom_left" }"#).unwrap();
        assert_eq!(config.texture_origin, TextureOrigin::BottomLeft);
    }

    #[test]
    fn test_rejects_non_power_of_two_atlas() {
        let result = DecalConfig::from_json_str(r#"{ "atlas_size": 500 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidAtlasSize(500))));
    }

    #[test]
    fn test_rejects_out_of_range_clip_plane() {
        let mut config = DecalConfig::default();
        config.debug_clip_plane = 6;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidClipPlane(6))));

        config.debug_clip_plane = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_json() {
        let result = DecalConfig::from_json_str("{ atlas_size: }");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_light_invalidate_cos() {
        let mut config = DecalConfig::default();
        config.light_invalidate_angle = 0.0;
        assert!((config.light_invalidate_cos() - 1.0).abs() < 1e-6);

        config.light_invalidate_angle = 90.0;
        assert!(config.light_invalidate_cos().abs() < 1e-6);
    }

    #[test]
    fn test_overrides_apply_valid_values() {
        let vars: HashMap<&str, &str> = [
            ("UMBRA_ATLAS_SIZE", "1024"),
            ("UMBRA_CLIP", "0"),
            ("UMBRA_DEBUG_CLIP_PLANE", " 3 "),
            ("UMBRA_PARALLEL", "1"),
        ]
        .into_iter()
        .collect();

        let config = DecalConfig::default().with_overrides_from(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.atlas_size, 1024);
        assert!(!config.clip_enabled);
        assert_eq!(config.debug_clip_plane, 3);
        assert!(config.parallel_jobs);
    }

    #[test]
    fn test_overrides_ignore_garbage() {
        let vars: HashMap<&str, &str> = [("UMBRA_ATLAS_SIZE", "huge"), ("UMBRA_CLIP", "-1"), ("UMBRA_PARALLEL", "")]
            .into_iter()
            .collect();

        let config = DecalConfig::default().with_overrides_from(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config, DecalConfig::default());
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_env_overrides_read_process_environment() {
        // The only test touching UMBRA_* in the process environment
        unsafe {
            std::env::set_var("UMBRA_ATLAS_SIZE", "2048");
            std::env::set_var("UMBRA_PARALLEL", "yes");
        }
        let config = DecalConfig::default().with_env_overrides();
        unsafe {
            std::env::remove_var("UMBRA_ATLAS_SIZE");
            std::env::remove_var("UMBRA_PARALLEL");
        }

        assert_eq!(config.atlas_size, 2048);
        assert!(!config.parallel_jobs);
        assert_eq!(DecalConfig::default().with_env_overrides(), DecalConfig::default());
    }
}
