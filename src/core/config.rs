//! Render configuration with documented constants
//!
//! Settings are read-only for the renderer. They are loaded once at session
//! setup (usually from a TOML file) and passed into `WorldRenderer::new`.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs;
use std::path::Path;

use crate::core::error::{RenderError, Result};
use crate::core::types::WORLD_UNITS_PER_CELL;

/// Configuration for the frame renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    // === PROJECTION ===
    /// Width of one world cell on screen (pixels)
    pub tile_width: i32,

    /// Height of one world cell on screen (pixels)
    ///
    /// Elevation is projected with the same factor, so a unit raised by one
    /// cell of height moves up by exactly `tile_height` pixels.
    pub tile_height: i32,

    /// World subunits per cell along the horizontal axes
    pub tile_scale: i32,

    // === SESSION FLAGS ===
    /// Draw the background/menu map behind the main menu
    ///
    /// When false, a shellmap session only refreshes the palette each frame.
    pub show_shellmap: bool,

    /// Draw health rollovers over every visible, unselected selectable actor
    pub always_show_status_bars: bool,

    // === VIEWPORT ===
    /// Smallest allowed zoom factor (screen pixels per world-screen pixel)
    pub min_zoom: f32,

    /// Largest allowed zoom factor
    pub max_zoom: f32,

    // === ANNOTATIONS ===
    /// Line width of range circles (pixels)
    pub range_circle_width: f32,

    /// Half-size of the target marker diamond in screen pixels
    ///
    /// Stays constant on screen regardless of zoom.
    pub target_marker_size: f32,

    /// Height of a status bar rollover (pixels)
    pub status_bar_height: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            // Isometric 2:1 tiles
            tile_width: 48,
            tile_height: 24,
            tile_scale: WORLD_UNITS_PER_CELL,

            show_shellmap: true,
            always_show_status_bars: false,

            min_zoom: 0.5,
            max_zoom: 4.0,

            range_circle_width: 1.0,
            target_marker_size: 4.0,
            status_bar_height: 3.0,
        }
    }
}

impl RenderSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: RenderSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.tile_width <= 0 || self.tile_height <= 0 {
            return Err(RenderError::InvalidSettings(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }

        if self.tile_scale <= 0 {
            return Err(RenderError::InvalidSettings(format!(
                "tile_scale must be positive, got {}",
                self.tile_scale
            )));
        }

        if self.min_zoom <= 0.0 || self.min_zoom > self.max_zoom {
            return Err(RenderError::InvalidSettings(format!(
                "zoom limits must satisfy 0 < min_zoom ({}) <= max_zoom ({})",
                self.min_zoom, self.max_zoom
            )));
        }

        Ok(())
    }
}

/// Developer toggles, resolved once at session setup.
///
/// Shared with the developer console so flags can change between frames.
#[derive(Debug, Default)]
pub struct DeveloperMode {
    show_debug_geometry: Cell<bool>,
}

impl DeveloperMode {
    pub fn new(show_debug_geometry: bool) -> Self {
        Self {
            show_debug_geometry: Cell::new(show_debug_geometry),
        }
    }

    pub fn show_debug_geometry(&self) -> bool {
        self.show_debug_geometry.get()
    }

    pub fn set_show_debug_geometry(&self, enabled: bool) {
        self.show_debug_geometry.set(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RenderSettings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = RenderSettings::from_toml_str(
            r#"
            show_shellmap = false
            tile_width = 24
            "#,
        )
        .unwrap();

        assert!(!settings.show_shellmap);
        assert_eq!(settings.tile_width, 24);
        assert_eq!(settings.tile_height, 24);
        assert_eq!(settings.tile_scale, 1024);
    }

    #[test]
    fn test_rejects_inverted_zoom() {
        let result = RenderSettings::from_toml_str("min_zoom = 3.0\nmax_zoom = 2.0");
        assert!(matches!(result, Err(RenderError::InvalidSettings(_))));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let result = RenderSettings::from_toml_str("tile_width = \"wide\"");
        assert!(matches!(result, Err(RenderError::TomlError(_))));
    }

    #[test]
    fn test_developer_toggle() {
        let dev = DeveloperMode::new(false);
        assert!(!dev.show_debug_geometry());
        dev.set_show_debug_geometry(true);
        assert!(dev.show_debug_geometry());
    }
}
