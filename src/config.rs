//! Preview pipeline configuration
//!
//! Stored as JSON in the user's config directory:
//! - Linux: ~/.config/filter-preview/config.json
//! - macOS: ~/Library/Application Support/filter-preview/config.json
//! - Windows: %APPDATA%\filter-preview\config.json

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gpu::backend::TextureFilter;

/// How the render thread is driven.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RenderMode {
    /// Redraw on a fixed interval, plus on demand.
    Continuous { interval_ms: u64 },
    /// Redraw only when something requests a frame.
    WhenDirty,
}

impl RenderMode {
    /// How long the render thread may sleep without a request.
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self {
            RenderMode::Continuous { interval_ms } => Some(Duration::from_millis((*interval_ms).max(1))),
            RenderMode::WhenDirty => None,
        }
    }
}

impl Default for RenderMode {
    fn default() -> Self {
        // Roughly one frame at 60Hz
        RenderMode::Continuous { interval_ms: 16 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Sampling used for uploaded source images
    pub texture_filter: TextureFilter,
    pub render_mode: RenderMode,
    /// Size of the visible surface in pixels
    pub surface_width: u32,
    pub surface_height: u32,
    /// Scale used for filter thumbnails
    pub preview_scale: f32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            texture_filter: TextureFilter::Linear,
            render_mode: RenderMode::default(),
            surface_width: 1280,
            surface_height: 960,
            preview_scale: 0.2,
        }
    }
}

impl PreviewConfig {
    /// Load the user's config, falling back to defaults when the file is
    /// missing or cannot be parsed.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    tracing::debug!(path = %path.display(), "loaded preview config");
                    config
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "invalid preview config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Where the config file lives, if the platform has a config directory
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("filter-preview");
        path.push("config.json");
        Some(path)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
