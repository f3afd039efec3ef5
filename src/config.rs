//! Configuration persistence for station settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::mouser::DEFAULT_BASE_URL;
use crate::domain::SymbologySet;

/// Serializable color representation for config storage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl OverlayColor {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Convert to image crate RGBA format (0-255)
    pub fn to_rgba_u8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            255,
        ]
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        let [r, g, b, a] = self.to_rgba_u8();
        tiny_skia::Color::from_rgba8(r, g, b, a)
    }
}

/// Outline colors by overlay role
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayColors {
    /// Code under the pointer
    pub highlight: OverlayColor,
    /// Displayed code while an operator selection is active
    pub manual: OverlayColor,
    /// Displayed code in automatic mode
    pub auto: OverlayColor,
    /// Every other code
    pub neutral: OverlayColor,
}

impl Default for OverlayColors {
    fn default() -> Self {
        Self {
            highlight: OverlayColor::rgb(1.0, 0.85, 0.0),
            manual: OverlayColor::rgb(0.2, 0.5, 1.0),
            auto: OverlayColor::rgb(0.1, 0.85, 0.2),
            neutral: OverlayColor::rgb(0.9, 0.1, 0.1),
        }
    }
}

/// Station configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Frame source: an image file or a directory of frames
    pub source_selector: String,
    /// Symbologies scanned at startup
    pub enabled: SymbologySet,
    /// Preview area width in pixels
    pub display_width: u32,
    /// Preview area height in pixels
    pub display_height: u32,
    pub colors: OverlayColors,
    /// Outline stroke width in preview pixels
    pub stroke_thickness: f32,
    /// Supplier API key (the `MOUSER_API_KEY` environment variable wins)
    pub api_key: Option<String>,
    pub catalog_url: String,
    pub catalog_timeout_ms: u64,
    /// Longest wait for one worker response before the session is ended
    pub worker_timeout_ms: u64,
    /// Delay between scan commands
    pub frame_interval_ms: u64,
    /// Where snapshots go (None = Pictures folder)
    pub snapshot_dir: Option<PathBuf>,
    /// Where the headless preview is written
    pub preview_path: PathBuf,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            source_selector: "frames".to_string(),
            enabled: SymbologySet::default(),
            display_width: 640,
            display_height: 360,
            colors: OverlayColors::default(),
            stroke_thickness: 2.0,
            api_key: None,
            catalog_url: DEFAULT_BASE_URL.to_string(),
            catalog_timeout_ms: 10_000,
            worker_timeout_ms: 5_000,
            // ~30 fps
            frame_interval_ms: 33,
            snapshot_dir: None,
            preview_path: std::env::temp_dir().join("partscan-preview.png"),
        }
    }
}

impl StationConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("partscan").join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            log::warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::read(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Snapshot directory, falling back to the user's Pictures folder
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .or_else(|| {
                dirs::picture_dir().or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
            })
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
