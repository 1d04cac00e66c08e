use crate::paths;
use crate::vr::{HmdMatrix34, IntSize, TrackingOrigin};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine default config directory")]
    NoConfigDir,
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Failed to write config file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Largest surface edge accepted from a config file, in pixels.
pub const MAX_SURFACE_DIMENSION: u32 = 16384;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The path the config file was loaded from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Unique key the overlay is registered under
    pub overlay_key: String,
    /// Name shown for the overlay in the VR dashboard
    pub overlay_name: String,
    /// Width of the overlay surface in pixels
    pub width_px: u32,
    /// Height of the overlay surface in pixels
    pub height_px: u32,
    /// Physical width of the overlay in meters
    pub width_in_meters: f32,
    /// Overlay opacity (0.0 - 1.0)
    pub alpha: f32,
    /// Position of the overlay center relative to the tracking origin, in meters
    pub position: (f32, f32, f32),
    pub tracking_origin: TrackingOrigin,
    /// Whether the overlay is shown on startup
    pub visible: bool,
    /// Color the surface is cleared to before each frame (RGB)
    pub background_color: (u8, u8, u8),
}

impl Config {
    pub fn default_config_path() -> Option<PathBuf> {
        paths::default_config_path()
    }

    pub fn load(config_path: Option<&Path>, save: bool) -> ConfigResult<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path().ok_or(ConfigError::NoConfigDir)?,
        };

        if !path.exists() {
            Self::default().save_to_file(&path)?;
            trace!("Created default config file at: {}", path.display());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let mut config = Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.config_path = Some(path.clone());

        // Write back so every field is present in the file
        if save {
            if let Err(e) = config.save_to_file(&path) {
                warn!("Failed to update config file with missing fields: {e}");
            }
        }

        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let header =
            "# VR Overlay Configuration File\n# This file contains your overlay settings.\n\n";
        let serialized_config = serde_yaml::to_string(self)?;

        fs::write(path, format!("{header}{serialized_config}")).map_err(write_error)
    }

    pub fn overlay_size(&self) -> IntSize {
        IntSize::new(self.width_px, self.height_px)
    }

    pub fn transform(&self) -> HmdMatrix34 {
        let (x, y, z) = self.position;
        HmdMatrix34::translation(x, y, z)
    }

    pub fn background(&self) -> skia_safe::Color {
        let (r, g, b) = self.background_color;
        skia_safe::Color::from_rgb(r, g, b)
    }

    /// Checks values the runtime would reject so a bad file fails before startup.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_owned()));

        if self.overlay_key.is_empty() {
            return invalid("overlay_key must not be empty");
        }
        if self.overlay_key.len() > crate::vr::OVERLAY_MAX_KEY_LENGTH {
            return invalid("overlay_key is too long");
        }
        if self.overlay_name.len() > crate::vr::OVERLAY_MAX_NAME_LENGTH {
            return invalid("overlay_name is too long");
        }
        if self.overlay_size().is_empty() {
            return invalid("width_px and height_px must be greater than zero");
        }
        if self.width_px > MAX_SURFACE_DIMENSION || self.height_px > MAX_SURFACE_DIMENSION {
            return invalid("width_px and height_px must be at most 16384");
        }
        if !(self.width_in_meters > 0.0) {
            return invalid("width_in_meters must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return invalid("alpha must be between 0.0 and 1.0");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            overlay_key: "vroverlay.main".to_owned(),
            overlay_name: "VR Overlay".to_owned(),
            width_px: 640,
            height_px: 480,
            width_in_meters: 3.0,
            alpha: 1.0,
            position: (0.0, 1.0, -2.0),
            tracking_origin: TrackingOrigin::Standing,
            visible: true,
            background_color: (255, 255, 255),
        }
    }
}
