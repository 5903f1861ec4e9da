// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application settings.
//!
//! Settings are read from a YAML file. Every field is optional in the file
//! and falls back to a default.

use crate::error::ConfigError;
use crate::io::media::LoadMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV_VAR: &str = "SPINE_TRACKER_CONFIG";

/// Settings file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "spine_tracker.yaml";

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter string understood by `env_logger`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Measurement, loading and display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Microns per image pixel.
    pub pixel_to_micron: f64,
    /// Diagonal length in pixels below which a spine counts as stable.
    pub stability_threshold: f64,
    pub load_mode: LoadMode,
    /// Spine colors, assigned in order of first use.
    pub palette: Vec<String>,
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pixel_to_micron: 1.0 / 7.75,
            stability_threshold: 50.0,
            load_mode: LoadMode::default(),
            palette: default_palette(),
            log_level: LogLevel::default(),
        }
    }
}

fn default_palette() -> Vec<String> {
    ["red", "blue", "green", "orange", "purple", "cyan", "yellow", "pink"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Settings {
    /// Parse settings from YAML text and validate them.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&text)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolve the settings file to use, if any.
    ///
    /// The environment variable wins; otherwise the default file name in the
    /// working directory is used when it exists.
    pub fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pixel_to_micron.is_finite() && self.pixel_to_micron > 0.0) {
            return Err(ConfigError::Invalid {
                field: "pixel_to_micron",
                message: format!("must be a positive number, got {}", self.pixel_to_micron),
            });
        }
        if !(self.stability_threshold.is_finite() && self.stability_threshold >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "stability_threshold",
                message: format!("must be non-negative, got {}", self.stability_threshold),
            });
        }
        if self.palette.is_empty() {
            return Err(ConfigError::Invalid {
                field: "palette",
                message: "must contain at least one color".to_string(),
            });
        }
        Ok(())
    }
}
