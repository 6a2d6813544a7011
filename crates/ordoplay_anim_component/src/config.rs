// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview settings, stored as RON.

use crate::component::AnimComponentOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current preview file format version
pub const PREVIEW_FORMAT_VERSION: u32 = 1;

/// Error loading or saving a preview config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for a config
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The config could not be written as RON
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),

    /// The config parsed but holds unusable values
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A track file bound to a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackBinding {
    /// JSON track file
    pub path: PathBuf,
    /// `State` or `State.Child`
    pub node: String,
    /// Target layer; the base layer when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    /// Speed override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    /// Loop override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
}

/// Parameter value applied before the first frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterOverride {
    /// Float parameter
    Float(String, f32),
    /// Integer parameter
    Integer(String, i32),
    /// Boolean parameter
    Boolean(String, bool),
    /// Trigger to fire
    Trigger(String),
}

/// Settings for a headless animation preview run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// File format version
    pub version: u32,
    /// JSON state graph; a built-in demo graph when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<PathBuf>,
    /// Tracks to assign after the graph loads
    pub tracks: Vec<TrackBinding>,
    /// Simulated frames per second
    pub frame_rate: f32,
    /// Simulated seconds
    pub duration: f32,
    /// Component settings
    pub component: AnimComponentOptions,
    /// Parameter values set before the first frame
    pub parameters: Vec<ParameterOverride>,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            version: PREVIEW_FORMAT_VERSION,
            graph: None,
            tracks: Vec::new(),
            frame_rate: 60.0,
            duration: 2.0,
            component: AnimComponentOptions::default(),
            parameters: Vec::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl PreviewConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;

        // Relative paths are resolved against the config file
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolve_paths(base))
    }

    /// Parse and validate RON text
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let config: PreviewConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty RON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Serialize as pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Reject values the preview cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version > PREVIEW_FORMAT_VERSION {
            return Err(ConfigError::Invalid(format!(
                "Preview version {} is newer than supported version {}",
                self.version, PREVIEW_FORMAT_VERSION
            )));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "duration must not be negative, got {}",
                self.duration
            )));
        }
        Ok(())
    }

    /// Number of whole frames to simulate
    pub fn frame_count(&self) -> usize {
        (self.duration * self.frame_rate).round() as usize
    }

    /// Seconds per frame
    pub fn frame_time(&self) -> f32 {
        1.0 / self.frame_rate
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        if let Some(graph) = &mut self.graph {
            if graph.is_relative() {
                *graph = base.join(&*graph);
            }
        }
        for track in &mut self.tracks {
            if track.path.is_relative() {
                track.path = base.join(&track.path);
            }
        }
        self
    }
}
