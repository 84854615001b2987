//! Runtime configuration for the capture session.
//!
//! Covers the knobs the engine itself consumes: where finished recordings
//! land and which container extension their file names carry. Values can be
//! loaded from and saved to a TOML file, or built in code via [`Default`].

use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Capture session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Directory where finished recordings are written.
    pub output_directory: PathBuf,
    /// Container extension for recording file names (no leading dot).
    pub container_extension: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_directory: std::env::temp_dir(),
            container_extension: "mp4".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| SessionError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&contents)
            .map_err(|e| SessionError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SessionError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(&path, contents)
            .map_err(|e| SessionError::Config(format!("Failed to write config file: {}", e)))
    }

    /// Allocate a fresh recording destination under the output directory.
    pub fn recording_destination(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}.{}", uuid::Uuid::new_v4(), self.container_extension))
    }
}
