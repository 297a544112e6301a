//! TOML configuration file for the fibstart CLI.
//!
//! # Example
//!
//! ```toml
//! [harness.engine]
//! epoch_interruption = true
//! epoch_tick_ms = 1
//!
//! [harness.boot]
//! timeout_ms = 200
//! max_fuel = 5_000_000
//!
//! [image]
//! path = "./guest/fibstart-image/target/wasm32-unknown-unknown/release/fibstart_image.wasm"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::HarnessConfig;

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Harness configuration (engine + boot settings).
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Default image to operate on when none is given on the command line.
    #[serde(default)]
    pub image: Option<ImageEntry>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        debug!(path = %path.display(), bytes = content.len(), "Config file read");

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// An image to load.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageEntry {
    /// Path to the `.wasm` (or `.wat`) image.
    pub path: String,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
