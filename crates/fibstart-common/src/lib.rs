//! Common types, errors, and configuration for the fibstart harness.
//!
//! This crate provides shared functionality used across the workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for the engine and for booting images
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{BootConfig, EngineConfig, HarnessConfig};
pub use config_file::{ConfigFile, ConfigFileError, ImageEntry};
pub use error::HarnessError;
