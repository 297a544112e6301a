//! Configuration structures for the fibstart harness.
//!
//! This module defines configuration options for:
//! - [`HarnessConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (interruption, epoch ticking)
//! - [`BootConfig`]: Symbol names and limits used when calling or booting an image

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level harness configuration.
///
/// Can be loaded from TOML or JSON; every field has a default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-run boot configuration.
    #[serde(default)]
    pub boot: BootConfig,
}

/// Wasmtime engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable epoch-based interruption.
    ///
    /// Lets a boot be cut off by wall-clock time in addition to fuel.
    #[serde(default = "defaults::epoch_interruption")]
    pub epoch_interruption: bool,

    /// Interval between epoch increments in milliseconds.
    ///
    /// Deadlines are expressed in ticks, so with the default of 1 a deadline
    /// of `timeout_ms` ticks is roughly `timeout_ms` milliseconds.
    #[serde(default = "defaults::epoch_tick_ms")]
    pub epoch_tick_ms: u64,

    /// Enable Cranelift speed optimizations.
    #[serde(default = "defaults::optimize")]
    pub optimize: bool,

    /// Maximum wasm stack size in bytes.
    ///
    /// Bounds the recursion depth of the computer; exceeding it traps.
    #[serde(default = "defaults::max_wasm_stack")]
    pub max_wasm_stack: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epoch_interruption: defaults::epoch_interruption(),
            epoch_tick_ms: defaults::epoch_tick_ms(),
            optimize: defaults::optimize(),
            max_wasm_stack: defaults::max_wasm_stack(),
        }
    }
}

impl EngineConfig {
    /// Get the epoch tick interval as a `Duration`.
    pub fn epoch_tick(&self) -> Duration {
        Duration::from_millis(self.epoch_tick_ms)
    }
}

/// Symbol names and resource limits for a run against an image.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootConfig {
    /// Name of the entry export.
    #[serde(default = "defaults::entry_symbol")]
    pub entry_symbol: String,

    /// Name of the computer export.
    #[serde(default = "defaults::compute_symbol")]
    pub compute_symbol: String,

    /// Name of the global holding the address of the result slot.
    #[serde(default = "defaults::result_symbol")]
    pub result_symbol: String,

    /// Name of the global holding the address of the lifecycle slot.
    #[serde(default = "defaults::state_symbol")]
    pub state_symbol: String,

    /// Name of the linear memory export.
    #[serde(default = "defaults::memory_export")]
    pub memory_export: String,

    /// Time a boot is given before the halt is declared, in milliseconds.
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Fuel budget per run. The default covers `call` up to about `n = 35`.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Enable fuel metering.
    #[serde(default = "defaults::fuel_metering")]
    pub fuel_metering: bool,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            entry_symbol: defaults::entry_symbol(),
            compute_symbol: defaults::compute_symbol(),
            result_symbol: defaults::result_symbol(),
            state_symbol: defaults::state_symbol(),
            memory_export: defaults::memory_export(),
            timeout_ms: defaults::timeout_ms(),
            max_fuel: defaults::max_fuel(),
            fuel_metering: defaults::fuel_metering(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn epoch_interruption() -> bool {
        true
    }

    pub const fn epoch_tick_ms() -> u64 {
        1
    }

    pub const fn optimize() -> bool {
        true
    }

    pub const fn max_wasm_stack() -> usize {
        512 * 1024
    }

    pub fn entry_symbol() -> String {
        "_start".to_string()
    }

    pub fn compute_symbol() -> String {
        "fibonacci".to_string()
    }

    pub fn result_symbol() -> String {
        "FIB_RESULT".to_string()
    }

    pub fn state_symbol() -> String {
        "FIB_ENTRY_STATE".to_string()
    }

    pub fn memory_export() -> String {
        "memory".to_string()
    }

    pub const fn timeout_ms() -> u64 {
        100
    }

    pub const fn max_fuel() -> u64 {
        1_000_000_000
    }

    pub const fn fuel_metering() -> bool {
        true
    }
}
