//! Error types for the fibstart harness.
//!
//! The freestanding image itself has no error channel. Everything here
//! describes what the *host* can observe while loading, calling or booting an
//! image: malformed images, missing symbols, entry points that break their
//! no-return contract, and guest traps.

use std::io;

use thiserror::Error;

/// Errors raised by the hosted harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The image bytes are not a loadable WebAssembly module.
    #[error("Invalid image: {reason}")]
    InvalidImage {
        /// Description of what is wrong with the image.
        reason: String,
    },

    /// A required export is absent or has the wrong type.
    #[error("Missing export: {name}")]
    MissingExport {
        /// Name of the export that was looked up.
        name: String,
    },

    /// The entry symbol returned control to its caller.
    ///
    /// A freestanding entry point has no caller; returning is a contract
    /// violation.
    #[error("Entry point '{symbol}' returned after {duration_ms}ms")]
    EntryReturned {
        /// Name of the entry symbol.
        symbol: String,
        /// Time spent inside the entry point before it returned.
        duration_ms: u64,
    },

    /// The guest trapped for a reason other than an interruption.
    #[error("Guest trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
        /// Trap code if available.
        code: Option<String>,
    },

    /// A call exhausted its fuel budget.
    #[error("Fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// A call ran past its epoch deadline.
    #[error("Execution timeout after {duration_ms}ms")]
    ExecutionTimeout {
        /// The timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// An observable slot points outside the image's linear memory.
    #[error("Memory access out of bounds at {address:#x} (memory size {memory_size})")]
    MemoryAccess {
        /// Address read from the slot export.
        address: u64,
        /// Size of linear memory in bytes.
        memory_size: usize,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl HarnessError {
    /// Create a new `InvalidImage` error.
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }

    /// Create a new `MissingExport` error.
    pub fn missing_export(name: impl Into<String>) -> Self {
        Self::MissingExport { name: name.into() }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Trap {
            message: message.into(),
            code,
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error means the guest was stopped by a resource
    /// bound (fuel or deadline) rather than by its own behavior.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::FuelExhausted | Self::ExecutionTimeout { .. })
    }

    /// Returns `true` if this error is a broken entry-point contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::EntryReturned { .. })
    }
}
