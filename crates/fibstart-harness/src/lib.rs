//! Hosted harness for freestanding fibstart images.
//!
//! The image never returns and has no I/O, so the harness observes it from
//! the outside:
//! - [`HarnessEngine`]: Wasmtime engine with fuel metering and epoch interruption
//! - [`ProgramImage`]: compiled `.wasm` / `.wat` image
//! - [`ImageRunner`]: calls the exported computer or boots the entry point
//! - [`ObservableSlots`]: reads `FIB_RESULT` / `FIB_ENTRY_STATE` out of linear memory
//!
//! # Boot flow
//!
//! ```text
//! ImageRunner::boot
//!   ├─ create_store (fuel budget, epoch deadline)
//!   ├─ instantiate, resolve slot exports
//!   ├─ call `_start` ──► guest spins forever
//!   │                         │
//!   │        OutOfFuel / Interrupt trap
//!   │                         ▼
//!   └─ read slots ──► BootReport { state: Halted, result, stopped_by }
//! ```
//!
//! A normal return from `_start` is reported as
//! [`HarnessError::EntryReturned`](fibstart_common::HarnessError::EntryReturned).

pub mod engine;
pub mod image;
pub mod runner;
pub mod slots;
pub mod store;

pub use engine::HarnessEngine;
pub use image::ProgramImage;
pub use runner::{BootReport, CallOutcome, ImageRunner, StopReason};
pub use slots::ObservableSlots;
pub use store::{ProbeContext, RunMetrics};
