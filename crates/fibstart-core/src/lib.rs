//! Freestanding Fibonacci computer and program entry routine.
//!
//! This crate is `no_std`, allocation-free and has no dependencies, so it can
//! be linked into an image that runs with nothing underneath it:
//! - [`fibonacci`]: the computer, exported as the unmangled `fibonacci` symbol
//! - [`run_entry`]: the entry routine the image's `_start` forwards to
//! - [`FIB_RESULT`] / [`FIB_ENTRY_STATE`]: write-only observable slots
//!
//! # Lifecycle
//!
//! ```text
//! _start ──► run_entry ──► fibonacci(ENTRY_ARGUMENT) ──► FIB_RESULT
//!                 │                                        (atomic)
//!                 ▼
//!            Running ─────────────────────────────────► Halted
//!                                                     (spin forever)
//! ```
//!
//! Nothing here assumes static memory was initialized by a loader: the entry
//! routine only ever writes the slots, and the lifecycle marks are distinct
//! non-zero patterns so that a fresh or garbage slot reads as
//! [`EntryState::NotStarted`].

#![cfg_attr(not(test), no_std)]

pub mod compute;
pub mod entry;
pub mod slot;

pub use compute::fibonacci;
pub use entry::{ENTRY_ARGUMENT, halt, observed_result, observed_state, run_entry};
pub use slot::{EntryState, FIB_ENTRY_STATE, FIB_RESULT};
