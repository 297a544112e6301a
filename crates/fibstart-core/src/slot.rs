//! Observable memory slots.
//!
//! The image has no I/O channel, so its only output is memory that an outside
//! observer (debugger, memory dump, hosted harness) reads at a known symbol.
//! The slots are unmangled atomics: stores to an exported static are kept by
//! the optimizer, and a hosted observer on another thread reads them without
//! a data race. On `wasm32` and single-core targets they lower to plain
//! word-sized loads and stores.

use core::sync::atomic::{AtomicI32, AtomicU32};

/// Result of the entry routine's single computation.
#[allow(unsafe_code)]
#[unsafe(no_mangle)]
pub static FIB_RESULT: AtomicI32 = AtomicI32::new(0);

/// Lifecycle mark of the entry routine, see [`EntryState`].
///
/// Written with `Release` after [`FIB_RESULT`]; an observer that loads
/// [`EntryState::HALTED_MARK`] with `Acquire` also sees the result.
#[allow(unsafe_code)]
#[unsafe(no_mangle)]
pub static FIB_ENTRY_STATE: AtomicU32 = AtomicU32::new(0);

/// Lifecycle of the entry routine.
///
/// `Running` moves to `Halted` exactly once; nothing moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// The slot holds anything other than a known mark.
    NotStarted,
    /// The computation is in progress.
    Running,
    /// The result is stored and the processor is parked.
    Halted,
}

impl EntryState {
    /// Mark written on entry, ASCII `RUNN`.
    pub const RUNNING_MARK: u32 = 0x5255_4E4E;

    /// Mark written right before parking, ASCII `HALT`.
    pub const HALTED_MARK: u32 = 0x4841_4C54;

    /// The raw mark stored in [`FIB_ENTRY_STATE`] for this state.
    pub const fn mark(self) -> u32 {
        match self {
            Self::NotStarted => 0,
            Self::Running => Self::RUNNING_MARK,
            Self::Halted => Self::HALTED_MARK,
        }
    }

    /// Decode a raw mark. Unknown patterns are `NotStarted`.
    pub const fn from_mark(raw: u32) -> Self {
        match raw {
            Self::RUNNING_MARK => Self::Running,
            Self::HALTED_MARK => Self::Halted,
            _ => Self::NotStarted,
        }
    }

    /// Returns `true` once the entry routine has reached its terminal state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Halted)
    }
}

impl core::fmt::Display for EntryState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started"),
            Self::Running => write!(f, "running"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_word_sized() {
        // Observers read the slots as raw 32-bit words.
        assert_eq!(size_of::<AtomicI32>(), size_of::<i32>());
        assert_eq!(align_of::<AtomicU32>(), align_of::<u32>());
    }

    #[test]
    fn test_mark_roundtrip() {
        for state in [EntryState::NotStarted, EntryState::Running, EntryState::Halted] {
            assert_eq!(EntryState::from_mark(state.mark()), state);
        }
    }

    #[test]
    fn test_unknown_marks_are_not_started() {
        assert_eq!(EntryState::from_mark(0xDEAD_BEEF), EntryState::NotStarted);
        assert_eq!(EntryState::from_mark(1), EntryState::NotStarted);
    }

    #[test]
    fn test_marks_spell_ascii() {
        assert_eq!(&EntryState::RUNNING_MARK.to_be_bytes(), b"RUNN");
        assert_eq!(&EntryState::HALTED_MARK.to_be_bytes(), b"HALT");
    }

    #[test]
    fn test_only_halted_is_terminal() {
        assert!(EntryState::Halted.is_terminal());
        assert!(!EntryState::Running.is_terminal());
        assert!(!EntryState::NotStarted.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(EntryState::Halted.to_string(), "halted");
        assert_eq!(EntryState::Running.to_string(), "running");
        assert_eq!(EntryState::NotStarted.to_string(), "not-started");
    }
}
