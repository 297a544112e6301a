//! Program entry routine.
//!
//! [`run_entry`] is what a freestanding image's `_start` forwards to: it runs
//! one computation, publishes the result through the observable slots and
//! parks the processor. There is no caller to return to and no exit to call.

use core::sync::atomic::Ordering;

use crate::compute::fibonacci;
use crate::slot::{EntryState, FIB_ENTRY_STATE, FIB_RESULT};

/// Fixed argument the entry routine computes.
///
/// Stack depth of the computation equals this value.
pub const ENTRY_ARGUMENT: i32 = 1;

/// Run the image's single computation, then halt forever.
///
/// Writes [`EntryState::Running`], stores `fibonacci(ENTRY_ARGUMENT)` into
/// [`FIB_RESULT`], writes [`EntryState::Halted`] and enters [`halt`].
/// Static memory is only written, never read, so an uninitialized `.bss` is
/// harmless.
pub fn run_entry() -> ! {
    FIB_ENTRY_STATE.store(EntryState::Running.mark(), Ordering::Relaxed);

    publish(fibonacci(ENTRY_ARGUMENT));
    halt()
}

/// Store `result`, then mark the routine halted.
fn publish(result: i32) {
    FIB_RESULT.store(result, Ordering::Relaxed);
    FIB_ENTRY_STATE.store(EntryState::Halted.mark(), Ordering::Release);
}

/// Park the processor in an unconditional spin loop.
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Current content of [`FIB_RESULT`].
///
/// Only meaningful once [`observed_state`] reports [`EntryState::Halted`].
pub fn observed_result() -> i32 {
    FIB_RESULT.load(Ordering::Relaxed)
}

/// Current decoded content of [`FIB_ENTRY_STATE`].
pub fn observed_state() -> EntryState {
    EntryState::from_mark(FIB_ENTRY_STATE.load(Ordering::Acquire))
}
