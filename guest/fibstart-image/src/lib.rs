#![no_std]

use core::panic::PanicInfo;

// Re-exported so the unmangled symbols stay in the image's export table.
pub use fibstart_core::{FIB_ENTRY_STATE, FIB_RESULT, fibonacci};

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    fibstart_core::halt()
}

/// First code executed in the image. Never returns.
#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    fibstart_core::run_entry()
}
