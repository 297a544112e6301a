//! Reading the image's observable slots from the host.
//!
//! On `wasm32` an unmangled static is exported as an immutable global whose
//! value is the static's address in linear memory. Reading a slot is two
//! steps: fetch the address from the global, then read the word at that
//! address out of the exported memory (little-endian).

use wasmtime::{Instance, Memory, Store, Val};

use fibstart_common::{BootConfig, HarnessError};
use fibstart_core::EntryState;

use crate::store::ProbeContext;

/// Resolved locations of `FIB_RESULT` and `FIB_ENTRY_STATE`.
#[derive(Debug, Clone, Copy)]
pub struct ObservableSlots {
    memory: Memory,
    result_addr: u64,
    state_addr: u64,
}

impl ObservableSlots {
    /// Resolve the memory and both slot addresses named in `config`.
    ///
    /// Done before the entry point runs so a malformed image is reported as
    /// [`HarnessError::MissingExport`] instead of being booted.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingExport`] if the memory or a slot global
    /// is absent or not an integer.
    pub fn resolve(
        instance: &Instance,
        store: &mut Store<ProbeContext>,
        config: &BootConfig,
    ) -> Result<Self, HarnessError> {
        let memory = instance
            .get_memory(&mut *store, &config.memory_export)
            .ok_or_else(|| HarnessError::missing_export(&config.memory_export))?;

        let result_addr = slot_address(instance, store, &config.result_symbol)?;
        let state_addr = slot_address(instance, store, &config.state_symbol)?;

        Ok(Self {
            memory,
            result_addr,
            state_addr,
        })
    }

    /// Address of the result slot.
    pub fn result_addr(&self) -> u64 {
        self.result_addr
    }

    /// Address of the lifecycle slot.
    pub fn state_addr(&self) -> u64 {
        self.state_addr
    }

    /// Read the stored result.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MemoryAccess`] if the slot lies outside memory.
    pub fn read_result(&self, store: &Store<ProbeContext>) -> Result<i32, HarnessError> {
        self.read_word(store, self.result_addr).map(i32::from_le_bytes)
    }

    /// Read and decode the lifecycle mark.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MemoryAccess`] if the slot lies outside memory.
    pub fn read_state(&self, store: &Store<ProbeContext>) -> Result<EntryState, HarnessError> {
        self.read_word(store, self.state_addr)
            .map(|word| EntryState::from_mark(u32::from_le_bytes(word)))
    }

    fn read_word(&self, store: &Store<ProbeContext>, address: u64) -> Result<[u8; 4], HarnessError> {
        let out_of_bounds = || HarnessError::MemoryAccess {
            address,
            memory_size: self.memory.data_size(store),
        };

        let offset = usize::try_from(address).map_err(|_| out_of_bounds())?;
        let mut word = [0u8; 4];
        self.memory
            .read(store, offset, &mut word)
            .map_err(|_| out_of_bounds())?;

        Ok(word)
    }
}

/// Address held by the exported global `name`.
#[allow(clippy::cast_sign_loss)]
fn slot_address(
    instance: &Instance,
    store: &mut Store<ProbeContext>,
    name: &str,
) -> Result<u64, HarnessError> {
    let global = instance
        .get_global(&mut *store, name)
        .ok_or_else(|| HarnessError::missing_export(name))?;

    match global.get(&mut *store) {
        Val::I32(addr) => Ok(u64::from(addr as u32)),
        Val::I64(addr) => Ok(addr as u64),
        _ => Err(HarnessError::missing_export(name)),
    }
}
