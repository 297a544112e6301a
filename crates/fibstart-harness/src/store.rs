//! Per-run store state and resource bounds.
//!
//! This module provides:
//! - [`ProbeContext`]: host data attached to each store
//! - [`RunMetrics`]: fuel and timing of one run
//! - [`create_store`]: a store with fuel and an epoch deadline applied

use std::time::{Duration, Instant};

use wasmtime::Store;

use crate::HarnessEngine;
use fibstart_common::{BootConfig, HarnessError};

/// Host data for a single call or boot.
///
/// The image imports nothing, so this only carries bookkeeping.
#[derive(Debug)]
pub struct ProbeContext {
    /// Identifier used in logs.
    pub run_id: String,

    /// Metrics collected for this run.
    pub metrics: RunMetrics,

    /// Fuel placed in the store at creation.
    initial_fuel: u64,

    start_time: Instant,
}

/// Metrics of one run.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Fuel consumed during the run.
    pub fuel_consumed: u64,

    /// Wall-clock duration of the run.
    pub duration: Option<Duration>,
}

impl ProbeContext {
    /// Create a new context with the given run ID.
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            metrics: RunMetrics::default(),
            initial_fuel: 0,
            start_time: Instant::now(),
        }
    }
}

/// Create a store bounded by the fuel budget and epoch deadline in `config`.
///
/// Without fuel metering the store still needs fuel (the engine always
/// meters), so it gets `u64::MAX`. The epoch deadline is converted from
/// `timeout_ms` into ticks of the engine's epoch interval.
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &HarnessEngine,
    config: &BootConfig,
    run_id: String,
) -> Result<Store<ProbeContext>, HarnessError> {
    let mut store = Store::new(engine.inner(), ProbeContext::new(run_id));

    let fuel = if config.fuel_metering {
        config.max_fuel
    } else {
        u64::MAX
    };
    store
        .set_fuel(fuel)
        .map_err(|e| HarnessError::invalid_config(format!("Failed to set fuel: {e}")))?;
    store.data_mut().initial_fuel = fuel;

    if engine.config().epoch_interruption {
        store.set_epoch_deadline(deadline_ticks(
            config.timeout_ms,
            engine.config().epoch_tick_ms,
        ));
    }

    Ok(store)
}

/// Number of epoch ticks covering `timeout_ms`, at least one.
fn deadline_ticks(timeout_ms: u64, tick_ms: u64) -> u64 {
    timeout_ms.div_ceil(tick_ms.max(1)).max(1)
}

/// Get remaining fuel from a store.
pub fn get_remaining_fuel(store: &Store<ProbeContext>) -> Option<u64> {
    store.get_fuel().ok()
}

/// Record fuel consumed and duration into the store's metrics.
pub fn finalize_metrics(store: &mut Store<ProbeContext>) -> RunMetrics {
    let remaining = get_remaining_fuel(store).unwrap_or(0);
    let context = store.data_mut();

    context.metrics.fuel_consumed = context.initial_fuel.saturating_sub(remaining);
    context.metrics.duration = Some(context.start_time.elapsed());
    context.metrics.clone()
}
