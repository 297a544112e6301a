//! Calling and booting program images.
//!
//! [`ImageRunner`] drives one fresh store per run:
//!
//! 1. Create a store bounded by fuel and an epoch deadline
//! 2. Instantiate the image (it imports nothing)
//! 3. Call the computer, or boot the entry point
//! 4. Classify how the run ended and collect metrics
//!
//! A boot is the inverted case: the entry point must *not* return, so the
//! run ending on a resource bound is success and a normal return is the
//! failure.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, Serializer};
use tracing::{debug, error, info, instrument, warn};
use wasmtime::{Instance, Linker, Store, Trap};

use fibstart_common::{BootConfig, HarnessError};
use fibstart_core::EntryState;

use crate::slots::ObservableSlots;
use crate::store::{ProbeContext, RunMetrics, create_store, finalize_metrics};
use crate::{HarnessEngine, ProgramImage};

/// What stopped a booted entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The fuel budget ran out.
    FuelExhausted,
    /// The epoch deadline passed.
    Deadline,
}

/// Outcome of booting an image's entry point.
#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    /// Run identifier.
    pub run_id: String,

    /// Lifecycle state read from the image after it was stopped.
    #[serde(serialize_with = "serialize_display")]
    pub state: EntryState,

    /// Value read from the result slot.
    pub result: i32,

    /// Which bound stopped the guest.
    pub stopped_by: StopReason,

    /// Fuel consumed.
    pub fuel_consumed: u64,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl BootReport {
    /// Returns `true` if the entry point stored its result and parked.
    pub fn is_halted(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Outcome of one call to the computer.
#[derive(Debug, Clone, Serialize)]
pub struct CallOutcome {
    /// Argument passed.
    pub n: i32,

    /// Value returned.
    pub value: i32,

    /// Fuel consumed.
    pub fuel_consumed: u64,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Runs calls and boots against compiled images.
///
/// Every run gets its own [`Store`], so runs never share guest memory.
pub struct ImageRunner {
    engine: HarnessEngine,
    linker: Linker<ProbeContext>,
    config: BootConfig,
    runs: AtomicU64,
}

impl ImageRunner {
    /// Create a new runner.
    pub fn new(engine: HarnessEngine, config: BootConfig) -> Self {
        let linker = Linker::new(engine.inner());

        Self {
            engine,
            linker,
            config,
            runs: AtomicU64::new(0),
        }
    }

    /// Get the engine.
    pub fn engine(&self) -> &HarnessEngine {
        &self.engine
    }

    /// Get the boot configuration.
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Call the exported computer once with `n`.
    ///
    /// Recursion depth inside the guest equals `n`; past the engine's
    /// `max_wasm_stack` this ends in a stack-overflow [`HarnessError::Trap`].
    ///
    /// # Errors
    ///
    /// Returns an error if instantiation fails, the computer is not exported
    /// with signature `(i32) -> i32`, or the call traps or runs out of fuel.
    #[instrument(skip(self, image), fields(image = %image.content_hash()))]
    pub async fn call(&self, image: &ProgramImage, n: i32) -> Result<CallOutcome, HarnessError> {
        let run_id = self.next_run_id("call");
        let mut store = create_store(&self.engine, &self.config, run_id)?;

        let instance = self.instantiate(image, &mut store).await?;

        let symbol = &self.config.compute_symbol;
        let func = instance
            .get_typed_func::<i32, i32>(&mut store, symbol)
            .map_err(|_| HarnessError::missing_export(symbol))?;

        let result = func.call_async(&mut store, n).await;
        let metrics = finalize_metrics(&mut store);
        let duration_ms = elapsed_ms(&metrics);

        match result {
            Ok(value) => {
                info!(
                    value,
                    duration_ms,
                    fuel_consumed = metrics.fuel_consumed,
                    "Call completed"
                );
                Ok(CallOutcome {
                    n,
                    value,
                    fuel_consumed: metrics.fuel_consumed,
                    duration_ms,
                })
            }
            Err(e) => {
                let err = classify_failure(&e, duration_ms);
                warn!(error = %err, duration_ms, "Call failed");
                Err(err)
            }
        }
    }

    /// Boot the image's entry point and observe it park.
    ///
    /// The entry point is run until fuel or the deadline stops it, then the
    /// observable slots are read. A report whose state is not
    /// [`EntryState::Halted`] means the guest was stopped before it stored its
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::EntryReturned`] if the entry point returns,
    /// [`HarnessError::MissingExport`] if the entry symbol or a slot is absent,
    /// and [`HarnessError::Trap`] for any other guest trap.
    #[instrument(skip(self, image), fields(image = %image.content_hash()))]
    pub async fn boot(&self, image: &ProgramImage) -> Result<BootReport, HarnessError> {
        let symbol = &self.config.entry_symbol;
        image.require_func(symbol)?;

        let run_id = self.next_run_id("boot");
        let mut store = create_store(&self.engine, &self.config, run_id.clone())?;

        let instance = self.instantiate(image, &mut store).await?;
        let slots = ObservableSlots::resolve(&instance, &mut store, &self.config)?;

        let entry = instance
            .get_typed_func::<(), ()>(&mut store, symbol)
            .map_err(|_| HarnessError::missing_export(symbol))?;

        debug!(
            result_addr = slots.result_addr(),
            state_addr = slots.state_addr(),
            "Booting entry point"
        );

        let result = entry.call_async(&mut store, ()).await;
        let metrics = finalize_metrics(&mut store);
        let duration_ms = elapsed_ms(&metrics);

        let trap = match result {
            Ok(()) => {
                error!(duration_ms, "Entry point returned");
                return Err(HarnessError::EntryReturned {
                    symbol: symbol.clone(),
                    duration_ms,
                });
            }
            Err(e) => e,
        };

        let stopped_by = match classify_failure(&trap, duration_ms) {
            HarnessError::FuelExhausted => StopReason::FuelExhausted,
            err if err.is_interruption() => StopReason::Deadline,
            other => {
                error!(error = %other, duration_ms, "Entry point trapped");
                return Err(other);
            }
        };

        let state = slots.read_state(&store)?;
        let result = slots.read_result(&store)?;

        if state.is_terminal() {
            info!(
                result,
                ?stopped_by,
                duration_ms,
                fuel_consumed = metrics.fuel_consumed,
                "Entry point halted"
            );
        } else {
            warn!(
                %state,
                ?stopped_by,
                duration_ms,
                "Entry point stopped before reaching halt"
            );
        }

        Ok(BootReport {
            run_id,
            state,
            result,
            stopped_by,
            fuel_consumed: metrics.fuel_consumed,
            duration_ms,
        })
    }

    async fn instantiate(
        &self,
        image: &ProgramImage,
        store: &mut Store<ProbeContext>,
    ) -> Result<Instance, HarnessError> {
        debug!(run_id = %store.data().run_id, "Instantiating image");

        self.linker
            .instantiate_async(&mut *store, image.module())
            .await
            .map_err(|e| HarnessError::invalid_image(format!("Instantiation failed: {e}")))
    }

    fn next_run_id(&self, kind: &str) -> String {
        let seq = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{kind}-{seq}")
    }
}

impl std::fmt::Debug for ImageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRunner")
            .field("entry_symbol", &self.config.entry_symbol)
            .field("compute_symbol", &self.config.compute_symbol)
            .finish_non_exhaustive()
    }
}

/// Map a guest error onto the harness taxonomy. `duration_ms` is the measured
/// run time.
fn classify_failure(error: &wasmtime::Error, duration_ms: u64) -> HarnessError {
    match error.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => HarnessError::FuelExhausted,
        Some(Trap::Interrupt) => HarnessError::ExecutionTimeout { duration_ms },
        code => HarnessError::trap(error.to_string(), code.map(|trap| format!("{trap:?}"))),
    }
}

fn elapsed_ms(metrics: &RunMetrics) -> u64 {
    metrics
        .duration
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn serialize_display<S: Serializer>(state: &EntryState, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(state)
}
