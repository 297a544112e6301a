//! Wasmtime engine configuration and epoch ticking.
//!
//! The [`HarnessEngine`] is configured so that a guest which never returns can
//! still be stopped:
//! - **Fuel metering**: deterministic instruction budget per store
//! - **Epoch interruption**: wall-clock deadline, advanced by a shared ticker thread
//! - **Async support**: guests run through `call_async`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};
use wasmtime::{Config, Engine, OptLevel};

use fibstart_common::{EngineConfig, HarnessError};

/// Thread-safe WebAssembly engine wrapper.
///
/// With epoch interruption enabled the engine owns a single epoch ticker thread,
/// shared by every clone and every run. Store deadlines are counted in its
/// ticks, so concurrent runs do not shorten each other's deadline.
///
/// # Example
///
/// ```ignore
/// use fibstart_common::EngineConfig;
/// use fibstart_harness::HarnessEngine;
///
/// let engine = HarnessEngine::new(&EngineConfig::default())?;
/// ```
#[derive(Clone)]
pub struct HarnessEngine {
    engine: Arc<Engine>,
    config: EngineConfig,
    ticker: Option<Arc<EpochTicker>>,
}

impl HarnessEngine {
    /// Create a new engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime configuration is rejected or the
    /// epoch ticker thread cannot be spawned.
    pub fn new(config: &EngineConfig) -> Result<Self, HarnessError> {
        if config.epoch_tick_ms == 0 {
            return Err(HarnessError::invalid_config("epoch_tick_ms must be non-zero"));
        }

        let mut wasmtime_config = Config::new();

        wasmtime_config.async_support(true);
        wasmtime_config.consume_fuel(true);

        if config.epoch_interruption {
            wasmtime_config.epoch_interruption(true);
        }

        wasmtime_config.cranelift_opt_level(if config.optimize {
            OptLevel::Speed
        } else {
            OptLevel::None
        });

        // Deep recursion in the guest traps with a stack overflow instead of
        // taking the host down.
        wasmtime_config.max_wasm_stack(config.max_wasm_stack);

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            HarnessError::invalid_config(format!("Failed to create Wasmtime engine: {e}"))
        })?;

        let engine = Arc::new(engine);

        let ticker = if config.epoch_interruption {
            Some(Arc::new(EpochTicker::spawn(Arc::clone(&engine), config)?))
        } else {
            None
        };

        info!(
            epoch_interruption = config.epoch_interruption,
            max_wasm_stack = config.max_wasm_stack,
            "Wasmtime engine initialized"
        );

        Ok(Self {
            engine,
            config: config.clone(),
            ticker,
        })
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for HarnessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessEngine")
            .field("epoch_interruption", &self.config.epoch_interruption)
            .field("epoch_tick_ms", &self.config.epoch_tick_ms)
            .field("max_wasm_stack", &self.config.max_wasm_stack)
            .field("ticking", &self.ticker.is_some())
            .finish_non_exhaustive()
    }
}

/// Background epoch ticker.
///
/// A guest spinning in a loop never yields to an async executor, so the
/// ticker runs on a plain OS thread. It stops and joins its thread when the
/// last engine clone is dropped.
struct EpochTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EpochTicker {
    fn spawn(engine: Arc<Engine>, config: &EngineConfig) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let tick = config.epoch_tick();

        let handle = thread::Builder::new()
            .name("fibstart-epoch".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || {
                    while !stop.load(Ordering::Relaxed) {
                        thread::sleep(tick);
                        engine.increment_epoch();
                    }
                }
            })?;

        debug!(tick_ms = tick.as_millis(), "Epoch ticker started");

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        debug!("Epoch ticker stopped");
    }
}
