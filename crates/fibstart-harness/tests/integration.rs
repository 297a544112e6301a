//! Integration tests for fibstart-harness.
//!
//! These tests drive complete runs against WAT images laid out like the
//! `wasm32` build of the freestanding image:
//! - `fibonacci` export computing by double recursion
//! - `FIB_RESULT` / `FIB_ENTRY_STATE` globals holding slot addresses
//! - `_start` storing the result and spinning forever

use std::sync::Arc;

use fibstart_common::{BootConfig, EngineConfig, HarnessError};
use fibstart_core::{ENTRY_ARGUMENT, EntryState, fibonacci};
use fibstart_harness::{HarnessEngine, ImageRunner, ProgramImage, StopReason};

/// Reference image whose entry point computes `fibonacci(entry_argument)`.
fn reference_image_wat(entry_argument: i32) -> String {
    format!(
        r#"
        (module
            (memory (export "memory") 1)
            (global $result_addr i32 (i32.const 1024))
            (global $state_addr i32 (i32.const 1028))
            (export "FIB_RESULT" (global $result_addr))
            (export "FIB_ENTRY_STATE" (global $state_addr))

            (func $fibonacci (export "fibonacci") (param $n i32) (result i32)
                (if (result i32) (i32.le_s (local.get $n) (i32.const 1))
                    (then (local.get $n))
                    (else
                        (i32.add
                            (call $fibonacci (i32.sub (local.get $n) (i32.const 1)))
                            (call $fibonacci (i32.sub (local.get $n) (i32.const 2)))))))

            (func (export "_start")
                (i32.store (global.get $state_addr) (i32.const {running}))
                (i32.store (global.get $result_addr) (call $fibonacci (i32.const {entry_argument})))
                (i32.store (global.get $state_addr) (i32.const {halted}))
                (loop $halt (br $halt)))
        )
        "#,
        running = EntryState::RUNNING_MARK,
        halted = EntryState::HALTED_MARK,
    )
}

fn engine(epoch_interruption: bool) -> HarnessEngine {
    HarnessEngine::new(&EngineConfig {
        epoch_interruption,
        ..Default::default()
    })
    .unwrap()
}

fn runner_with(engine: HarnessEngine, boot: BootConfig) -> (ImageRunner, ProgramImage) {
    let image =
        ProgramImage::from_wat(engine.inner(), &reference_image_wat(ENTRY_ARGUMENT)).unwrap();
    (ImageRunner::new(engine, boot), image)
}

// ============================================================================
// Test: Boot
// ============================================================================

#[tokio::test]
async fn test_boot_halts_with_result() {
    let (runner, image) = runner_with(engine(true), BootConfig::default());

    let report = runner.boot(&image).await.unwrap();

    assert!(report.is_halted(), "expected halt, got {report:?}");
    assert_eq!(report.state, EntryState::Halted);
    assert_eq!(report.result, 1);
    assert_eq!(report.result, fibonacci(ENTRY_ARGUMENT));
    assert!(report.fuel_consumed > 0);
}

#[tokio::test]
async fn test_boot_stopped_by_fuel() {
    let boot = BootConfig {
        max_fuel: 50_000,
        ..Default::default()
    };
    let (runner, image) = runner_with(engine(false), boot);

    let report = runner.boot(&image).await.unwrap();

    assert_eq!(report.stopped_by, StopReason::FuelExhausted);
    assert!(report.is_halted());
    assert_eq!(report.result, 1);
}

#[tokio::test]
async fn test_boot_stopped_by_deadline() {
    let boot = BootConfig {
        fuel_metering: false,
        timeout_ms: 50,
        ..Default::default()
    };
    let (runner, image) = runner_with(engine(true), boot);

    let report = runner.boot(&image).await.unwrap();

    // The deadline elapsing, not a return, ends the boot.
    assert_eq!(report.stopped_by, StopReason::Deadline);
    assert!(report.duration_ms >= 40, "stopped after {}ms", report.duration_ms);
    assert!(report.is_halted());
    assert_eq!(report.result, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_boots_keep_full_deadline() {
    let boot = BootConfig {
        fuel_metering: false,
        timeout_ms: 200,
        ..Default::default()
    };
    let (runner, image) = runner_with(engine(true), boot);
    let runner = Arc::new(runner);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let runner = Arc::clone(&runner);
            let image = image.clone();
            tokio::spawn(async move { runner.boot(&image).await })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.stopped_by, StopReason::Deadline);
        assert!(report.duration_ms >= 180, "stopped after {}ms", report.duration_ms);
        assert!(report.is_halted());
    }
}

#[tokio::test]
async fn test_boot_interrupted_before_halt() {
    let engine = engine(false);
    let image = ProgramImage::from_wat(engine.inner(), &reference_image_wat(40)).unwrap();
    let runner = ImageRunner::new(
        engine,
        BootConfig {
            max_fuel: 10_000,
            ..Default::default()
        },
    );

    let report = runner.boot(&image).await.unwrap();

    assert_eq!(report.state, EntryState::Running);
    assert!(!report.is_halted());
    assert_eq!(report.result, 0);
}

#[tokio::test]
async fn test_boot_entry_returns() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (global (export "FIB_RESULT") i32 (i32.const 0))
            (global (export "FIB_ENTRY_STATE") i32 (i32.const 4))
            (func (export "_start")
                (i32.store (i32.const 0) (i32.const 1)))
        )
    "#;
    let engine = engine(true);
    let image = ProgramImage::from_wat(engine.inner(), wat).unwrap();
    let runner = ImageRunner::new(engine, BootConfig::default());

    let result = runner.boot(&image).await;

    let err = result.unwrap_err();
    assert!(err.is_contract_violation(), "expected EntryReturned, got {err:?}");
}

#[tokio::test]
async fn test_boot_entry_traps() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (global (export "FIB_RESULT") i32 (i32.const 0))
            (global (export "FIB_ENTRY_STATE") i32 (i32.const 4))
            (func (export "_start") unreachable)
        )
    "#;
    let engine = engine(true);
    let image = ProgramImage::from_wat(engine.inner(), wat).unwrap();
    let runner = ImageRunner::new(engine, BootConfig::default());

    let result = runner.boot(&image).await;

    match result {
        Err(HarnessError::Trap { code, .. }) => {
            assert_eq!(code.as_deref(), Some("UnreachableCodeReached"));
        }
        other => panic!("expected trap, got {other:?}"),
    }
}

#[tokio::test]
async fn test_boot_missing_entry() {
    let wat = r#"(module (memory (export "memory") 1))"#;
    let engine = engine(true);
    let image = ProgramImage::from_wat(engine.inner(), wat).unwrap();
    let runner = ImageRunner::new(engine, BootConfig::default());

    let result = runner.boot(&image).await;

    assert!(matches!(
        result,
        Err(HarnessError::MissingExport { ref name }) if name == "_start"
    ));
}

#[tokio::test]
async fn test_boot_missing_slots() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (func (export "_start") (loop $halt (br $halt)))
        )
    "#;
    let engine = engine(true);
    let image = ProgramImage::from_wat(engine.inner(), wat).unwrap();
    let runner = ImageRunner::new(engine, BootConfig::default());

    let result = runner.boot(&image).await;

    assert!(matches!(
        result,
        Err(HarnessError::MissingExport { ref name }) if name == "FIB_RESULT"
    ));
}

// ============================================================================
// Test: Call
// ============================================================================

#[tokio::test]
async fn test_call_matches_native_computer() {
    let (runner, image) = runner_with(engine(true), BootConfig::default());

    for n in 0..=20 {
        let outcome = runner.call(&image, n).await.unwrap();
        assert_eq!(outcome.value, fibonacci(n), "mismatch at n = {n}");
    }
}

#[tokio::test]
async fn test_call_scenarios() {
    let (runner, image) = runner_with(engine(true), BootConfig::default());

    assert_eq!(runner.call(&image, 0).await.unwrap().value, 0);
    assert_eq!(runner.call(&image, 1).await.unwrap().value, 1);
    assert_eq!(runner.call(&image, 2).await.unwrap().value, 1);
    assert_eq!(runner.call(&image, 10).await.unwrap().value, 55);
    assert_eq!(runner.call(&image, -5).await.unwrap().value, -5);
}

#[tokio::test]
async fn test_call_fuel_exhausted() {
    let boot = BootConfig {
        max_fuel: 1_000,
        ..Default::default()
    };
    let (runner, image) = runner_with(engine(false), boot);

    let result = runner.call(&image, 25).await;

    assert!(matches!(result, Err(HarnessError::FuelExhausted)));
}

#[tokio::test]
async fn test_call_default_budget_covers_thirty() {
    let (runner, image) = runner_with(engine(false), BootConfig::default());

    let outcome = runner.call(&image, 30).await.unwrap();

    assert_eq!(outcome.value, 832_040);
    assert_eq!(outcome.value, fibonacci(30));
}

#[tokio::test]
async fn test_call_deadline_reports_elapsed() {
    let wat = r#"
        (module
            (func (export "fibonacci") (param i32) (result i32)
                (loop $spin (br $spin))
                unreachable)
        )
    "#;
    let engine = engine(true);
    let image = ProgramImage::from_wat(engine.inner(), wat).unwrap();
    let runner = ImageRunner::new(
        engine,
        BootConfig {
            fuel_metering: false,
            timeout_ms: 50,
            ..Default::default()
        },
    );

    let result = runner.call(&image, 1).await;

    match result {
        Err(HarnessError::ExecutionTimeout { duration_ms }) => {
            assert!(duration_ms >= 40, "timed out after {duration_ms}ms");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_call_stack_exhaustion_traps() {
    let engine = HarnessEngine::new(&EngineConfig {
        epoch_interruption: false,
        max_wasm_stack: 64 * 1024,
        ..Default::default()
    })
    .unwrap();
    let boot = BootConfig {
        fuel_metering: false,
        ..Default::default()
    };
    let (runner, image) = runner_with(engine, boot);

    let result = runner.call(&image, 1_000_000).await;

    match result {
        Err(HarnessError::Trap { code, .. }) => {
            assert_eq!(code.as_deref(), Some("StackOverflow"));
        }
        other => panic!("expected stack overflow, got {other:?}"),
    }
}

#[tokio::test]
async fn test_call_missing_computer() {
    let wat = r#"(module (func (export "fibonacci") (param i64) (result i64) local.get 0))"#;
    let engine = engine(true);
    let image = ProgramImage::from_wat(engine.inner(), wat).unwrap();
    let runner = ImageRunner::new(engine, BootConfig::default());

    let result = runner.call(&image, 3).await;

    assert!(matches!(result, Err(HarnessError::MissingExport { .. })));
}

// ============================================================================
// Test: Built image
// ============================================================================

/// Boots the real `wasm32` build of the image crate.
///
/// Build it with
/// `cargo build --release --target wasm32-unknown-unknown --manifest-path guest/fibstart-image/Cargo.toml`
/// and run with `FIBSTART_IMAGE=<path to fibstart_image.wasm> cargo test -- --ignored`.
#[tokio::test]
#[ignore = "requires FIBSTART_IMAGE pointing at a wasm32 build of the image"]
async fn test_boot_built_image() {
    let path = std::env::var("FIBSTART_IMAGE").expect("FIBSTART_IMAGE not set");
    let engine = engine(true);
    let image = ProgramImage::from_file(engine.inner(), &path).unwrap();
    let runner = ImageRunner::new(engine, BootConfig::default());

    let report = runner.boot(&image).await.unwrap();
    assert!(report.is_halted());
    assert_eq!(report.result, 1);

    let outcome = runner.call(&image, 10).await.unwrap();
    assert_eq!(outcome.value, 55);
}
