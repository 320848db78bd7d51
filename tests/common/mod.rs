#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! #[macro_use]
//! mod common;
//! use common::*;
//! ```

use asupersync_streams::{AsyncResource, Cx, Error, ReceiveStream, Result, SendStream};
use parking_lot::Mutex;
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "ASUPERSYNC_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }

    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }

    None
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Run async test code with a fresh root `Cx`.
pub fn run_test_with_cx<F, Fut>(f: F)
where
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = ()>,
{
    init_test_logging();
    futures_lite::future::block_on(f(Cx::for_testing()));
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

// ============================================================================
// Scripted halves
// ============================================================================

/// A flag shared between a scripted half and the test that inspects it after
/// the half has been moved into a staple.
#[derive(Debug, Clone, Default)]
pub struct Flag(Arc<AtomicBool>);

impl Flag {
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Close calls from several halves, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct CloseLog(Arc<Mutex<Vec<&'static str>>>);

impl CloseLog {
    pub fn record(&self, event: &'static str) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }
}

/// A send half without half-close whose close can be scripted to fail.
#[derive(Debug, Default)]
pub struct ScriptedSendStream {
    pub closed: Flag,
    pub close_error: Option<Error>,
    pub close_log: CloseLog,
}

impl AsyncResource for ScriptedSendStream {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.close_log.record("send_close");
            self.closed.set();
            if let Some(err) = self.close_error.clone() {
                return Err(err);
            }
            cx.checkpoint()
        }
    }
}

impl SendStream for ScriptedSendStream {
    fn send_all(&mut self, cx: &Cx, _data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        async move {
            cx.checkpoint()?;
            if self.closed.is_set() {
                return Err(Error::closed_stream());
            }
            Ok(())
        }
    }

    fn wait_send_all_might_not_block(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Result<()>> + Send {
        async move { cx.checkpoint() }
    }
}

/// A receive half that only records when it was closed.
#[derive(Debug, Default)]
pub struct ScriptedReceiveStream {
    pub closed: Flag,
    pub close_log: CloseLog,
}

impl AsyncResource for ScriptedReceiveStream {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.close_log.record("receive_close");
            self.closed.set();
            cx.checkpoint()
        }
    }
}

impl ReceiveStream for ScriptedReceiveStream {
    fn receive_some(
        &mut self,
        cx: &Cx,
        _max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move {
            cx.checkpoint()?;
            if self.closed.is_set() {
                return Err(Error::closed_stream());
            }
            Ok(Vec::new())
        }
    }
}

/// A resource whose graceful close never finishes on its own.
///
/// It releases first and then waits for cancellation, the way a transport
/// waits for a goodbye acknowledgement.
#[derive(Debug, Default)]
pub struct StuckCloseResource {
    pub released: Flag,
}

impl AsyncResource for StuckCloseResource {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.released.set();
            cx.cancelled().await;
            cx.checkpoint()
        }
    }
}
