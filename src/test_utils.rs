//! Test utilities for the stream layer.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Async test runners built on `futures_lite::future::block_on`
//! - Wakers that count their wakeups
//! - Scripted stream halves and resources that record what was called
//!
//! # Example
//! ```ignore
//! use asupersync_streams::test_utils::{init_test_logging, run_test_with_cx};
//!
//! fn my_async_test() {
//!     init_test_logging();
//!     run_test_with_cx(|cx| async move {
//!         // async test code
//!     });
//! }
//! ```

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::stream::traits::{AsyncResource, ReceiveStream, SendStream};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::task::{Wake, Waker};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
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
    let cx: Cx = Cx::for_testing();
    futures_lite::future::block_on(f(cx));
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
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
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

// =============================================================================
// Wakers
// =============================================================================

struct CountingWake {
    count: Arc<AtomicUsize>,
}

impl Wake for CountingWake {
    fn wake(self: Arc<Self>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns a waker and the counter it bumps each time it is woken.
#[must_use]
pub fn counting_waker() -> (Waker, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let waker = Waker::from(Arc::new(CountingWake {
        count: Arc::clone(&count),
    }));
    (waker, count)
}

// =============================================================================
// Scripted resources
// =============================================================================

/// A send half that records every call and can be scripted to fail on close.
#[derive(Debug, Default)]
pub struct RecordingSendStream {
    log: Vec<String>,
    half_close: bool,
    close_error: Option<Error>,
    closed: bool,
    eof_sent: bool,
}

impl RecordingSendStream {
    /// Creates an open send half without half-close support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables native `send_eof`.
    #[must_use]
    pub fn with_half_close(mut self) -> Self {
        self.half_close = true;
        self
    }

    /// Makes `close` mark the half closed and then return `err`.
    #[must_use]
    pub fn failing_close(mut self, err: Error) -> Self {
        self.close_error = Some(err);
        self
    }

    /// Returns the calls made so far, oldest first.
    #[must_use]
    pub fn log(&self) -> Vec<String> {
        self.log.clone()
    }

    /// Returns true once `close` has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns true once native `send_eof` has run.
    #[must_use]
    pub const fn eof_sent(&self) -> bool {
        self.eof_sent
    }
}

impl AsyncResource for RecordingSendStream {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.log.push("close".to_string());
            self.closed = true;
            if let Some(err) = self.close_error.clone() {
                return Err(err);
            }
            cx.checkpoint()
        }
    }
}

impl SendStream for RecordingSendStream {
    fn send_all(&mut self, cx: &Cx, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.log
                .push(format!("send_all:{}", String::from_utf8_lossy(data)));
            cx.checkpoint()?;
            if self.closed || self.eof_sent {
                return Err(Error::closed_stream());
            }
            Ok(())
        }
    }

    fn wait_send_all_might_not_block(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.log.push("wait_send_all_might_not_block".to_string());
            cx.checkpoint()
        }
    }

    fn send_eof_if_supported(
        &mut self,
        cx: &Cx,
    ) -> Option<impl Future<Output = Result<()>> + Send> {
        if !self.half_close {
            return None;
        }
        Some(async move {
            self.log.push("send_eof".to_string());
            self.eof_sent = true;
            cx.checkpoint()
        })
    }
}

/// A receive half that serves scripted bytes and records every call.
#[derive(Debug, Default)]
pub struct RecordingReceiveStream {
    log: Vec<String>,
    data: VecDeque<u8>,
    close_error: Option<Error>,
    closed: bool,
}

impl RecordingReceiveStream {
    /// Creates an open receive half with nothing to read (reads see EOF).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes for later reads.
    #[must_use]
    pub fn with_data(mut self, data: &[u8]) -> Self {
        self.data.extend(data);
        self
    }

    /// Makes `close` mark the half closed and then return `err`.
    #[must_use]
    pub fn failing_close(mut self, err: Error) -> Self {
        self.close_error = Some(err);
        self
    }

    /// Returns the calls made so far, oldest first.
    #[must_use]
    pub fn log(&self) -> Vec<String> {
        self.log.clone()
    }

    /// Returns true once `close` has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl AsyncResource for RecordingReceiveStream {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.log.push("close".to_string());
            self.closed = true;
            if let Some(err) = self.close_error.clone() {
                return Err(err);
            }
            cx.checkpoint()
        }
    }
}

impl ReceiveStream for RecordingReceiveStream {
    fn receive_some(
        &mut self,
        cx: &Cx,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move {
            self.log.push(format!("receive_some:{max_bytes}"));
            cx.checkpoint()?;
            if self.closed {
                return Err(Error::closed_stream());
            }
            let n = max_bytes.min(self.data.len());
            Ok(self.data.drain(..n).collect())
        }
    }
}

/// A resource whose graceful close waits for a peer that never answers.
///
/// Its close releases first, then waits for cancellation, like a transport
/// that sends a goodbye and then waits for the acknowledgement.
#[derive(Debug, Default)]
pub struct SlowCloseResource {
    released: bool,
    error: Option<Error>,
}

impl SlowCloseResource {
    /// Creates an unreleased resource.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `close` fail with `err` before reaching any checkpoint.
    #[must_use]
    pub fn failing_with(mut self, err: Error) -> Self {
        self.error = Some(err);
        self
    }

    /// Returns true once `close` has released the resource.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }
}

impl AsyncResource for SlowCloseResource {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.released = true;
            if let Some(err) = self.error.clone() {
                return Err(err);
            }
            cx.cancelled().await;
            cx.checkpoint()
        }
    }
}
