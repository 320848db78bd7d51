//! A bidirectional stream built from two unidirectional halves.
//!
//! [`StapledStream`] owns one [`SendStream`] and one [`ReceiveStream`] and
//! forwards every operation to the half it belongs to. It adds no buffering,
//! no synchronization and no state of its own.
//!
//! # Close Ordering
//!
//! `close` always closes both halves, send half first. When the send half
//! fails, the receive half is still closed before the send error is
//! returned. Use [`StapledStream::close_each`] to see both results.
//!
//! # Example
//!
//! ```
//! use asupersync_streams::stream::memory::memory_stream_one_way_pair;
//! use asupersync_streams::{Cx, ReceiveStream, SendStream, StapledStream};
//!
//! # futures_lite::future::block_on(async {
//! let cx = Cx::for_testing();
//! let (to_b, from_a) = memory_stream_one_way_pair();
//! let (to_a, from_b) = memory_stream_one_way_pair();
//! let mut a = StapledStream::new(to_b, from_b);
//! let mut b = StapledStream::new(to_a, from_a);
//!
//! a.send_all(&cx, b"x").await?;
//! assert_eq!(b.receive_some(&cx, 1).await?, b"x");
//! # Ok::<(), asupersync_streams::Error>(())
//! # }).unwrap();
//! ```

use crate::cx::Cx;
use crate::error::Result;
use crate::stream::traits::{AsyncResource, HalfCloseableStream, ReceiveStream, SendStream};
use crate::tracing_compat::{debug, warn};
use std::future::Future;

/// Composes a send half and a receive half into one bidirectional stream.
#[derive(Debug)]
pub struct StapledStream<S, R> {
    /// The underlying send half.
    pub send_stream: S,
    /// The underlying receive half.
    pub receive_stream: R,
}

impl<S, R> StapledStream<S, R> {
    /// Staples `send_stream` and `receive_stream` together.
    #[must_use]
    pub const fn new(send_stream: S, receive_stream: R) -> Self {
        Self {
            send_stream,
            receive_stream,
        }
    }

    /// Returns a reference to the send half.
    #[must_use]
    pub const fn send_half(&self) -> &S {
        &self.send_stream
    }

    /// Returns a mutable reference to the send half.
    pub fn send_half_mut(&mut self) -> &mut S {
        &mut self.send_stream
    }

    /// Returns a reference to the receive half.
    #[must_use]
    pub const fn receive_half(&self) -> &R {
        &self.receive_stream
    }

    /// Returns a mutable reference to the receive half.
    pub fn receive_half_mut(&mut self) -> &mut R {
        &mut self.receive_stream
    }

    /// Splits the staple back into its halves.
    #[must_use]
    pub fn into_parts(self) -> (S, R) {
        (self.send_stream, self.receive_stream)
    }
}

impl<S: SendStream, R: ReceiveStream> StapledStream<S, R> {
    /// Closes both halves and returns each half's result.
    ///
    /// The send half is closed first; the receive half is closed whatever
    /// the send half returned.
    pub async fn close_each(&mut self, cx: &Cx) -> (Result<()>, Result<()>) {
        let send_result = self.send_stream.close(cx).await;
        let receive_result = self.receive_stream.close(cx).await;
        (send_result, receive_result)
    }
}

impl<S: SendStream, R: ReceiveStream> AsyncResource for StapledStream<S, R> {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            match self.close_each(cx).await {
                (Err(send_err), Err(receive_err)) => {
                    warn!(
                        send_error = %send_err,
                        receive_error = %receive_err,
                        "both halves failed to close; returning send half error"
                    );
                    drop(receive_err);
                    Err(send_err)
                }
                (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
                (Ok(()), Ok(())) => Ok(()),
            }
        }
    }
}

impl<S: SendStream, R: ReceiveStream> SendStream for StapledStream<S, R> {
    fn send_all(&mut self, cx: &Cx, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        self.send_stream.send_all(cx, data)
    }

    fn wait_send_all_might_not_block(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Result<()>> + Send {
        self.send_stream.wait_send_all_might_not_block(cx)
    }

    fn send_eof_if_supported(
        &mut self,
        cx: &Cx,
    ) -> Option<impl Future<Output = Result<()>> + Send> {
        Some(self.send_eof(cx))
    }
}

impl<S: SendStream, R: ReceiveStream> ReceiveStream for StapledStream<S, R> {
    fn receive_some(
        &mut self,
        cx: &Cx,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        self.receive_stream.receive_some(cx, max_bytes)
    }
}

impl<S: SendStream, R: ReceiveStream> HalfCloseableStream for StapledStream<S, R> {
    fn send_eof(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            if let Some(eof) = self.send_stream.send_eof_if_supported(cx) {
                return eof.await;
            }
            debug!("send half has no half-close; closing it instead");
            self.send_stream.close(cx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::test_utils::{init_test_logging, RecordingReceiveStream, RecordingSendStream};
    use futures_lite::future::block_on;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn send_all_forwards_to_send_half() {
        init_test("send_all_forwards_to_send_half");
        let cx = Cx::for_testing();
        let mut stapled =
            StapledStream::new(RecordingSendStream::new(), RecordingReceiveStream::new());

        block_on(stapled.send_all(&cx, b"hello")).expect("send");
        block_on(stapled.wait_send_all_might_not_block(&cx)).expect("wait");

        let log = stapled.send_half().log();
        crate::assert_with_log!(
            log == ["send_all:hello", "wait_send_all_might_not_block"],
            "send half saw both calls",
            "[send_all:hello, wait]",
            log
        );
        let rlog = stapled.receive_half().log();
        crate::assert_with_log!(rlog.is_empty(), "receive half untouched", 0, rlog.len());
        crate::test_complete!("send_all_forwards_to_send_half");
    }

    #[test]
    fn receive_some_forwards_argument_unchanged() {
        init_test("receive_some_forwards_argument_unchanged");
        let cx = Cx::for_testing();
        let mut stapled = StapledStream::new(
            RecordingSendStream::new(),
            RecordingReceiveStream::new().with_data(b"xyz"),
        );

        let data = block_on(stapled.receive_some(&cx, 2)).expect("receive");
        crate::assert_with_log!(data == b"xy", "limited read", b"xy", data);
        let log = stapled.receive_half().log();
        crate::assert_with_log!(
            log == ["receive_some:2"],
            "max_bytes forwarded",
            "[receive_some:2]",
            log
        );
        crate::test_complete!("receive_some_forwards_argument_unchanged");
    }

    #[test]
    fn send_eof_uses_native_half_close() {
        init_test("send_eof_uses_native_half_close");
        let cx = Cx::for_testing();
        let mut stapled = StapledStream::new(
            RecordingSendStream::new().with_half_close(),
            RecordingReceiveStream::new(),
        );

        block_on(stapled.send_eof(&cx)).expect("send_eof");
        let log = stapled.send_half().log();
        crate::assert_with_log!(log == ["send_eof"], "native eof", "[send_eof]", log);
        let closed = stapled.send_half().is_closed();
        crate::assert_with_log!(!closed, "send half not closed", false, closed);
        crate::test_complete!("send_eof_uses_native_half_close");
    }

    #[test]
    fn send_eof_falls_back_to_close() {
        init_test("send_eof_falls_back_to_close");
        let cx = Cx::for_testing();
        let mut stapled =
            StapledStream::new(RecordingSendStream::new(), RecordingReceiveStream::new());

        block_on(stapled.send_eof(&cx)).expect("send_eof");
        let log = stapled.send_half().log();
        crate::assert_with_log!(log == ["close"], "fell back to close", "[close]", log);
        let receive_closed = stapled.receive_half().is_closed();
        crate::assert_with_log!(
            !receive_closed,
            "receive half stays open",
            false,
            receive_closed
        );
        crate::test_complete!("send_eof_falls_back_to_close");
    }

    #[test]
    fn close_closes_receive_half_after_send_failure() {
        init_test("close_closes_receive_half_after_send_failure");
        let cx = Cx::for_testing();
        let mut stapled = StapledStream::new(
            RecordingSendStream::new().failing_close(Error::broken_stream()),
            RecordingReceiveStream::new(),
        );

        let err = block_on(stapled.close(&cx)).expect_err("send close fails");
        crate::assert_with_log!(
            err.kind() == ErrorKind::BrokenStream,
            "send error surfaces",
            ErrorKind::BrokenStream,
            err.kind()
        );
        let closed = stapled.receive_half().is_closed();
        crate::assert_with_log!(closed, "receive half closed anyway", true, closed);
        crate::test_complete!("close_closes_receive_half_after_send_failure");
    }

    #[test]
    fn close_prefers_send_error_when_both_fail() {
        init_test("close_prefers_send_error_when_both_fail");
        let cx = Cx::for_testing();
        let mut stapled = StapledStream::new(
            RecordingSendStream::new().failing_close(Error::broken_stream()),
            RecordingReceiveStream::new().failing_close(Error::internal("receive failed")),
        );

        let err = block_on(stapled.close(&cx)).expect_err("close fails");
        crate::assert_with_log!(
            err.is_broken_stream(),
            "send error wins",
            ErrorKind::BrokenStream,
            err.kind()
        );
        crate::test_complete!("close_prefers_send_error_when_both_fail");
    }

    #[test]
    fn close_surfaces_receive_error_alone() {
        init_test("close_surfaces_receive_error_alone");
        let cx = Cx::for_testing();
        let mut stapled = StapledStream::new(
            RecordingSendStream::new(),
            RecordingReceiveStream::new().failing_close(Error::internal("receive failed")),
        );

        let err = block_on(stapled.close(&cx)).expect_err("close fails");
        crate::assert_with_log!(
            err.kind() == ErrorKind::Internal,
            "receive error surfaces",
            ErrorKind::Internal,
            err.kind()
        );
        let send_closed = stapled.send_half().is_closed();
        crate::assert_with_log!(send_closed, "send half closed", true, send_closed);
        crate::test_complete!("close_surfaces_receive_error_alone");
    }

    #[test]
    fn close_each_reports_both_results() {
        init_test("close_each_reports_both_results");
        let cx = Cx::for_testing();
        let mut stapled = StapledStream::new(
            RecordingSendStream::new().failing_close(Error::broken_stream()),
            RecordingReceiveStream::new().failing_close(Error::internal("receive failed")),
        );

        let (send, receive) = block_on(stapled.close_each(&cx));
        let kinds = (
            send.as_ref().map_err(Error::kind).err(),
            receive.as_ref().map_err(Error::kind).err(),
        );
        crate::assert_with_log!(
            kinds == (Some(ErrorKind::BrokenStream), Some(ErrorKind::Internal)),
            "both errors visible",
            "(BrokenStream, Internal)",
            kinds
        );
        crate::test_complete!("close_each_reports_both_results");
    }

    #[test]
    fn nested_staple_advertises_half_close() {
        init_test("nested_staple_advertises_half_close");
        let cx = Cx::for_testing();
        let inner = StapledStream::new(
            RecordingSendStream::new().with_half_close(),
            RecordingReceiveStream::new(),
        );
        let mut outer = StapledStream::new(inner, RecordingReceiveStream::new());

        block_on(outer.send_eof(&cx)).expect("send_eof");
        let log = outer.send_half().send_half().log();
        crate::assert_with_log!(
            log == ["send_eof"],
            "eof reached innermost half",
            "[send_eof]",
            log
        );
        crate::test_complete!("nested_staple_advertises_half_close");
    }

    #[test]
    fn into_parts_returns_halves() {
        init_test("into_parts_returns_halves");
        let stapled = StapledStream::new(1_u8, "receive");
        let (send, receive) = stapled.into_parts();
        crate::assert_with_log!(
            send == 1 && receive == "receive",
            "parts",
            (1, "receive"),
            (send, receive)
        );
        crate::test_complete!("into_parts_returns_halves");
    }
}
