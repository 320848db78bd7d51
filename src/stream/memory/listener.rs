//! In-memory listener.
//!
//! A [`MemoryListener`] yields streams that test code injects through a
//! [`MemoryConnector`]. It follows the same close contract as a socket
//! listener: after a local close every `accept` fails with
//! `ClosedListener`.

use crate::cx::{CancelWaiter, Cx};
use crate::error::{Error, Result};
use crate::stream::traits::{AsyncResource, Listener};
use crate::tracing_compat::{debug, trace};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::{poll_fn, Future};
use std::sync::Arc;
use std::task::{Poll, Waker};

struct ListenerState<S> {
    queue: VecDeque<S>,
    closed: bool,
    waker: Option<Waker>,
}

/// A listener that accepts streams injected in memory.
pub struct MemoryListener<S> {
    shared: Arc<Mutex<ListenerState<S>>>,
    closed: bool,
}

/// Handle used to queue streams on a [`MemoryListener`].
pub struct MemoryConnector<S> {
    shared: Arc<Mutex<ListenerState<S>>>,
}

impl<S> MemoryListener<S> {
    /// Creates an open listener with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(ListenerState {
                queue: VecDeque::new(),
                closed: false,
                waker: None,
            })),
            closed: false,
        }
    }

    /// Returns a handle that can queue streams while `accept` is pending.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector<S> {
        MemoryConnector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queues a stream for a later `accept`.
    ///
    /// Returns the stream back if the listener is closed.
    pub fn inject(&self, stream: S) -> std::result::Result<(), S> {
        inject(&self.shared, stream)
    }

    /// Returns the number of queued streams.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Returns true once `close` has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn release(&mut self) -> VecDeque<S> {
        self.closed = true;
        let mut state = self.shared.lock();
        state.closed = true;
        state.waker = None;
        std::mem::take(&mut state.queue)
    }
}

impl<S> MemoryConnector<S> {
    /// Queues a stream on the listener.
    ///
    /// Returns the stream back if the listener is closed.
    pub fn inject(&self, stream: S) -> std::result::Result<(), S> {
        inject(&self.shared, stream)
    }
}

fn inject<S>(shared: &Mutex<ListenerState<S>>, stream: S) -> std::result::Result<(), S> {
    let waker = {
        let mut state = shared.lock();
        if state.closed {
            return Err(stream);
        }
        state.queue.push_back(stream);
        trace!(pending = state.queue.len(), "memory listener queued stream");
        state.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake();
    }
    Ok(())
}

impl<S> Default for MemoryListener<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for MemoryConnector<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for MemoryListener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryListener")
            .field("pending", &self.pending())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<S> fmt::Debug for MemoryConnector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnector").finish_non_exhaustive()
    }
}

impl<S: AsyncResource> AsyncResource for MemoryListener<S> {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            let dropped = self.release();
            debug!(dropped = dropped.len(), "memory listener closed");
            drop(dropped);
            cx.checkpoint()
        }
    }
}

impl<S: AsyncResource> Listener for MemoryListener<S> {
    type Stream = S;

    fn accept(&mut self, cx: &Cx) -> impl Future<Output = Result<S>> + Send {
        async move {
            cx.checkpoint()?;
            if self.closed {
                return Err(Error::closed_listener());
            }

            let shared = &self.shared;
            let mut waiter = CancelWaiter::new();
            poll_fn(|task| {
                {
                    let mut state = shared.lock();
                    if let Some(stream) = state.queue.pop_front() {
                        return Poll::Ready(Ok(stream));
                    }
                    state.waker = Some(task.waker().clone());
                }
                waiter.register(cx, task.waker());
                match cx.checkpoint() {
                    Ok(()) => Poll::Pending,
                    Err(err) => Poll::Ready(Err(err)),
                }
            })
            .await
        }
    }
}

impl<S> Drop for MemoryListener<S> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::memory::{memory_stream_pair, MemoryStream};
    use crate::stream::traits::{ReceiveStream, SendStream};
    use crate::test_utils::init_test_logging;
    use futures_lite::future;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn accept_is_fifo() {
        init_test("accept_is_fifo");
        let cx = Cx::for_testing();
        let mut listener = MemoryListener::<MemoryStream>::new();
        let (first, mut first_peer) = memory_stream_pair();
        let (second, mut second_peer) = memory_stream_pair();

        assert!(listener.inject(first).is_ok());
        assert!(listener.connector().inject(second).is_ok());
        crate::assert_with_log!(listener.pending() == 2, "queued", 2, listener.pending());

        future::block_on(async {
            first_peer.send_all(&cx, b"1").await.expect("mark first");
            second_peer.send_all(&cx, b"2").await.expect("mark second");

            let mut accepted = listener.accept(&cx).await.expect("first");
            let mark = accepted.receive_some(&cx, 1).await.expect("read mark");
            crate::assert_with_log!(mark == b"1", "first in, first out", b"1", mark);

            let mut accepted = listener.accept(&cx).await.expect("second");
            let mark = accepted.receive_some(&cx, 1).await.expect("read mark");
            crate::assert_with_log!(mark == b"2", "second follows", b"2", mark);
        });
        crate::assert_with_log!(listener.pending() == 0, "drained", 0, listener.pending());
        crate::test_complete!("accept_is_fifo");
    }

    #[test]
    fn pending_accept_wakes_on_inject() {
        init_test("pending_accept_wakes_on_inject");
        let cx = Cx::for_testing();
        let mut listener = MemoryListener::<MemoryStream>::new();
        let connector = listener.connector();

        let mut accept = Box::pin(listener.accept(&cx));
        let first = future::block_on(future::poll_once(&mut accept));
        crate::assert_with_log!(first.is_none(), "pending while empty", "None", first.is_some());

        let (stream, _peer) = memory_stream_pair();
        assert!(connector.inject(stream).is_ok());
        let accepted = future::block_on(accept);
        crate::assert_with_log!(accepted.is_ok(), "accepted", "Ok", accepted.is_ok());
        crate::test_complete!("pending_accept_wakes_on_inject");
    }

    #[test]
    fn closed_listener_refuses_accept_and_inject() {
        init_test("closed_listener_refuses_accept_and_inject");
        let cx = Cx::for_testing();
        let mut listener = MemoryListener::<MemoryStream>::new();
        let connector = listener.connector();
        future::block_on(listener.close(&cx)).expect("close");

        let err = future::block_on(listener.accept(&cx)).expect_err("closed");
        crate::assert_with_log!(err.is_closed_listener(), "closed listener", true, err.kind());

        let (stream, _peer) = memory_stream_pair();
        let refused = connector.inject(stream).is_err();
        crate::assert_with_log!(refused, "inject refused", true, refused);
        crate::test_complete!("closed_listener_refuses_accept_and_inject");
    }

    #[test]
    fn finished_accepts_leave_no_waiters() {
        init_test("finished_accepts_leave_no_waiters");
        let cx = Cx::for_testing();
        let mut listener = MemoryListener::<MemoryStream>::new();
        let connector = listener.connector();

        for _ in 0..50 {
            let mut accept = Box::pin(listener.accept(&cx));
            let first = future::block_on(future::poll_once(&mut accept));
            assert!(first.is_none(), "accept should suspend while empty");
            let (stream, _peer) = memory_stream_pair();
            assert!(connector.inject(stream).is_ok());
            future::block_on(accept).expect("accepted");
        }

        let left = cx.waiter_count();
        crate::assert_with_log!(left == 0, "no stale wakers", 0, left);
        crate::test_complete!("finished_accepts_leave_no_waiters");
    }

    #[test]
    fn accept_on_closed_listener_under_cancel_is_cancelled() {
        init_test("accept_on_closed_listener_under_cancel_is_cancelled");
        let cx = Cx::for_testing();
        let mut listener = MemoryListener::<MemoryStream>::new();
        future::block_on(listener.close(&cx)).expect("close");

        cx.cancel();
        let err = future::block_on(listener.accept(&cx)).expect_err("cancelled");
        crate::assert_with_log!(err.is_cancelled(), "checkpoint first", true, err.kind());
        crate::test_complete!("accept_on_closed_listener_under_cancel_is_cancelled");
    }

    #[test]
    fn cancelled_accept_keeps_queue_intact() {
        init_test("cancelled_accept_keeps_queue_intact");
        let cx = Cx::for_testing();
        let scope = cx.cancel_scope();
        let mut listener = MemoryListener::<MemoryStream>::new();

        {
            let mut accept = Box::pin(listener.accept(scope.cx()));
            let first = future::block_on(future::poll_once(&mut accept));
            crate::assert_with_log!(first.is_none(), "pending", "None", first.is_some());
            scope.cancel();
            let err = future::block_on(accept).expect_err("cancelled");
            crate::assert_with_log!(err.is_cancelled(), "cancelled", true, err.kind());
        }

        let (stream, _peer) = memory_stream_pair();
        assert!(listener.inject(stream).is_ok());
        let accepted = future::block_on(listener.accept(&cx));
        crate::assert_with_log!(accepted.is_ok(), "listener still usable", "Ok", accepted.is_ok());
        crate::test_complete!("cancelled_accept_keeps_queue_intact");
    }
}
