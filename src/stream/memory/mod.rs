//! In-memory streams for deterministic testing.
//!
//! This module provides one-way memory pipes ([`MemorySendStream`] and
//! [`MemoryReceiveStream`]), a stapled bidirectional pair
//! ([`memory_stream_pair`]) and an in-memory [`MemoryListener`]. Nothing here
//! touches the OS; every byte lives in an unbounded `VecDeque` shared between
//! the two ends of a pipe.
//!
//! # Semantics
//!
//! - `send_all` never suspends; bytes are appended and the reader is woken.
//! - `receive_some` returns whatever is buffered (up to the limits), suspends
//!   while the buffer is empty, and returns an empty vector once the send
//!   side finished and the buffer is drained.
//! - Closing either end wakes the other. Closing the receiver makes later
//!   sends fail with `BrokenStream`.
//! - Both ends release on drop, so a dropped sender reads as EOF.
//!
//! # Usage
//!
//! ```rust,ignore
//! use asupersync_streams::stream::memory::{memory_stream_pair_with_config, MemoryStreamConfig};
//!
//! let config = MemoryStreamConfig::new().max_receive_chunk(1).half_close(true);
//! let (mut client, mut server) = memory_stream_pair_with_config(config)?;
//! client.send_all(&cx, b"ping").await?;
//! let first = server.receive_some(&cx, 1024).await?; // b"p"
//! ```

pub mod config;
pub mod listener;

pub use config::{ConfigError, MemoryStreamConfig};
pub use listener::{MemoryConnector, MemoryListener};

use crate::cx::{CancelWaiter, Cx};
use crate::error::{Error, Result};
use crate::stream::stapled::StapledStream;
use crate::stream::traits::{AsyncResource, ReceiveStream, SendStream};
use crate::tracing_compat::trace;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::{poll_fn, Future};
use std::sync::Arc;
use std::task::{Poll, Waker};

/// A bidirectional in-memory stream.
pub type MemoryStream = StapledStream<MemorySendStream, MemoryReceiveStream>;

// =============================================================================
// Pipe
// =============================================================================

/// State shared between the two ends of one pipe.
#[derive(Debug, Default)]
struct PipeState {
    buf: VecDeque<u8>,
    /// The sender closed or sent EOF; no more bytes will arrive.
    send_finished: bool,
    /// The receiver closed; sends are refused.
    receiver_closed: bool,
    read_waker: Option<Waker>,
}

type SharedPipe = Arc<Mutex<PipeState>>;

// =============================================================================
// MemorySendStream
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendState {
    Open,
    EofSent,
    Closed,
}

/// The sending end of an in-memory pipe.
#[derive(Debug)]
pub struct MemorySendStream {
    pipe: SharedPipe,
    state: SendState,
    half_close: bool,
}

impl MemorySendStream {
    /// Returns true once `close` has been called (or EOF sent).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state != SendState::Open
    }

    /// Returns how many bytes are buffered and not yet received.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pipe.lock().buf.len()
    }

    fn finish(&mut self, next: SendState) {
        if self.state == SendState::Closed {
            return;
        }
        let was_open = self.state == SendState::Open;
        self.state = next;
        if !was_open {
            return;
        }
        let waker = {
            let mut pipe = self.pipe.lock();
            pipe.send_finished = true;
            pipe.read_waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    async fn send_eof_inner(&mut self, cx: &Cx) -> Result<()> {
        if self.state == SendState::Closed {
            return Err(Error::closed_stream().with_message("send_eof after close"));
        }
        self.finish(SendState::EofSent);
        trace!(scope = %cx.id(), "memory send half sent eof");
        cx.checkpoint()
    }
}

impl AsyncResource for MemorySendStream {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.finish(SendState::Closed);
            cx.checkpoint()
        }
    }
}

impl SendStream for MemorySendStream {
    fn send_all(&mut self, cx: &Cx, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        async move {
            cx.checkpoint()?;
            match self.state {
                SendState::Open => {}
                SendState::EofSent => {
                    return Err(Error::closed_stream().with_message("send_all after send_eof"));
                }
                SendState::Closed => {
                    return Err(Error::closed_stream().with_message("send_all after close"));
                }
            }

            let waker = {
                let mut pipe = self.pipe.lock();
                if pipe.receiver_closed {
                    return Err(Error::broken_stream().with_message("receiver closed"));
                }
                pipe.buf.extend(data);
                pipe.read_waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
            trace!(bytes = data.len(), "memory send");
            Ok(())
        }
    }

    fn wait_send_all_might_not_block(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            cx.checkpoint()?;
            let reason = match self.state {
                SendState::Open => return Ok(()),
                SendState::EofSent => "wait_send_all_might_not_block after send_eof",
                SendState::Closed => "wait_send_all_might_not_block after close",
            };
            Err(Error::closed_stream().with_message(reason))
        }
    }

    fn send_eof_if_supported(
        &mut self,
        cx: &Cx,
    ) -> Option<impl Future<Output = Result<()>> + Send> {
        if self.half_close {
            Some(self.send_eof_inner(cx))
        } else {
            None
        }
    }
}

impl Drop for MemorySendStream {
    fn drop(&mut self) {
        self.finish(SendState::Closed);
    }
}

// =============================================================================
// MemoryReceiveStream
// =============================================================================

/// The receiving end of an in-memory pipe.
#[derive(Debug)]
pub struct MemoryReceiveStream {
    pipe: SharedPipe,
    closed: bool,
    max_receive_chunk: Option<usize>,
}

impl MemoryReceiveStream {
    /// Returns true once `close` has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut pipe = self.pipe.lock();
        pipe.receiver_closed = true;
        pipe.buf.clear();
        pipe.read_waker = None;
    }
}

impl AsyncResource for MemoryReceiveStream {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.release();
            cx.checkpoint()
        }
    }
}

impl ReceiveStream for MemoryReceiveStream {
    fn receive_some(
        &mut self,
        cx: &Cx,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move {
            cx.checkpoint()?;
            if max_bytes == 0 {
                return Err(Error::invalid_argument("max_bytes must be at least 1"));
            }
            if self.closed {
                return Err(Error::closed_stream().with_message("receive_some after close"));
            }

            let limit = self
                .max_receive_chunk
                .map_or(max_bytes, |chunk| chunk.min(max_bytes));
            let pipe = &self.pipe;
            let mut waiter = CancelWaiter::new();
            poll_fn(|task| {
                {
                    let mut state = pipe.lock();
                    if !state.buf.is_empty() {
                        let n = limit.min(state.buf.len());
                        let chunk: Vec<u8> = state.buf.drain(..n).collect();
                        trace!(bytes = chunk.len(), "memory receive");
                        return Poll::Ready(Ok(chunk));
                    }
                    if state.send_finished {
                        return Poll::Ready(Ok(Vec::new()));
                    }
                    state.read_waker = Some(task.waker().clone());
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

impl Drop for MemoryReceiveStream {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// Constructors
// =============================================================================

fn one_way_pair(config: MemoryStreamConfig) -> (MemorySendStream, MemoryReceiveStream) {
    let pipe = SharedPipe::default();
    let send = MemorySendStream {
        pipe: Arc::clone(&pipe),
        state: SendState::Open,
        half_close: config.half_close,
    };
    let receive = MemoryReceiveStream {
        pipe,
        closed: false,
        max_receive_chunk: config.max_receive_chunk,
    };
    (send, receive)
}

/// Creates a connected one-way pipe with the default configuration.
#[must_use]
pub fn memory_stream_one_way_pair() -> (MemorySendStream, MemoryReceiveStream) {
    one_way_pair(MemoryStreamConfig::default())
}

/// Creates a connected one-way pipe with a custom configuration.
pub fn memory_stream_one_way_pair_with_config(
    config: MemoryStreamConfig,
) -> std::result::Result<(MemorySendStream, MemoryReceiveStream), ConfigError> {
    config.validate()?;
    Ok(one_way_pair(config))
}

fn stapled_pair(config: MemoryStreamConfig) -> (MemoryStream, MemoryStream) {
    let (a_to_b, b_from_a) = one_way_pair(config);
    let (b_to_a, a_from_b) = one_way_pair(config);
    (
        StapledStream::new(a_to_b, a_from_b),
        StapledStream::new(b_to_a, b_from_a),
    )
}

/// Creates two connected bidirectional streams with the default
/// configuration.
///
/// Bytes sent on one stream are received on the other.
#[must_use]
pub fn memory_stream_pair() -> (MemoryStream, MemoryStream) {
    stapled_pair(MemoryStreamConfig::default())
}

/// Creates two connected bidirectional streams with a custom configuration.
pub fn memory_stream_pair_with_config(
    config: MemoryStreamConfig,
) -> std::result::Result<(MemoryStream, MemoryStream), ConfigError> {
    config.validate()?;
    Ok(stapled_pair(config))
}
