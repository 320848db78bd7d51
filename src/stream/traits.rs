//! Capability traits for byte streams, listeners and closable resources.
//!
//! These traits are the contract between code that *uses* a byte stream and
//! the transports that implement one. They carry no state of their own.
//!
//! # Cancel-Safety
//!
//! Every suspending operation takes an explicit [`Cx`] and is a cancellation
//! point: if `cx` is cancelled, the operation returns
//! [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled) promptly and leaves
//! the resource either still usable or closed/broken, never half-mutated.
//!
//! [`AsyncResource::close`] has a stronger obligation: when it is cancelled
//! the resource must *still* be released, only less gracefully. That is what
//! makes [`aclose_forcefully`](super::aclose_forcefully) safe.
//!
//! # Half-Close
//!
//! Not every transport can shut down only its send direction. A
//! [`SendStream`] advertises the capability at call time through
//! [`SendStream::send_eof_if_supported`]; the default answer is "no".
//! [`HalfCloseableStream`] is the bidirectional contract for streams where
//! `send_eof` is always available (possibly by falling back to a full close).
//!
//! # Example
//!
//! ```rust,ignore
//! use asupersync_streams::{Cx, ReceiveStream, Result};
//!
//! async fn drain<R: ReceiveStream>(cx: &Cx, stream: &mut R) -> Result<Vec<u8>> {
//!     let mut out = Vec::new();
//!     loop {
//!         let chunk = stream.receive_some(cx, 4096).await?;
//!         if chunk.is_empty() {
//!             return Ok(out);
//!         }
//!         out.extend_from_slice(&chunk);
//!     }
//! }
//! ```

use crate::cx::Cx;
use crate::error::Result;
use std::future::Future;

/// A resource that must be explicitly closed.
pub trait AsyncResource: Send {
    /// Closes this resource, possibly blocking.
    ///
    /// - Calling `close` more than once is allowed; later calls are no-ops
    ///   apart from passing through a checkpoint.
    /// - If `cx` is cancelled mid-close, the resource is still released
    ///   before the cancellation error is returned.
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

/// The send half of a byte stream.
pub trait SendStream: AsyncResource {
    /// Sends all of `data`, suspending until it has been handed to the
    /// transport.
    ///
    /// # Errors
    ///
    /// - `ClosedStream`: this stream was closed locally, or `send_eof` was
    ///   already called.
    /// - `BrokenStream`: the peer went away or the transport failed.
    /// - `Cancelled`: `cx` was cancelled.
    fn send_all(&mut self, cx: &Cx, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Suspends until a call to [`send_all`](Self::send_all) might not block.
    ///
    /// This is advisory: a later `send_all` may still suspend.
    fn wait_send_all_might_not_block(&mut self, cx: &Cx)
        -> impl Future<Output = Result<()>> + Send;

    /// Returns a pending send-EOF operation if this stream can shut down its
    /// send direction without closing the whole object.
    ///
    /// The answer may depend on runtime configuration, so callers ask at
    /// the time they need it. The default is `None`.
    fn send_eof_if_supported(
        &mut self,
        cx: &Cx,
    ) -> Option<impl Future<Output = Result<()>> + Send> {
        let _ = cx;
        None::<std::future::Ready<Result<()>>>
    }
}

/// The receive half of a byte stream.
pub trait ReceiveStream: AsyncResource {
    /// Receives between 1 and `max_bytes` bytes.
    ///
    /// An empty vector means end-of-stream; this is the only way EOF is
    /// reported, and once returned it is returned by every later call.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: `max_bytes` is zero (enforced by the transport).
    /// - `ClosedStream`: this stream was closed locally.
    /// - `BrokenStream`: the transport failed.
    /// - `Cancelled`: `cx` was cancelled.
    fn receive_some(
        &mut self,
        cx: &Cx,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// A bidirectional stream whose send direction can be closed on its own.
pub trait HalfCloseableStream: SendStream + ReceiveStream {
    /// Shuts down the send direction, leaving the receive direction usable.
    ///
    /// After `send_eof`, `send_all` fails with `ClosedStream`.
    fn send_eof(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

/// A source of incoming streams.
pub trait Listener: AsyncResource {
    /// The stream type yielded by [`accept`](Self::accept).
    type Stream: AsyncResource;

    /// Waits for and returns the next incoming stream.
    ///
    /// Cancel-safe: a stream that was not returned stays queued for the next
    /// call.
    ///
    /// # Errors
    ///
    /// - `ClosedListener`: this listener was closed locally.
    /// - `Cancelled`: `cx` was cancelled.
    fn accept(&mut self, cx: &Cx) -> impl Future<Output = Result<Self::Stream>> + Send;
}

impl<T: AsyncResource> AsyncResource for &mut T {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        (**self).close(cx)
    }
}

impl<T: SendStream> SendStream for &mut T {
    fn send_all(&mut self, cx: &Cx, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        (**self).send_all(cx, data)
    }

    fn wait_send_all_might_not_block(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).wait_send_all_might_not_block(cx)
    }

    fn send_eof_if_supported(
        &mut self,
        cx: &Cx,
    ) -> Option<impl Future<Output = Result<()>> + Send> {
        (**self).send_eof_if_supported(cx)
    }
}

impl<T: ReceiveStream> ReceiveStream for &mut T {
    fn receive_some(
        &mut self,
        cx: &Cx,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        (**self).receive_some(cx, max_bytes)
    }
}

impl<T: HalfCloseableStream> HalfCloseableStream for &mut T {
    fn send_eof(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        (**self).send_eof(cx)
    }
}

impl<T: Listener> Listener for &mut T {
    type Stream = T::Stream;

    fn accept(&mut self, cx: &Cx) -> impl Future<Output = Result<Self::Stream>> + Send {
        (**self).accept(cx)
    }
}

impl<T: AsyncResource> AsyncResource for Box<T> {
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        (**self).close(cx)
    }
}

impl<T: SendStream> SendStream for Box<T> {
    fn send_all(&mut self, cx: &Cx, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        (**self).send_all(cx, data)
    }

    fn wait_send_all_might_not_block(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).wait_send_all_might_not_block(cx)
    }

    fn send_eof_if_supported(
        &mut self,
        cx: &Cx,
    ) -> Option<impl Future<Output = Result<()>> + Send> {
        (**self).send_eof_if_supported(cx)
    }
}

impl<T: ReceiveStream> ReceiveStream for Box<T> {
    fn receive_some(
        &mut self,
        cx: &Cx,
        max_bytes: usize,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        (**self).receive_some(cx, max_bytes)
    }
}

impl<T: HalfCloseableStream> HalfCloseableStream for Box<T> {
    fn send_eof(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        (**self).send_eof(cx)
    }
}

impl<T: Listener> Listener for Box<T> {
    type Stream = T::Stream;

    fn accept(&mut self, cx: &Cx) -> impl Future<Output = Result<Self::Stream>> + Send {
        (**self).accept(cx)
    }
}
