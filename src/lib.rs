//! Asupersync streams: cancel-correct byte-stream capabilities.
//!
//! # Overview
//!
//! This crate defines the contract between code that uses a byte stream and
//! the transports that implement one, plus the two pieces every cooperative
//! I/O runtime needs on top of that contract:
//!
//! - [`StapledStream`] composes two independent unidirectional streams into
//!   one bidirectional stream, delegating each operation to the right half and
//!   degrading `send_eof` to a full close when the send half cannot half-close.
//! - [`aclose_forcefully`] runs a resource's close under an already-cancelled
//!   scope, so cleanup completes without ever blocking on a peer.
//!
//! # Core Guarantees
//!
//! - **Cancel-correctness**: every suspending operation takes an explicit
//!   [`Cx`] and is a cancellation point
//! - **Guaranteed release**: closing a staple closes both halves even when the
//!   first close fails
//! - **Bounded cleanup**: a forced close completes within one checkpoint
//! - **Typed failures**: broken, locally-closed and cancelled streams are
//!   distinct [`ErrorKind`]s
//!
//! # Module Structure
//!
//! - [`types`]: Core types (identifiers, cancellation reasons, checkpoints)
//! - [`cx`]: Capability context and cancellation scopes
//! - [`error`]: Error types
//! - [`stream`]: Stream traits, the stapled stream, forced close, and the
//!   in-memory transport
//! - [`tracing_compat`]: Logging macros that compile away without the
//!   `tracing-integration` feature

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod cx;
pub mod error;
pub mod stream;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;

// Re-exports for convenient access to core types
pub use cx::{CancelScope, Cx};
pub use error::{Error, ErrorCategory, ErrorKind, Result, ResultExt};
pub use stream::{
    aclose_forcefully, AsyncResource, HalfCloseableStream, Listener, ReceiveStream, SendStream,
    StapledStream,
};
pub use types::{CancelKind, CancelReason, ScopeId};
