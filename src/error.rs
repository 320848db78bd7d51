//! Error types surfaced at the stream boundary.
//!
//! Errors follow the same principles as the rest of the runtime:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Transports report *why* a stream stopped working, never just "failed"
//! - Underlying causes are preserved through [`std::error::Error::source`]
//!
//! # Stream Taxonomy
//!
//! - [`ErrorKind::BrokenStream`]: the stream cannot be used because of an
//!   external condition (peer went away, network failure). Never caused by
//!   misuse.
//! - [`ErrorKind::ClosedStream`]: the caller already closed the stream
//!   locally (or already sent EOF and then tried to send). Always a caller bug.
//! - [`ErrorKind::ClosedListener`]: the listener equivalent of `ClosedStream`.
//!
//! Composite streams relay these unchanged. Nothing in this crate retries an
//! operation on the caller's behalf.

use core::fmt;
use std::io;
use std::sync::Arc;

use crate::types::CancelReason;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Cancellation ===
    /// Cancellation was observed at a checkpoint.
    Cancelled,

    // === Streams ===
    /// The stream failed because of an external condition.
    BrokenStream,
    /// The stream was already closed locally.
    ClosedStream,

    // === Listeners ===
    /// The listener was already closed locally.
    ClosedListener,

    // === Usage ===
    /// An argument was outside the accepted range.
    InvalidArgument,

    // === Transport ===
    /// Some other I/O failure from a wrapped transport.
    Io,

    // === Internal ===
    /// Internal error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::BrokenStream | Self::ClosedStream | Self::Io => ErrorCategory::Stream,
            Self::ClosedListener => ErrorCategory::Listener,
            Self::InvalidArgument => ErrorCategory::Usage,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns true when this kind signals a bug in the calling code rather
    /// than an external condition.
    #[must_use]
    pub const fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            Self::ClosedStream | Self::ClosedListener | Self::InvalidArgument
        )
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Cancellation-related failures.
    Cancellation,
    /// Stream failures, external or local.
    Stream,
    /// Listener failures.
    Listener,
    /// Invalid use of an API.
    Usage,
    /// Internal errors.
    Internal,
}

/// The main error type for stream operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Creates a broken-stream error.
    #[must_use]
    pub const fn broken_stream() -> Self {
        Self::new(ErrorKind::BrokenStream)
    }

    /// Creates a closed-stream error.
    #[must_use]
    pub const fn closed_stream() -> Self {
        Self::new(ErrorKind::ClosedStream)
    }

    /// Creates a closed-listener error.
    #[must_use]
    pub const fn closed_listener() -> Self {
        Self::new(ErrorKind::ClosedListener)
    }

    /// Creates a cancellation error from a structured reason.
    #[must_use]
    pub fn cancelled(reason: &CancelReason) -> Self {
        Self::new(ErrorKind::Cancelled).with_message(format!("{reason}"))
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(detail)
    }

    /// Creates an internal error (bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if the stream broke for external reasons.
    #[must_use]
    pub const fn is_broken_stream(&self) -> bool {
        matches!(self.kind, ErrorKind::BrokenStream)
    }

    /// Returns true if the stream was closed locally.
    #[must_use]
    pub const fn is_closed_stream(&self) -> bool {
        matches!(self.kind, ErrorKind::ClosedStream)
    }

    /// Returns true if the listener was closed locally.
    #[must_use]
    pub const fn is_closed_listener(&self) -> bool {
        matches!(self.kind, ErrorKind::ClosedListener)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => ErrorKind::BrokenStream,
            _ => ErrorKind::Io,
        };
        Self::new(kind).with_source(err)
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for stream operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
