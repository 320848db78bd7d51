//! Configuration for in-memory stream pairs.
//!
//! The configuration controls how the memory transport behaves:
//! - Upper bound on bytes returned by one `receive_some`
//! - Whether the send half supports half-close (`send_eof`)

use crate::error::{Error, ErrorKind};

/// Configuration for in-memory stream pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStreamConfig {
    /// Upper bound on bytes returned by a single `receive_some`.
    ///
    /// `None` means only the caller's `max_bytes` limits a read.
    pub max_receive_chunk: Option<usize>,
    /// Whether the send half can shut down its direction on its own.
    pub half_close: bool,
}

impl MemoryStreamConfig {
    /// Creates the default configuration: no chunk limit, no half-close.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_receive_chunk: None,
            half_close: false,
        }
    }

    /// Caps every read at `chunk` bytes.
    ///
    /// Small values force readers through their partial-read paths.
    #[must_use]
    pub const fn max_receive_chunk(mut self, chunk: usize) -> Self {
        self.max_receive_chunk = Some(chunk);
        self
    }

    /// Sets whether the send half supports `send_eof`.
    #[must_use]
    pub const fn half_close(mut self, enabled: bool) -> Self {
        self.half_close = enabled;
        self
    }

    /// Checks that the configuration can be used to build a pipe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_receive_chunk {
            Some(0) => Err(ConfigError::ZeroReceiveChunk),
            _ => Ok(()),
        }
    }
}

impl Default for MemoryStreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when a [`MemoryStreamConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A receive chunk limit of zero would make every read return EOF.
    #[error("max_receive_chunk must be at least 1 byte")]
    ZeroReceiveChunk,
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::InvalidArgument)
            .with_message(err.to_string())
            .with_source(err)
    }
}
