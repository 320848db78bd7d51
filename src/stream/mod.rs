//! Byte-stream capabilities and their composition.
//!
//! # Core Traits
//!
//! - [`AsyncResource`]: anything that must be explicitly closed
//! - [`SendStream`] / [`ReceiveStream`]: the two directions of a byte stream
//! - [`HalfCloseableStream`]: a bidirectional stream that can send EOF
//! - [`Listener`]: a source of incoming streams
//!
//! # Composition
//!
//! - [`StapledStream`]: joins a send half and a receive half into one
//!   bidirectional stream
//! - [`aclose_forcefully`]: closes any resource without letting the close
//!   block
//!
//! # Transports
//!
//! - [`memory`]: in-memory pipes, pairs and listeners for tests

pub mod forceful;
pub mod memory;
pub mod stapled;
pub mod traits;

pub use forceful::aclose_forcefully;
pub use stapled::StapledStream;
pub use traits::{AsyncResource, HalfCloseableStream, Listener, ReceiveStream, SendStream};
