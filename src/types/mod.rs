//! Core types shared by the capability context and the stream layer.
//!
//! - [`id`]: Identifier types (`ScopeId`)
//! - [`cancel`]: Cancellation reason and kind types
//! - [`checkpoint`]: Progress bookkeeping recorded at checkpoints

pub mod cancel;
pub mod checkpoint;
pub mod id;

pub use cancel::{CancelKind, CancelReason};
pub use checkpoint::CheckpointState;
pub use id::ScopeId;
