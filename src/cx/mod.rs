//! Capability context and cancellation scopes.
//!
//! The [`Cx`] type is the capability token every suspending stream operation
//! receives. [`CancelScope`] opens a nested node below an existing `Cx` that
//! can be cancelled (or shielded) without affecting its parent.
//!
//! Cancellation never flows through ambient state: an operation observes
//! exactly the scope whose `Cx` it was handed.
//!
//! # For Transport Authors
//!
//! A stream implementation cooperates with cancellation in two ways:
//!
//! ```ignore
//! // 1. Pass through a checkpoint before doing work.
//! cx.checkpoint()?;
//!
//! // 2. Before returning Poll::Pending, register for cancellation wakeups
//! //    through a `CancelWaiter` the operation owns until it completes.
//! waiter.register(cx, task.waker());
//! ```
//!
//! # Module Contents
//!
//! - [`Cx`]: The capability context token
//! - [`CancelScope`]: A nestable cancellation scope
//! - [`CancelWaiter`]: A suspended operation's cancellation registration

pub mod cx;
pub mod scope;

pub use cx::{CancelWaiter, Cx, WaitCancelled};
pub use scope::CancelScope;
