//! Nestable cancellation scopes.
//!
//! A [`CancelScope`] is a child node of an existing [`Cx`]. Code run with
//! [`CancelScope::cx`] observes both the scope's own cancellation and that
//! of its ancestors; code run with the parent context never observes the
//! scope's cancellation.
//!
//! # Catching Cancellation
//!
//! A `Cancelled` error raised inside a scope belongs to the *outermost*
//! cancelled scope on the path. The scope that opened it "catches" the error
//! only when it is itself cancelled and its parent is not (or the scope is
//! shielded). Anything else must keep propagating so the enclosing scope can
//! unwind.
//!
//! ```
//! use asupersync_streams::Cx;
//!
//! let outer = Cx::for_testing();
//! let scope = outer.cancel_scope();
//! scope.cancel();
//!
//! let err = scope.cx().checkpoint().unwrap_err();
//! assert!(scope.cancelled_caught(&err));
//! assert!(outer.checkpoint().is_ok());
//! ```

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::tracing_compat::debug;
use crate::types::{CancelKind, ScopeId};
use std::future::Future;

/// A child cancellation scope.
#[derive(Debug, Clone)]
pub struct CancelScope {
    parent: Cx,
    cx: Cx,
}

impl CancelScope {
    /// Opens a new scope below `parent`.
    #[must_use]
    pub fn new(parent: &Cx) -> Self {
        Self {
            parent: parent.clone(),
            cx: parent.child(),
        }
    }

    /// Returns the context that code inside this scope runs with.
    #[must_use]
    pub fn cx(&self) -> &Cx {
        &self.cx
    }

    /// Returns the context this scope was opened from.
    #[must_use]
    pub fn parent(&self) -> &Cx {
        &self.parent
    }

    /// Returns this scope's identifier.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.cx.id()
    }

    /// Cancels this scope with [`CancelKind::User`].
    pub fn cancel(&self) {
        self.cx.cancel();
    }

    /// Cancels this scope with the given kind and message.
    pub fn cancel_with(&self, kind: CancelKind, message: Option<&'static str>) {
        self.cx.cancel_with(kind, message);
    }

    /// Returns true if cancellation is visible inside this scope.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cx.is_cancel_requested()
    }

    /// Shields this scope from cancellation of its ancestors.
    ///
    /// A shielded scope still honours its own cancellation.
    pub fn shield(&self, shielded: bool) {
        self.cx.set_shielded(shielded);
    }

    /// Returns true if `err` is a cancellation that this scope caused and
    /// must absorb.
    #[must_use]
    pub fn cancelled_caught(&self, err: &Error) -> bool {
        err.is_cancelled()
            && self.cx.is_cancelled_locally()
            && (self.cx.is_shielded() || !self.parent.is_cancel_requested())
    }

    /// Runs `f` inside this scope.
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` when the work was
    /// interrupted by this scope's own cancellation. Every other error,
    /// including cancellation of an enclosing scope, is returned unchanged.
    pub async fn run<F, Fut, T>(&self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match f(self.cx.clone()).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if self.cancelled_caught(&err) => {
                debug!(
                    scope = %self.id(),
                    error = %err,
                    "cancel scope absorbed its own cancellation"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
