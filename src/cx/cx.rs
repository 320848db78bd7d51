//! The capability context type.
//!
//! `Cx` is the token that grants access to cancellation:
//! - Querying identity (scope ID)
//! - Checking cancellation status at checkpoints
//! - Waiting for cancellation while suspended
//!
//! # Capability Model
//!
//! Every suspending stream operation takes an explicit `&Cx`. There is no
//! ambient "current scope": the context a call runs under is exactly the one
//! it was handed. This is what lets [`aclose_forcefully`] run a resource's
//! close under an already-cancelled child scope without touching the
//! caller's own scope.
//!
//! # Cancellation Tree
//!
//! Each `Cx` is one node of a tree. A node observes cancellation when it, or
//! any ancestor up to the first shielded node, has been cancelled. Cancelling
//! a node never affects its parent.
//!
//! # Thread Safety
//!
//! `Cx` is `Send + Sync` (it wraps an `Arc<Mutex<..>>`), but the semantic
//! contract is single-task: a context belongs to the code running inside its
//! scope. Clones share state, so a cancellation through one clone is visible
//! through all of them.
//!
//! [`aclose_forcefully`]: crate::stream::aclose_forcefully

use crate::cx::scope::CancelScope;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, info, trace};
use crate::types::{CancelKind, CancelReason, CheckpointState, ScopeId};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// The capability context for one cancellation scope.
///
/// # Example
///
/// ```
/// use asupersync_streams::Cx;
///
/// let cx = Cx::for_testing();
/// assert!(cx.checkpoint().is_ok());
///
/// cx.cancel();
/// assert!(cx.checkpoint().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Cx {
    inner: Arc<Mutex<CxInner>>,
}

/// Internal state of one scope node.
#[derive(Debug)]
struct CxInner {
    id: ScopeId,
    parent: Option<Cx>,
    shielded: bool,
    /// `Some` once cancellation has been requested on this node.
    cancel_reason: Option<CancelReason>,
    /// Operations suspended at or below this node.
    waiters: WaiterSlab,
    checkpoint_state: CheckpointState,
}

impl CxInner {
    fn new(parent: Option<Cx>) -> Self {
        Self {
            id: ScopeId::next(),
            parent,
            shielded: false,
            cancel_reason: None,
            waiters: WaiterSlab::new(),
            checkpoint_state: CheckpointState::new(),
        }
    }
}

/// One registration slot on a scope node.
#[derive(Debug)]
enum WaiterSlot {
    Vacant,
    Waiting(Waker),
    /// Woken by a cancel or unshield; held until its owner re-registers or
    /// drops.
    Woken,
}

/// Slab of waiter slots that reuses freed entries, so operations that
/// suspend and complete on a long-lived scope leave nothing behind.
#[derive(Debug)]
struct WaiterSlab {
    slots: Vec<WaiterSlot>,
    free_slots: Vec<usize>,
}

impl WaiterSlab {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    fn insert(&mut self, waker: &Waker) -> usize {
        let slot = WaiterSlot::Waiting(waker.clone());
        if let Some(index) = self.free_slots.pop() {
            self.slots[index] = slot;
            index
        } else {
            self.slots.push(slot);
            self.slots.len() - 1
        }
    }

    fn update(&mut self, index: usize, waker: &Waker) {
        if let Some(slot) = self.slots.get_mut(index) {
            match slot {
                WaiterSlot::Waiting(current) if current.will_wake(waker) => {}
                _ => *slot = WaiterSlot::Waiting(waker.clone()),
            }
        }
    }

    fn remove(&mut self, index: usize) {
        if index < self.slots.len() {
            self.slots[index] = WaiterSlot::Vacant;
            self.free_slots.push(index);
        }

        // Shrink from the tail so a drained slab holds no storage.
        while matches!(self.slots.last(), Some(WaiterSlot::Vacant)) {
            let tail = self.slots.len() - 1;
            self.slots.pop();
            if let Some(pos) = self.free_slots.iter().position(|&i| i == tail) {
                self.free_slots.swap_remove(pos);
            }
        }
    }

    /// Takes every pending waker, leaving the slots owned but woken.
    fn take_wakers(&mut self) -> Vec<Waker> {
        let mut wakers = Vec::new();
        for slot in &mut self.slots {
            match std::mem::replace(slot, WaiterSlot::Woken) {
                WaiterSlot::Waiting(waker) => wakers.push(waker),
                WaiterSlot::Vacant => *slot = WaiterSlot::Vacant,
                WaiterSlot::Woken => {}
            }
        }
        wakers
    }

    fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !matches!(slot, WaiterSlot::Vacant))
            .count()
    }
}

/// What one node contributes to a cancellation lookup.
struct NodeView {
    id: ScopeId,
    cancel_reason: Option<CancelReason>,
    shielded: bool,
    parent: Option<Cx>,
}

impl Cx {
    /// Creates a new root context that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::from_inner(CxInner::new(None))
    }

    /// Creates a root context for tests.
    ///
    /// Identical to [`Cx::new`]; the separate name keeps test setup greppable.
    #[must_use]
    pub fn for_testing() -> Self {
        Self::new()
    }

    fn from_inner(inner: CxInner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Creates a child node of this context.
    #[must_use]
    pub(crate) fn child(&self) -> Self {
        let child = Self::from_inner(CxInner::new(Some(self.clone())));
        trace!(parent = %self.id(), scope = %child.id(), "child scope opened");
        child
    }

    /// Opens a nested cancellation scope below this context.
    ///
    /// Cancelling the returned scope affects only code that runs with
    /// [`CancelScope::cx`] (or a descendant of it).
    #[must_use]
    pub fn cancel_scope(&self) -> CancelScope {
        CancelScope::new(self)
    }

    /// Returns this scope's identifier.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.inner.lock().id
    }

    /// Returns the enclosing context, if this is not a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.inner.lock().parent.clone()
    }

    /// Returns true if both handles refer to the same scope node.
    #[must_use]
    pub fn same_scope(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn view(&self) -> NodeView {
        let inner = self.inner.lock();
        NodeView {
            id: inner.id,
            cancel_reason: inner.cancel_reason.clone(),
            shielded: inner.shielded,
            parent: inner.parent.clone(),
        }
    }

    /// Finds the nearest cancelled node visible from here.
    fn visible_cancel(&self) -> Option<(ScopeId, CancelReason)> {
        let mut view = self.view();
        loop {
            if let Some(reason) = view.cancel_reason {
                return Some((view.id, reason));
            }
            if view.shielded {
                return None;
            }
            let parent = view.parent?;
            view = parent.view();
        }
    }

    /// Returns true if cancellation is visible from this context.
    ///
    /// This is a non-blocking check; unlike [`checkpoint`](Self::checkpoint)
    /// it records nothing and returns no error.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.visible_cancel().is_some()
    }

    /// Returns true if cancellation was requested on this exact node,
    /// ignoring ancestors.
    #[must_use]
    pub fn is_cancelled_locally(&self) -> bool {
        self.inner.lock().cancel_reason.is_some()
    }

    /// Returns the reason of the nearest visible cancellation.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.visible_cancel().map(|(_, reason)| reason)
    }

    /// Returns the scope whose cancellation is visible from here.
    #[must_use]
    pub fn cancel_origin(&self) -> Option<ScopeId> {
        self.visible_cancel().map(|(origin, _)| origin)
    }

    /// Requests cancellation of this scope with [`CancelKind::User`].
    pub fn cancel(&self) {
        self.cancel_with(CancelKind::User, None);
    }

    /// Requests cancellation of this scope with a detailed reason.
    ///
    /// Cancelling twice keeps the more severe reason. Every operation that
    /// registered a waker at or below this node is woken so it can observe
    /// the cancellation at its next checkpoint.
    ///
    /// # Example
    ///
    /// ```
    /// use asupersync_streams::{types::CancelKind, Cx};
    ///
    /// let cx = Cx::for_testing();
    /// cx.cancel_with(CancelKind::Forced, Some("teardown"));
    /// assert_eq!(cx.cancel_reason().map(|r| r.kind), Some(CancelKind::Forced));
    /// ```
    pub fn cancel_with(&self, kind: CancelKind, message: Option<&'static str>) {
        let mut reason = CancelReason::new(kind);
        if let Some(msg) = message {
            reason = reason.with_message(msg);
        }

        let wakers = {
            let mut inner = self.inner.lock();
            match inner.cancel_reason.as_mut() {
                Some(existing) => {
                    existing.strengthen(&reason);
                }
                None => inner.cancel_reason = Some(reason),
            }
            inner.waiters.take_wakers()
        };

        debug!(
            scope = %self.id(),
            cancel_kind = ?kind,
            cancel_message = message,
            woken = wakers.len(),
            "cancel initiated via cancel_with"
        );
        for waker in wakers {
            waker.wake();
        }
    }

    /// Returns true if this scope ignores cancellation of its ancestors.
    #[must_use]
    pub fn is_shielded(&self) -> bool {
        self.inner.lock().shielded
    }

    pub(crate) fn set_shielded(&self, shielded: bool) {
        let wakers = {
            let mut inner = self.inner.lock();
            inner.shielded = shielded;
            if shielded {
                Vec::new()
            } else {
                // Waiters registered while shielded never reached the
                // ancestors; wake them so they re-register.
                inner.waiters.take_wakers()
            }
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Checks for cancellation and returns an error if cancelled.
    ///
    /// This is the cancellation point every suspending operation passes
    /// through. It records progress in the checkpoint state and then returns
    /// `Err` with kind [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled)
    /// if cancellation is visible from this scope.
    ///
    /// # Example
    ///
    /// ```ignore
    /// async fn do_work(cx: &Cx) -> Result<()> {
    ///     cx.checkpoint()?;
    ///     expensive_operation().await?;
    ///     cx.checkpoint()?;
    ///     Ok(())
    /// }
    /// ```
    #[allow(clippy::result_large_err)]
    pub fn checkpoint(&self) -> Result<()> {
        self.inner.lock().checkpoint_state.record();
        self.check_cancel()
    }

    /// Checks for cancellation with a progress message.
    ///
    /// Like [`checkpoint`](Self::checkpoint) but also stores `msg` in the
    /// checkpoint state.
    #[allow(clippy::result_large_err)]
    pub fn checkpoint_with(&self, msg: impl Into<String>) -> Result<()> {
        self.inner
            .lock()
            .checkpoint_state
            .record_with_message(msg.into());
        self.check_cancel()
    }

    /// Returns a snapshot of this scope's checkpoint state.
    #[must_use]
    pub fn checkpoint_state(&self) -> CheckpointState {
        self.inner.lock().checkpoint_state.clone()
    }

    #[allow(clippy::result_large_err)]
    fn check_cancel(&self) -> Result<()> {
        match self.visible_cancel() {
            None => {
                trace!(scope = %self.id(), cancel_requested = false, "checkpoint");
                Ok(())
            }
            Some((_, reason)) => {
                info!(
                    scope = %self.id(),
                    origin = ?self.cancel_origin(),
                    cancel_reason = %reason,
                    "cancel observed at checkpoint - operation cancelled"
                );
                Err(Error::cancelled(&reason))
            }
        }
    }

    /// Returns the number of suspended operations registered on this node,
    /// including those registered through a descendant scope.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.inner.lock().waiters.occupied()
    }

    /// Returns a future that completes once cancellation is visible from
    /// this scope.
    ///
    /// Useful for resources whose graceful shutdown waits on the peer: they
    /// race the wait against this future so a forced close can interrupt it.
    pub fn cancelled(&self) -> WaitCancelled<'_> {
        WaitCancelled {
            cx: self,
            waiter: CancelWaiter::new(),
        }
    }
}

impl Default for Cx {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration of one suspended operation with a scope's cancellation.
///
/// A suspending operation owns one `CancelWaiter` for as long as it runs and
/// calls [`register`](Self::register) before returning `Poll::Pending`. The
/// waker lands on the scope node and on every ancestor up to the first
/// shielded node, so cancelling any scope visible from `cx` wakes it.
/// Registering again updates the same slots; dropping the waiter frees them.
///
/// # Example
///
/// ```
/// use asupersync_streams::cx::CancelWaiter;
/// use asupersync_streams::Cx;
/// use std::future::poll_fn;
/// use std::task::Poll;
///
/// async fn wait_for_cancel(cx: &Cx) {
///     let mut waiter = CancelWaiter::new();
///     poll_fn(|task| {
///         if cx.is_cancel_requested() {
///             return Poll::Ready(());
///         }
///         waiter.register(cx, task.waker());
///         if cx.is_cancel_requested() {
///             Poll::Ready(())
///         } else {
///             Poll::Pending
///         }
///     })
///     .await;
/// }
///
/// let cx = Cx::for_testing();
/// cx.cancel();
/// futures_lite::future::block_on(wait_for_cancel(&cx));
/// assert_eq!(cx.waiter_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct CancelWaiter {
    slots: Vec<(Cx, usize)>,
}

impl CancelWaiter {
    /// Creates a waiter with no registrations.
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Registers `waker` to be woken when cancellation becomes visible
    /// from `cx`.
    pub fn register(&mut self, cx: &Cx, waker: &Waker) {
        let mut node = Some(cx.clone());
        while let Some(current) = node {
            let existing = self
                .slots
                .iter()
                .find(|(registered, _)| registered.same_scope(&current))
                .map(|&(_, index)| index);
            let mut inner = current.inner.lock();
            match existing {
                Some(index) => inner.waiters.update(index, waker),
                None => {
                    let index = inner.waiters.insert(waker);
                    self.slots.push((current.clone(), index));
                }
            }
            node = if inner.shielded {
                None
            } else {
                inner.parent.clone()
            };
        }
    }

    /// Returns true while this waiter holds a slot on some scope.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Frees every slot this waiter holds.
    pub fn deregister(&mut self) {
        for (node, index) in self.slots.drain(..) {
            node.inner.lock().waiters.remove(index);
        }
    }
}

impl Drop for CancelWaiter {
    fn drop(&mut self) {
        self.deregister();
    }
}

/// Future returned by [`Cx::cancelled`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct WaitCancelled<'a> {
    cx: &'a Cx,
    waiter: CancelWaiter,
}

impl Future for WaitCancelled<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, task: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.cx.is_cancel_requested() {
            this.waiter.deregister();
            return Poll::Ready(());
        }
        this.waiter.register(this.cx, task.waker());
        if this.cx.is_cancel_requested() {
            this.waiter.deregister();
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
