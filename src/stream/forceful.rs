//! Bounded, non-graceful close of any [`AsyncResource`].

use crate::cx::Cx;
use crate::error::Result;
use crate::stream::traits::AsyncResource;
use crate::tracing_compat::debug;
use crate::types::CancelKind;

/// Closes `resource` without letting the close block.
///
/// The resource's `close` runs inside a child scope of `cx` that is already
/// cancelled, so its first checkpoint returns `Cancelled` immediately. A
/// cancel-safe resource has released itself by then, which makes this the
/// right tool for cleanup paths that must not wait on a peer.
///
/// # Errors
///
/// - The cancellation raised by the internal scope is absorbed.
/// - If `cx` (or an ancestor) is itself cancelled, that cancellation is
///   returned so the caller's scope keeps unwinding.
/// - Any other error from `close` is returned unchanged.
///
/// # Example
///
/// ```
/// use asupersync_streams::stream::memory::memory_stream_pair;
/// use asupersync_streams::{aclose_forcefully, Cx};
///
/// # futures_lite::future::block_on(async {
/// let cx = Cx::for_testing();
/// let (mut a, _b) = memory_stream_pair();
/// aclose_forcefully(&cx, &mut a).await?;
/// # Ok::<(), asupersync_streams::Error>(())
/// # }).unwrap();
/// ```
pub async fn aclose_forcefully<R: AsyncResource>(cx: &Cx, resource: &mut R) -> Result<()> {
    let scope = cx.cancel_scope();
    scope.cancel_with(CancelKind::Forced, Some("aclose_forcefully"));

    match resource.close(scope.cx()).await {
        Ok(()) => {
            debug!(scope = %scope.id(), "forced close completed before its first checkpoint");
            Ok(())
        }
        Err(err) if scope.cancelled_caught(&err) => {
            debug!(scope = %scope.id(), "forced close interrupted at checkpoint");
            Ok(())
        }
        Err(err) => {
            debug!(scope = %scope.id(), error = %err, "forced close failed");
            Err(err)
        }
    }
}
