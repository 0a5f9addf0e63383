//! Deferred cleanup scopes: rollback callbacks that always run.
//!
//! [`with_deferred`] executes a unit of work that may register cleanup
//! callbacks while it runs. Every registered cleanup runs exactly once, in
//! registration order, no matter how the work ends (success, error, or
//! panic), and each receives the work's captured failure, if any. A
//! cleanup registered with [`DeferScope::defer_rethrow`] can surface its own
//! failure; cleanup failures take precedence over the primary one.
//!
//! # Examples
//!
//! ```rust
//! use paceline::with_deferred;
//!
//! # async fn example() -> Result<(), paceline::DeferError<String>> {
//! let report = with_deferred(|scope| async move {
//!     let staging = create_staging_area().await?;
//!     scope.defer(move |_err| async move {
//!         remove_staging_area(staging).await
//!     });
//!     build_report().await
//! })
//! .await?;
//! assert_eq!(report, "ok");
//! # Ok(())
//! # }
//! # async fn create_staging_area() -> Result<u32, String> { Ok(7) }
//! # async fn remove_staging_area(_id: u32) -> Result<(), String> { Ok(()) }
//! # async fn build_report() -> Result<&'static str, String> { Ok("ok") }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::capture::capture;
use crate::error::{Caught, DeferError};

type CleanupFn<E> = Box<dyn FnOnce(Option<Caught<E>>) -> BoxFuture<'static, Result<(), E>> + Send>;

/// A cleanup callback paired with its rethrow flag, in registration order.
struct CleanupRegistration<E> {
    callback: CleanupFn<E>,
    rethrow: bool,
}

/// Registration handle passed to the unit of work run by [`with_deferred`].
///
/// Cheap to clone; clones all feed the same ordered registration list, which
/// belongs exclusively to one `with_deferred` invocation.
pub struct DeferScope<E> {
    registrations: Arc<Mutex<Vec<CleanupRegistration<E>>>>,
}

impl<E> Clone for DeferScope<E> {
    fn clone(&self) -> Self {
        Self {
            registrations: Arc::clone(&self.registrations),
        }
    }
}

impl<E> fmt::Debug for DeferScope<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferScope")
            .field("registered", &self.registrations.lock().len())
            .finish()
    }
}

impl<E> DeferScope<E> {
    fn new() -> Self {
        Self {
            registrations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a cleanup to run once the unit of work has finished.
    ///
    /// The cleanup receives the work's captured failure, or `None` on
    /// success. Its own failure is logged at `warn` level and discarded;
    /// use [`defer_rethrow`](Self::defer_rethrow) to surface it instead.
    pub fn defer<F, Fut>(&self, cleanup: F)
    where
        F: FnOnce(Option<Caught<E>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.register(cleanup, false);
    }

    /// Register a cleanup whose own failure is re-raised.
    ///
    /// Later cleanups still run; after all of them, the most recent failure
    /// from a rethrow-marked cleanup wins and takes precedence over the
    /// work's own error.
    pub fn defer_rethrow<F, Fut>(&self, cleanup: F)
    where
        F: FnOnce(Option<Caught<E>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.register(cleanup, true);
    }

    fn register<F, Fut>(&self, cleanup: F, rethrow: bool)
    where
        F: FnOnce(Option<Caught<E>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.registrations.lock().push(CleanupRegistration {
            callback: Box::new(move |err| -> BoxFuture<'static, Result<(), E>> {
                Box::pin(cleanup(err))
            }),
            rethrow,
        });
    }
}

/// Run `op`, then every cleanup it registered, in registration order.
///
/// `op` receives a [`DeferScope`] and may register cleanups at any point
/// while it runs. Its outcome is captured, so an `Err` return or a panic
/// never skips cleanup execution; each cleanup in turn runs captured,
/// so one failing cleanup cannot prevent the ones after it.
///
/// Cleanups registered *after* `op` has finished (by a leaked scope clone
/// or by another cleanup) are not honored: the registration list is
/// snapshotted when cleanup execution starts.
///
/// `E: Clone` because each cleanup receives its own copy of the primary
/// failure; wrap a non-clonable error in `Arc` at the call site.
///
/// # Errors
///
/// - [`DeferError::Cleanup`] if a rethrow-marked cleanup failed (the last
///   such failure wins), regardless of whether `op` itself succeeded.
/// - [`DeferError::Primary`] if `op` failed and no rethrow-marked cleanup
///   did.
pub async fn with_deferred<T, E, F, Fut>(op: F) -> Result<T, DeferError<E>>
where
    E: Clone,
    F: FnOnce(DeferScope<E>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let scope = DeferScope::new();
    let outcome = capture(async { op(scope.clone()).await }).await;

    let registrations: Vec<CleanupRegistration<E>> =
        std::mem::take(&mut *scope.registrations.lock());
    debug!(
        cleanups = registrations.len(),
        failed = outcome.is_err(),
        "running deferred cleanups"
    );

    let primary_failure = outcome.as_ref().err().cloned();
    let mut rethrown: Option<Caught<E>> = None;
    for registration in registrations {
        let callback = registration.callback;
        let result = capture(async { callback(primary_failure.clone()).await }).await;
        if let Err(failure) = result {
            if registration.rethrow {
                // Last rethrow-marked failure wins; earlier ones are replaced.
                rethrown = Some(failure);
            } else {
                warn!("cleanup failed; discarding (not rethrow-marked)");
            }
        }
    }

    if let Some(failure) = rethrown {
        return Err(DeferError::Cleanup(failure));
    }
    match outcome {
        Ok(value) => Ok(value),
        Err(failure) => Err(DeferError::Primary(failure)),
    }
}
