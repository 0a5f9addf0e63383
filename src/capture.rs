//! Panic-safe invocation of fallible operations.
//!
//! [`capture`] and [`capture_sync`] run an operation and convert *every*
//! failure mode into an explicit [`Caught`] value: an `Err` return is held
//! verbatim, and a panic during execution is caught and rendered instead of
//! unwinding into the caller. The rest of the crate is built on this
//! primitive: the parallel mapper, the retry driver, and deferred cleanup
//! scopes all route user code through it so that partial failures can be
//! collected, ordered, and reported without losing any in-flight work.
//!
//! # Examples
//!
//! ```rust
//! use paceline::{capture, Caught};
//!
//! # async fn example() {
//! let ok = capture(async { Ok::<_, String>(21 * 2) }).await;
//! assert_eq!(ok, Ok(42));
//!
//! let err = capture(async { Err::<i32, _>(String::from("bad input")) }).await;
//! assert_eq!(err, Err(Caught::Error(String::from("bad input"))));
//!
//! let panicked = capture(async {
//!     if true {
//!         panic!("unreachable state");
//!     }
//!     Ok::<i32, String>(0)
//! })
//! .await;
//! assert!(panicked.unwrap_err().is_panic());
//! # }
//! ```

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;

use crate::error::{Caught, PanicPayload};

/// Run a suspending operation, capturing any failure.
///
/// On success the operation's value is returned unchanged. An `Err` return
/// becomes [`Caught::Error`] with the error carried verbatim; a panic while
/// the operation is being polled becomes [`Caught::Panicked`]. This
/// function itself never panics and never unwinds.
///
/// Applied to a pure operation, `capture` is idempotent: equal inputs yield
/// equal results on every call.
pub async fn capture<T, E, F>(operation: F) -> Result<T, Caught<E>>
where
    F: Future<Output = Result<T, E>>,
{
    // AssertUnwindSafe: the operation is consumed by this call and nothing
    // can observe it after an unwind.
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Caught::Error(err)),
        Err(payload) => Err(Caught::Panicked(PanicPayload::from_any(payload))),
    }
}

/// Run a non-suspending operation, capturing any failure.
///
/// The synchronous counterpart of [`capture`], with the same contract.
pub fn capture_sync<T, E, F>(operation: F) -> Result<T, Caught<E>>
where
    F: FnOnce() -> Result<T, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Caught::Error(err)),
        Err(payload) => Err(Caught::Panicked(PanicPayload::from_any(payload))),
    }
}
