//! # paceline
//!
//! An in-process async control-flow toolkit: captured (panic-safe) calls,
//! bounded-concurrency parallel mapping, retry with backoff, and deferred
//! cleanup scopes.
//!
//! Everything is built on one primitive, [`capture()`]: run an operation and
//! turn *any* failure (an `Err` return or a panic) into an explicit
//! [`Caught`] value instead of unwinding. On top of it sit three
//! independent drivers:
//!
//! - [`parallel()`]: map a sequence through an async function with a fixed
//!   pool of pull-based workers; output order matches input order and all
//!   failures are aggregated, not just the first.
//! - [`retry()`]: invoke an operation until it succeeds, an attempt flags
//!   its error as permanent, or the attempt budget is spent, with optional
//!   fixed and computed inter-attempt delays.
//! - [`with_deferred()`]: run a unit of work that registers cleanup
//!   callbacks as it goes; every cleanup runs exactly once, in
//!   registration order, however the work ends.
//!
//! [`map_series()`] and [`reduce_series()`] round the toolkit out with
//! strictly sequential, order-preserving counterparts.
//!
//! This is a library, not a service: no CLI, no persisted state, no wire
//! protocol. Work that has started is never cancelled; callers wanting
//! cancellation should wire their own cooperative token into the operation.
//!
//! # Quick Start
//!
//! ```rust
//! use paceline::{parallel, retry, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Fetch five records, at most three requests in flight at once.
//! let records = parallel(3, vec![1, 2, 3, 4, 5], |id| async move {
//!     fetch_record(id).await
//! })
//! .await?;
//! assert_eq!(records.len(), 5);
//!
//! // Re-check a flaky endpoint, backing off between attempts.
//! let policy = RetryPolicy::times(4).with_exponential_backoff(Duration::from_millis(100));
//! let status = retry(&policy, || async {
//!     probe_endpoint().await.map_err(Into::into)
//! })
//! .await?;
//! assert_eq!(status, 200);
//! # Ok(())
//! # }
//! # async fn fetch_record(id: u32) -> Result<u32, String> { Ok(id) }
//! # async fn probe_endpoint() -> Result<u16, String> { Ok(200) }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod capture;
pub mod defer;
pub mod error;
pub mod parallel;
pub mod retry;
pub mod series;

pub use capture::{capture, capture_sync};
pub use defer::{with_deferred, DeferScope};
pub use error::{AggregateError, Caught, DeferError, PanicPayload, ParallelError, RetryError};
pub use parallel::parallel;
pub use retry::{retry, AttemptError, RetryPolicy};
pub use series::{map_series, reduce_series};
