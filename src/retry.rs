//! Sequential retry driving with optional inter-attempt delays.
//!
//! [`retry`] invokes an operation until it succeeds, an attempt flags its
//! error as [`AttemptError::Permanent`], or the [`RetryPolicy`]'s attempt
//! budget runs out. Attempts are strictly sequential (attempt N+1 never
//! starts before attempt N's outcome is known) and each runs under
//! [`capture`](crate::capture::capture), so a panicking attempt is treated
//! as a transient failure rather than unwinding out of the driver.
//!
//! # Examples
//!
//! ```rust
//! use paceline::{retry, AttemptError, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), paceline::RetryError<String>> {
//! let policy = RetryPolicy::times(5).with_delay(Duration::from_millis(50));
//! let value = retry(&policy, || async {
//!     fetch_quota().await.map_err(AttemptError::Transient)
//! })
//! .await?;
//! assert_eq!(value, 100);
//! # Ok(())
//! # }
//! # async fn fetch_quota() -> Result<u32, String> { Ok(100) }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::capture::capture;
use crate::error::{Caught, RetryError};

type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Classification of a failed attempt, reported by the operation itself.
///
/// This is the early-exit channel: a [`Permanent`](Self::Permanent) error
/// abandons the remaining attempt budget immediately and surfaces verbatim
/// as [`RetryError::Aborted`], while a [`Transient`](Self::Transient) error
/// consumes one attempt. `AttemptError` implements `From<E>` mapping to
/// `Transient`, so plain `?` inside an attempt marks errors retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// Worth retrying while budget remains.
    Transient(E),
    /// Not worth retrying; abandon the budget and surface this error.
    Permanent(E),
}

impl<E> AttemptError<E> {
    /// The underlying error, whichever way it was classified.
    pub fn into_inner(self) -> E {
        match self {
            Self::Transient(err) | Self::Permanent(err) => err,
        }
    }
}

impl<E> From<E> for AttemptError<E> {
    fn from(err: E) -> Self {
        Self::Transient(err)
    }
}

/// Attempt budget and inter-attempt delay configuration for [`retry`].
///
/// The default budget is 3 attempts with no delay. A fixed
/// [`delay`](Self::with_delay) and a computed, attempt-indexed
/// [`backoff`](Self::with_backoff) may both be set; after a failed attempt
/// the driver sleeps the fixed delay first, then the computed one.
#[derive(Clone)]
pub struct RetryPolicy {
    times: u32,
    delay: Option<Duration>,
    backoff: Option<BackoffFn>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            times: 3,
            delay: None,
            backoff: None,
        }
    }
}

impl RetryPolicy {
    /// A policy with the given attempt budget and no delays.
    ///
    /// A budget of zero is representable but rejected by [`retry`] before
    /// any attempt runs; the driver always runs at least one attempt.
    pub fn times(times: u32) -> Self {
        Self {
            times,
            ..Self::default()
        }
    }

    /// Sleep a fixed duration between failed attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep a computed duration between failed attempts.
    ///
    /// The function receives the 1-based index of the attempt that just
    /// failed, so delays can grow with the attempt count.
    #[must_use]
    pub fn with_backoff<B>(mut self, backoff: B) -> Self
    where
        B: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.backoff = Some(Arc::new(backoff));
        self
    }

    /// Sleep `base * 2^(attempt - 1)` between failed attempts.
    #[must_use]
    pub fn with_exponential_backoff(self, base: Duration) -> Self {
        self.with_backoff(move |attempt| {
            base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        })
    }

    /// The configured attempt budget.
    pub fn attempts(&self) -> u32 {
        self.times
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("times", &self.times)
            .field("delay", &self.delay)
            .field("backoff", &self.backoff.is_some())
            .finish()
    }
}

/// Drive `op` until it succeeds or the policy's budget is spent.
///
/// Returns the first successful value. Each attempt reports failures as
/// [`AttemptError`]; see [`RetryError`] for the three ways the driver can
/// give up. An attempt that has started always runs to completion; there
/// is no cancellation of in-flight attempts.
///
/// # Errors
///
/// - [`RetryError::InvalidPolicy`] if the budget is zero; `op` is never
///   invoked.
/// - [`RetryError::Aborted`] with the attempt's error, verbatim, if an
///   attempt reported it as [`AttemptError::Permanent`].
/// - [`RetryError::Exhausted`] with the final attempt's failure once the
///   budget is spent.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    if policy.times == 0 {
        return Err(RetryError::InvalidPolicy);
    }

    let mut attempt = 1u32;
    loop {
        let failure = match capture(async { op().await }).await {
            Ok(value) => return Ok(value),
            Err(Caught::Error(AttemptError::Permanent(err))) => {
                debug!(attempt, "attempt requested early exit");
                return Err(RetryError::Aborted(err));
            }
            Err(Caught::Error(AttemptError::Transient(err))) => Caught::Error(err),
            Err(Caught::Panicked(payload)) => Caught::Panicked(payload),
        };

        if attempt == policy.times {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                error: failure,
            });
        }
        warn!(
            attempt,
            remaining = policy.times - attempt,
            "attempt failed; retrying"
        );

        if let Some(delay) = policy.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(backoff) = &policy.backoff {
            tokio::time::sleep(backoff(attempt)).await;
        }
        attempt += 1;
    }
}
