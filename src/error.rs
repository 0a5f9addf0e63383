//! Error types for the toolkit.
//!
//! Every failure a caller can observe is one of the types in this module.
//! All of them are generic over the wrapped operation's own error type `E`,
//! which is carried verbatim rather than boxed or stringified, so call
//! sites keep exhaustive, typed access to the underlying failure.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Best-effort rendering of a panic payload.
///
/// Rust panics carry an arbitrary `Box<dyn Any>`; in practice nearly all of
/// them are `&str` or `String` messages. Anything else is replaced with a
/// placeholder rather than dropped silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload(String);

impl PanicPayload {
    pub(crate) fn from_any(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_owned()
        };
        Self(message)
    }

    /// The panic message, as close to the original as the payload allows.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A failure captured by [`capture`](crate::capture::capture).
///
/// Exactly one of the two variants is produced per failed call: the
/// operation's own error, held verbatim, or the payload of a panic that
/// unwound out of it. Success is represented by the surrounding
/// [`Result`], never by this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Caught<E> {
    /// The operation returned an error of its own.
    #[error("{0}")]
    Error(E),
    /// The operation panicked while running.
    #[error("operation panicked: {0}")]
    Panicked(PanicPayload),
}

impl<E> Caught<E> {
    /// The operation's own error, if this failure was not a panic.
    pub fn as_error(&self) -> Option<&E> {
        match self {
            Self::Error(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }

    /// Consume the failure, yielding the operation's own error if present.
    pub fn into_error(self) -> Option<E> {
        match self {
            Self::Error(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }

    /// Whether this failure was a panic rather than a returned error.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// Every per-task failure collected by one [`parallel`](crate::parallel::parallel)
/// invocation, in original input order.
///
/// The list is never empty: an invocation with no failing tasks returns its
/// values instead of constructing this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} parallel task(s) failed", .errors.len())]
pub struct AggregateError<E> {
    errors: Vec<Caught<E>>,
}

impl<E> AggregateError<E> {
    pub(crate) fn new(errors: Vec<Caught<E>>) -> Self {
        debug_assert!(!errors.is_empty());
        Self { errors }
    }

    /// The collected failures, ordered by the originating input index.
    pub fn errors(&self) -> &[Caught<E>] {
        &self.errors
    }

    /// Consume the aggregate, yielding the ordered failure list.
    pub fn into_errors(self) -> Vec<Caught<E>> {
        self.errors
    }

    /// Number of failed tasks.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; kept for `len`/`is_empty` pairing convention.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Failure of a [`parallel`](crate::parallel::parallel) invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParallelError<E> {
    /// The concurrency limit was zero. Checked before the input sequence is
    /// inspected, so an empty input does not excuse an invalid limit.
    #[error("concurrency limit must be at least 1")]
    InvalidLimit,
    /// One or more tasks failed; all of their errors are collected here.
    #[error("{0}")]
    Aggregate(AggregateError<E>),
}

impl<E> ParallelError<E> {
    /// The aggregated per-task failures, if any tasks ran and failed.
    pub fn aggregate(&self) -> Option<&AggregateError<E>> {
        match self {
            Self::Aggregate(agg) => Some(agg),
            Self::InvalidLimit => None,
        }
    }
}

/// Failure of a [`retry`](crate::retry::retry) invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The policy's attempt budget was zero; the driver must always be able
    /// to run at least one attempt.
    #[error("retry budget must allow at least one attempt")]
    InvalidPolicy,
    /// An attempt flagged its error as permanent; the remaining budget was
    /// abandoned and the error is surfaced verbatim.
    #[error("{0}")]
    Aborted(E),
    /// Every attempt in the budget failed; the final attempt's failure is
    /// carried verbatim.
    #[error("operation still failing after {attempts} attempt(s): {error}")]
    Exhausted {
        /// How many attempts ran. Always equals the policy's budget.
        attempts: u32,
        /// The last attempt's failure.
        error: Caught<E>,
    },
}

/// Failure of a [`with_deferred`](crate::defer::with_deferred) scope.
///
/// Cleanup failures take precedence over the primary operation's failure:
/// a scope whose work *and* a rethrow-marked cleanup both fail reports the
/// cleanup's error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeferError<E> {
    /// A rethrow-marked cleanup failed after all cleanups ran.
    #[error("deferred cleanup failed: {0}")]
    Cleanup(Caught<E>),
    /// The primary operation failed and no rethrow-marked cleanup did.
    #[error("{0}")]
    Primary(Caught<E>),
}

impl<E> DeferError<E> {
    /// The captured failure, regardless of which side produced it.
    pub fn caught(&self) -> &Caught<E> {
        match self {
            Self::Cleanup(err) | Self::Primary(err) => err,
        }
    }

    /// Consume the error, yielding the captured failure.
    pub fn into_caught(self) -> Caught<E> {
        match self {
            Self::Cleanup(err) | Self::Primary(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_renders_str_and_string() {
        let p = PanicPayload::from_any(Box::new("boom"));
        assert_eq!(p.message(), "boom");

        let p = PanicPayload::from_any(Box::new(String::from("kaboom")));
        assert_eq!(p.message(), "kaboom");

        let p = PanicPayload::from_any(Box::new(42_u32));
        assert_eq!(p.message(), "<non-string panic payload>");
    }

    #[test]
    fn test_caught_display_is_verbatim_for_errors() {
        let caught: Caught<String> = Caught::Error("disk full".into());
        assert_eq!(caught.to_string(), "disk full");
        assert_eq!(caught.as_error().map(String::as_str), Some("disk full"));
        assert!(!caught.is_panic());
    }

    #[test]
    fn test_caught_display_marks_panics() {
        let caught: Caught<String> = Caught::Panicked(PanicPayload::from_any(Box::new("oops")));
        assert!(caught.to_string().contains("panicked"));
        assert!(caught.to_string().contains("oops"));
        assert!(caught.is_panic());
        assert_eq!(caught.into_error(), None);
    }

    #[test]
    fn test_aggregate_display_counts_failures() {
        let agg: AggregateError<String> = AggregateError::new(vec![
            Caught::Error("a".into()),
            Caught::Error("b".into()),
        ]);
        assert_eq!(agg.len(), 2);
        assert!(agg.to_string().contains('2'));
    }

    #[test]
    fn test_retry_error_display() {
        let err: RetryError<String> = RetryError::Exhausted {
            attempts: 4,
            error: Caught::Error("no route".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains('4'));
        assert!(msg.contains("no route"));
    }

    #[test]
    fn test_defer_error_precedence_accessors() {
        let err: DeferError<String> = DeferError::Cleanup(Caught::Error("unlink failed".into()));
        assert_eq!(err.caught().as_error().map(String::as_str), Some("unlink failed"));
        assert!(err.to_string().contains("cleanup failed"));
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Caught<String>>();
        assert_send_sync::<AggregateError<String>>();
        assert_send_sync::<ParallelError<String>>();
        assert_send_sync::<RetryError<String>>();
        assert_send_sync::<DeferError<String>>();
    }
}
