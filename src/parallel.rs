//! Bounded-concurrency mapping with ordered output and failure aggregation.
//!
//! [`parallel`] runs a fallible async mapping function over a sequence of
//! inputs using a fixed-size pool of concurrent workers. Output order always
//! matches input order, no matter in which order tasks complete, and *all*
//! failures are collected into one [`AggregateError`] rather than failing
//! fast on the first.
//!
//! Workers are cooperative futures driven together on the caller's task, so
//! this bounds *concurrency*, not CPU parallelism; mapping functions doing
//! heavy blocking work should hand it to `tokio::task::spawn_blocking`
//! themselves. In-flight work is never cancelled: once a worker has pulled a
//! task, that task runs to completion.
//!
//! # Examples
//!
//! ```rust
//! use paceline::parallel;
//!
//! # async fn example() -> Result<(), paceline::ParallelError<String>> {
//! let doubled = parallel(3, vec![1, 2, 3, 4, 5], |n| async move {
//!     Ok::<_, String>(n * 2)
//! })
//! .await?;
//! assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::capture::capture;
use crate::error::{AggregateError, Caught, ParallelError};

/// An input value tagged with its position in the source sequence.
struct IndexedTask<T> {
    index: usize,
    item: T,
}

/// A finished task's result, tagged with its originating position.
struct IndexedOutcome<U, E> {
    index: usize,
    result: Result<U, Caught<E>>,
}

/// Map `inputs` through `f` with at most `limit` invocations in flight.
///
/// Exactly `min(limit, inputs.len())` workers are started; each repeatedly
/// pulls the next pending task from a shared queue until the queue is empty.
/// Pull-based draining keeps the pool busy when `f` has variable latency:
/// a slow task delays only its own worker, not a pre-assigned partition.
///
/// Every invocation of `f` runs under [`capture`](crate::capture::capture),
/// so a panicking task is recorded as that task's failure instead of tearing
/// down its worker and losing the rest of the queue.
///
/// # Errors
///
/// - [`ParallelError::InvalidLimit`] if `limit` is zero. The limit is
///   validated before `inputs` is inspected, so `parallel(0, vec![], f)`
///   is still an error.
/// - [`ParallelError::Aggregate`] if any task failed, carrying every
///   failure in original input order.
///
/// An empty `inputs` with a valid limit returns `Ok(vec![])` without
/// starting any workers.
pub async fn parallel<T, U, E, F, Fut>(
    limit: usize,
    inputs: Vec<T>,
    f: F,
) -> Result<Vec<U>, ParallelError<E>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    if limit == 0 {
        return Err(ParallelError::InvalidLimit);
    }
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let total = inputs.len();
    let workers = limit.min(total);
    let queue: Mutex<VecDeque<IndexedTask<T>>> = Mutex::new(
        inputs
            .into_iter()
            .enumerate()
            .map(|(index, item)| IndexedTask { index, item })
            .collect(),
    );
    debug!(workers, total, "starting bounded parallel map");

    let queue = &queue;
    let f = &f;
    let per_worker = join_all((0..workers).map(|worker| async move {
        let mut outcomes: Vec<IndexedOutcome<U, E>> = Vec::new();
        loop {
            // The guard drops at the end of this statement; it is never
            // held across the await below.
            let task = queue.lock().pop_front();
            let Some(task) = task else { break };
            // Invoked inside the captured future, so a panic while the
            // mapping closure builds its future is this task's failure too.
            let result = capture(async { f(task.item).await }).await;
            outcomes.push(IndexedOutcome {
                index: task.index,
                result,
            });
        }
        trace!(worker, drained = outcomes.len(), "worker finished");
        outcomes
    }))
    .await;

    // Drain order under concurrency does not match input order; restore it.
    let mut outcomes: Vec<IndexedOutcome<U, E>> = per_worker.into_iter().flatten().collect();
    outcomes.sort_by_key(|outcome| outcome.index);

    let mut values = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => values.push(value),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(ParallelError::Aggregate(AggregateError::new(errors)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[tokio::test]
    async fn test_parallel_doubles_in_order() {
        let result = parallel(3, vec![1, 2, 3, 4, 5], |n| async move {
            Ok::<_, String>(n * 2)
        })
        .await;
        assert_eq!(result, Ok(vec![2, 4, 6, 8, 10]));
    }

    #[tokio::test]
    async fn test_parallel_empty_inputs_spawn_nothing() {
        let invocations = AtomicUsize::new(0);
        let result = parallel(4, Vec::<u32>::new(), |n| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, String>(n) }
        })
        .await;
        assert_eq!(result, Ok(vec![]));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parallel_zero_limit_fails_fast() {
        let result = parallel(0, vec![1, 2, 3], |n| async move { Ok::<_, String>(n) }).await;
        assert_eq!(result, Err(ParallelError::InvalidLimit));
    }

    #[tokio::test]
    async fn test_parallel_zero_limit_beats_empty_inputs() {
        // Limit validity is checked before the input sequence is inspected.
        let result = parallel(0, Vec::<u32>::new(), |n| async move { Ok::<_, String>(n) }).await;
        assert_eq!(result, Err(ParallelError::InvalidLimit));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_restores_order_under_variable_latency() {
        // Earlier items take longer, so completion order inverts input order.
        let result = parallel(5, vec![5u64, 4, 3, 2, 1], |n| async move {
            tokio::time::sleep(Duration::from_millis(n * 10)).await;
            Ok::<_, String>(n * 100)
        })
        .await;
        assert_eq!(result, Ok(vec![500, 400, 300, 200, 100]));
    }

    #[tokio::test]
    async fn test_parallel_single_failure_aggregates_one_error() {
        let result = parallel(2, vec![1, 2, 3, 4], |n| async move {
            if n == 3 {
                Err(format!("rejected {n}"))
            } else {
                Ok(n)
            }
        })
        .await;
        let agg = match result {
            Err(ParallelError::Aggregate(agg)) => agg,
            other => panic!("expected aggregate failure, got {other:?}"),
        };
        assert_eq!(agg.len(), 1);
        assert_eq!(
            agg.errors()[0],
            Caught::Error(String::from("rejected 3"))
        );
    }

    #[tokio::test]
    async fn test_parallel_collects_all_failures_in_input_order() {
        let result = parallel(3, (0..10u32).collect(), |n| async move {
            if n % 3 == 0 {
                Err(format!("bad {n}"))
            } else {
                Ok(n)
            }
        })
        .await;
        let agg = match result {
            Err(ParallelError::Aggregate(agg)) => agg,
            other => panic!("expected aggregate failure, got {other:?}"),
        };
        let messages: Vec<_> = agg
            .errors()
            .iter()
            .filter_map(|caught| caught.as_error().cloned())
            .collect();
        assert_eq!(messages, vec!["bad 0", "bad 3", "bad 6", "bad 9"]);
    }

    #[tokio::test]
    async fn test_parallel_panicking_task_does_not_lose_the_queue() {
        let result = parallel(2, vec![1, 2, 3, 4, 5], |n| async move {
            if n == 2 {
                panic!("task blew up");
            }
            Ok::<_, String>(n)
        })
        .await;
        let agg = match result {
            Err(ParallelError::Aggregate(agg)) => agg,
            other => panic!("expected aggregate failure, got {other:?}"),
        };
        // The other four tasks all ran; only the panicking one failed.
        assert_eq!(agg.len(), 1);
        assert!(agg.errors()[0].is_panic());
    }

    #[test_case(1, 5; "serial drain")]
    #[test_case(3, 5; "limit below input size")]
    #[test_case(5, 5; "limit equal to input size")]
    #[test_case(8, 3; "limit above input size")]
    #[tokio::test(start_paused = true)]
    async fn test_parallel_peak_concurrency_is_min_of_limit_and_size(limit: usize, size: usize) {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let in_flight = &in_flight;
        let peak = &peak;

        let inputs: Vec<usize> = (0..size).collect();
        let result = parallel(limit, inputs, |n| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, String>(n)
        })
        .await;

        assert_eq!(result, Ok((0..size).collect()));
        assert_eq!(peak.load(Ordering::SeqCst), limit.min(size));
    }

    #[tokio::test]
    async fn test_parallel_each_task_delivered_exactly_once() {
        let invocations = AtomicUsize::new(0);
        let invocations = &invocations;
        let result = parallel(4, (0..100u32).collect(), |n| async move {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(n)
        })
        .await;
        assert_eq!(result, Ok((0..100).collect()));
        assert_eq!(invocations.load(Ordering::SeqCst), 100);
    }
}
