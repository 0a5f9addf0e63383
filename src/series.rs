//! Order-preserving sequential async combinators.
//!
//! Unlike [`parallel`](crate::parallel::parallel), these helpers run one
//! invocation at a time and stop at the first error: plain fallible
//! combinators, not failure aggregators.

use std::future::Future;

/// Map `inputs` through `f`, one at a time, in order.
///
/// `f` also receives each item's index. The first `Err` is returned
/// immediately; later items are never invoked.
pub async fn map_series<T, U, E, F, Fut>(inputs: Vec<T>, mut f: F) -> Result<Vec<U>, E>
where
    F: FnMut(usize, T) -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    let mut values = Vec::with_capacity(inputs.len());
    for (index, item) in inputs.into_iter().enumerate() {
        values.push(f(index, item).await?);
    }
    Ok(values)
}

/// Fold `inputs` into an accumulator, one awaited step at a time.
pub async fn reduce_series<T, A, E, F, Fut>(inputs: Vec<T>, init: A, mut f: F) -> Result<A, E>
where
    F: FnMut(A, T) -> Fut,
    Fut: Future<Output = Result<A, E>>,
{
    let mut acc = init;
    for item in inputs {
        acc = f(acc, item).await?;
    }
    Ok(acc)
}
