//! Bounded-concurrency scheduler.
//!
//! Runs a worker over a list of items with at most `concurrency` invocations
//! in flight. Each completion immediately admits the next unstarted item.
//! Everything runs on the calling task: concurrency here is interleaved
//! waiting, not parallel execution.
//!
//! Results keep input order (`results[i]` belongs to `items[i]`). The first
//! worker error rejects the whole batch and drops the remaining in-flight
//! work; callers that need per-item isolation must fold failures into their
//! `Ok` value.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Run `worker` over `items` with at most `concurrency` in flight.
///
/// A `concurrency` of 0 is treated as 1.
pub async fn run_bounded<T, R, E, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    mut worker: F,
) -> Result<Vec<R>, E>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let total = items.len();
    let limit = concurrency.max(1);

    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut pending = items.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();

    for (index, item) in pending.by_ref().take(limit) {
        in_flight.push(tagged(index, worker(item)));
    }

    while let Some((index, outcome)) = in_flight.next().await {
        results[index] = Some(outcome?);

        if let Some((next_index, item)) = pending.next() {
            in_flight.push(tagged(next_index, worker(item)));
        }
    }

    // Every slot is filled once the cursor and the in-flight set are both empty.
    Ok(results.into_iter().flatten().collect())
}

/// Pair a worker future with the input index it belongs to.
async fn tagged<Fut: Future>(index: usize, fut: Fut) -> (usize, Fut::Output) {
    (index, fut.await)
}
