//! Bounded-concurrency for-each without an output stream.
//!
//! Bodies run concurrently on the calling task, at most `max_parallel` at a
//! time. The first fault wins: it is returned immediately and every body still
//! in progress is dropped at its next suspension point. Elements not yet
//! started are never visited.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::{MaxParallel, SelectOptions};
use crate::error::TaskError;

/// Run `body` over every element with at most `max_parallel` in progress.
pub async fn for_each_parallel<I, F, Fut, E>(
    source: I,
    body: F,
    max_parallel: usize,
) -> Result<(), TaskError<E>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let max_parallel = MaxParallel::new(max_parallel)?;
    for_each_parallel_with(source, body, max_parallel).await
}

/// [`for_each_parallel`] with explicit options. Cancelling the options' token
/// stops the run with [`TaskError::Cancelled`].
pub async fn for_each_parallel_with<I, F, Fut, E>(
    source: I,
    body: F,
    options: impl Into<SelectOptions>,
) -> Result<(), TaskError<E>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let SelectOptions {
        max_parallel,
        cancel_token,
    } = options.into();

    let run = stream::iter(source)
        .map(Ok::<_, E>)
        .try_for_each_concurrent(max_parallel.get(), body);

    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
            tracing::debug!("For-each cancelled");
            Err(TaskError::Cancelled)
        }
        result = run => result.map_err(|e| {
            tracing::debug!(max_parallel = %max_parallel, "For-each stopped on first fault");
            TaskError::Fault(e)
        }),
    }
}
