//! Gate-and-race: one task per element, a semaphore in front of the transform.
//!
//! Every element is spawned as soon as the stream is first polled. A task must
//! take one of `max_parallel` permits before it calls the transform and holds
//! it until the transform settles, so the bound applies to running transforms
//! while the number of parked tasks is unbounded. The consumer races all
//! outstanding join handles and yields whichever settles first.

use std::sync::Arc;

use futures::stream::{self, FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::config::SelectOptions;
use crate::outcome::Outcome;
use crate::relay;
use crate::strategy::OutcomeStream;
use crate::transform::Transform;

pub(crate) fn select_parallel<I, F>(
    source: I,
    transform: F,
    options: SelectOptions,
) -> OutcomeStream<F::Value, F::Error>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
    F: Transform<I::Item>,
{
    stream::once(async move {
        let SelectOptions {
            max_parallel,
            cancel_token,
        } = options;
        let cancel = cancel_token.child_token();
        let gate = Arc::new(Semaphore::new(max_parallel.get()));
        let transform = Arc::new(transform);

        let tasks: FuturesUnordered<_> = relay::enumerate(source)
            .map(|pending| {
                let gate = Arc::clone(&gate);
                let transform = Arc::clone(&transform);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Outcome::Cancelled,
                        permit = gate.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return Outcome::Cancelled,
                        },
                    };
                    relay::invoke(&*transform, pending, &cancel).await
                })
            })
            .collect();

        tracing::debug!(
            strategy = "gate-and-race",
            items = tasks.len(),
            max_parallel = %max_parallel,
            "Spawned gated tasks"
        );

        stream::unfold(
            (tasks, cancel.drop_guard()),
            |(mut tasks, guard)| async move {
                let joined = tasks.next().await?;
                Some((relay::from_join(joined), (tasks, guard)))
            },
        )
    })
    .flatten()
    .boxed()
}
