//! Data-parallel query: hand the elements to a rayon pool and block on each
//! transform inside the iteration body.
//!
//! The requested degree sizes the pool, but the cap is advisory: rayon decides
//! how work is split and stolen, and if a dedicated pool can't be built the
//! global pool is used with whatever thread count it has. This variant exists
//! for comparison and is excluded from the strict concurrency-bound guarantees.

use std::panic::AssertUnwindSafe;

use futures::stream::{self, StreamExt};
use rayon::iter::{ParallelBridge, ParallelIterator};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::config::SelectOptions;
use crate::relay::{self, PendingItem};
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
        let degree = options.max_parallel.get();
        let cancel = options.cancel_token.child_token();
        let runtime = Handle::current();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        tracing::debug!(
            strategy = "data-parallel",
            degree,
            "Starting data-parallel query"
        );

        let task_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let body = |pending: PendingItem<I::Item>| {
                let settled = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    runtime.block_on(relay::invoke(&transform, pending, &task_cancel))
                }));
                // A closed channel means the consumer left; the outcome is dropped.
                let _ = output_tx.send(settled);
            };

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(degree)
                .thread_name(|i| format!("select-parallel-{i}"))
                .build();
            match pool {
                Ok(pool) => pool.install(|| relay::enumerate(source).par_bridge().for_each(body)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        threads = rayon::current_num_threads(),
                        "Failed to build query pool, falling back to the global pool"
                    );
                    relay::enumerate(source).par_bridge().for_each(body);
                }
            }
            tracing::trace!("Data-parallel query finished");
        });

        stream::unfold(
            (output_rx, cancel.drop_guard()),
            |(mut output_rx, guard)| async move {
                let settled = output_rx.recv().await?;
                Some((relay::deliver(settled), (output_rx, guard)))
            },
        )
    })
    .flatten()
    .boxed()
}
