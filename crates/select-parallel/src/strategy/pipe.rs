//! Managed pipe: bounded input channel, fixed worker pool, output channel.
//!
//! A feeder task pushes elements into an input channel of capacity
//! `max_parallel`, suspending while it is full. `max_parallel` workers share the
//! receiving end and each runs one transform at a time, publishing to an
//! output channel the consumer drains. Closing the input ends the workers;
//! the stream ends once the last worker drops its output sender.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::SelectOptions;
use crate::relay::{self, PendingItem, Settled};
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
        let workers = options.max_parallel.get();
        let cancel = options.cancel_token.child_token();
        let (input_tx, input_rx) = mpsc::channel(workers);
        let (output_tx, output_rx) = mpsc::channel(workers);
        let input_rx = Arc::new(Mutex::new(input_rx));
        let transform = Arc::new(transform);

        tracing::debug!(
            strategy = "managed-pipe",
            workers,
            "Starting pipe workers"
        );

        for worker in 0..workers {
            tokio::spawn(run_worker(
                worker,
                Arc::clone(&input_rx),
                output_tx.clone(),
                Arc::clone(&transform),
                cancel.clone(),
            ));
        }
        drop(output_tx);
        tokio::spawn(feed(source, input_tx));

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

/// Push every element into the pipe. Dropping `input` afterwards closes it.
async fn feed<I>(source: I, input: mpsc::Sender<PendingItem<I::Item>>)
where
    I: Iterator,
{
    let mut fed = 0usize;
    for pending in relay::enumerate(source) {
        if input.send(pending).await.is_err() {
            tracing::debug!(fed, "Pipe workers gone - stopped feeding");
            return;
        }
        fed += 1;
    }
    tracing::debug!(fed, "Input complete - closing pipe");
}

async fn run_worker<T, F>(
    worker: usize,
    input: Arc<Mutex<mpsc::Receiver<PendingItem<T>>>>,
    output: mpsc::Sender<Settled<F::Value, F::Error>>,
    transform: Arc<F>,
    cancel: CancellationToken,
) where
    F: Transform<T>,
{
    loop {
        let next = input.lock().await.recv().await;
        let Some(pending) = next else {
            break;
        };

        let settled = relay::invoke_settled(&*transform, pending, &cancel).await;
        if output.send(settled).await.is_err() {
            tracing::debug!(worker, "Consumer gone - worker exiting");
            return;
        }
    }
    tracing::trace!(worker, "Pipe drained - worker exiting");
}
