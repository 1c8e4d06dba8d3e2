//! Slot pipeline: a sliding window over a table of pre-allocated result slots.
//!
//! The source is drained into a queue and one single-use slot is allocated per
//! element. The first `min(max_parallel, len)` elements are launched up front;
//! after that, each slot the consumer reads launches exactly one more element,
//! which keeps at most `max_parallel` transforms in flight.
//!
//! Slots are claimed in **completion order**: the task that settles n-th
//! writes into slot n, whatever its input position was. Reading slot `i`
//! therefore does not give the result for `source[i]`; the stream is a
//! permutation of the per-element outcomes decided by real-time completion.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use futures::stream::{self, StreamExt};
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::SelectOptions;
use crate::outcome::Outcome;
use crate::relay::{self, PendingItem, Settled};
use crate::strategy::OutcomeStream;
use crate::transform::Transform;

/// Producer side of the slot table, shared by every launched task.
struct SlotTable<R, E> {
    slots: Box<[StdMutex<Option<oneshot::Sender<Settled<R, E>>>>]>,
    /// Next slot to hand to a completing task.
    next_ready: AtomicUsize,
}

impl<R, E> SlotTable<R, E> {
    /// Allocate `len` slots, returning the table and the receivers in slot order.
    fn new(len: usize) -> (Arc<Self>, VecDeque<oneshot::Receiver<Settled<R, E>>>) {
        let mut slots = Vec::with_capacity(len);
        let mut receivers = VecDeque::with_capacity(len);
        for _ in 0..len {
            let (tx, rx) = oneshot::channel();
            slots.push(StdMutex::new(Some(tx)));
            receivers.push_back(rx);
        }

        let table = Arc::new(Self {
            slots: slots.into_boxed_slice(),
            next_ready: AtomicUsize::new(0),
        });
        (table, receivers)
    }

    /// Claim the next free slot and write the settled outcome into it.
    fn fill(&self, settled: Settled<R, E>) {
        let slot = self.next_ready.fetch_add(1, Ordering::AcqRel);
        let Some(cell) = self.slots.get(slot) else {
            tracing::error!(slot, "Bug: slot table overflow - outcome dropped");
            return;
        };

        let sender = match cell.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => {
                tracing::error!(slot, "Slot mutex poisoned - recovering");
                poisoned.into_inner().take()
            }
        };

        match sender {
            Some(tx) => {
                if tx.send(settled).is_err() {
                    tracing::trace!(slot, "Consumer gone - outcome discarded");
                }
            }
            None => tracing::error!(slot, "Bug: slot filled twice"),
        }
    }
}

/// Consumer side: owns the launch cursor and the slot receivers.
struct Pipeline<T, F: Transform<T>> {
    pending: VecDeque<PendingItem<T>>,
    receivers: VecDeque<oneshot::Receiver<Settled<F::Value, F::Error>>>,
    table: Arc<SlotTable<F::Value, F::Error>>,
    transform: Arc<F>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl<T, F> Pipeline<T, F>
where
    T: Send + 'static,
    F: Transform<T>,
{
    /// Launch the next element that has not been started yet, if any.
    fn launch_next(&mut self) {
        let Some(pending) = self.pending.pop_front() else {
            return;
        };
        tracing::trace!(index = pending.index, "Launching element");

        let table = Arc::clone(&self.table);
        let transform = Arc::clone(&self.transform);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let settled = relay::invoke_settled(&*transform, pending, &cancel).await;
            table.fill(settled);
        });
    }

    /// Wait for the next slot, then admit one more element.
    async fn next_outcome(&mut self) -> Option<Outcome<F::Value, F::Error>> {
        let receiver = self.receivers.pop_front()?;
        let outcome = match receiver.await {
            Ok(settled) => relay::deliver(settled),
            // The filling task was torn down with the runtime.
            Err(_) => Outcome::Cancelled,
        };
        self.launch_next();
        Some(outcome)
    }
}

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
        let pending: VecDeque<_> = relay::enumerate(source).collect();
        let (table, receivers) = SlotTable::new(pending.len());
        let window = options.max_parallel.initial_window(pending.len());
        let cancel = options.cancel_token.child_token();

        tracing::debug!(
            strategy = "slot-pipeline",
            items = pending.len(),
            max_parallel = %options.max_parallel,
            window,
            "Seeding slot pipeline"
        );

        let mut pipeline = Pipeline {
            pending,
            receivers,
            table,
            transform: Arc::new(transform),
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        };
        for _ in 0..window {
            pipeline.launch_next();
        }

        stream::unfold(pipeline, |mut pipeline| async move {
            let outcome = pipeline.next_outcome().await?;
            Some((outcome, pipeline))
        })
    })
    .flatten()
    .boxed()
}
