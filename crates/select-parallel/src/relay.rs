//! Completion relay shared by every strategy.
//!
//! Each launched transform settles into exactly one [`Outcome`]. Strategies hand
//! the settled outcome to the consumer over a channel or a join handle; a panic
//! raised by the transform travels as a payload and is resumed on the consuming
//! task once that element is reached.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::outcome::Outcome;
use crate::transform::Transform;

/// Outcome of one element, or the panic payload its transform raised.
pub(crate) type Settled<R, E> = std::thread::Result<Outcome<R, E>>;

/// An input element paired with its position in the source sequence.
#[derive(Debug)]
pub(crate) struct PendingItem<T> {
    pub index: usize,
    pub item: T,
}

pub(crate) fn enumerate<I: IntoIterator>(source: I) -> impl Iterator<Item = PendingItem<I::Item>> {
    source
        .into_iter()
        .enumerate()
        .map(|(index, item)| PendingItem { index, item })
}

/// Run the transform over one element unless cancellation wins first.
///
/// A token that is already cancelled short-circuits without calling the
/// transform at all.
pub(crate) async fn invoke<T, F: Transform<T>>(
    transform: &F,
    pending: PendingItem<T>,
    cancel: &CancellationToken,
) -> Outcome<F::Value, F::Error> {
    let PendingItem { index, item } = pending;
    if cancel.is_cancelled() {
        tracing::trace!(index, "Skipping transform - already cancelled");
        return Outcome::Cancelled;
    }

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Outcome::Cancelled,
        result = transform.call(item) => Outcome::from(result),
    };
    tracing::trace!(index, outcome = outcome.kind(), "Transform settled");
    outcome
}

/// [`invoke`] with a panicking transform captured instead of unwinding.
pub(crate) async fn invoke_settled<T, F: Transform<T>>(
    transform: &F,
    pending: PendingItem<T>,
    cancel: &CancellationToken,
) -> Settled<F::Value, F::Error> {
    let index = pending.index;
    let settled = AssertUnwindSafe(invoke(transform, pending, cancel))
        .catch_unwind()
        .await;
    if settled.is_err() {
        tracing::debug!(index, "Transform panicked");
    }
    settled
}

/// Unwrap a settled outcome on the consuming side.
pub(crate) fn deliver<R, E>(settled: Settled<R, E>) -> Outcome<R, E> {
    match settled {
        Ok(outcome) => outcome,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Translate a joined task into its outcome. Aborted tasks count as cancelled.
pub(crate) fn from_join<R, E>(joined: Result<Outcome<R, E>, JoinError>) -> Outcome<R, E> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Outcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn pending(index: usize) -> PendingItem<usize> {
        PendingItem { index, item: index }
    }

    #[test]
    fn enumerate_tags_positions() {
        let items: Vec<_> = enumerate(["a", "b", "c"])
            .map(|p| (p.index, p.item))
            .collect();
        assert_eq!(items, vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[tokio::test]
    async fn invoke_maps_result() {
        let transform = |v: usize| async move {
            if v % 2 == 0 {
                Ok(v * 10)
            } else {
                Err(format!("odd {v}"))
            }
        };
        let cancel = CancellationToken::new();

        assert_eq!(
            invoke(&transform, pending(2), &cancel).await,
            Outcome::Value(20)
        );
        assert_eq!(
            invoke(&transform, pending(3), &cancel).await,
            Outcome::Fault("odd 3".to_string())
        );
    }

    #[tokio::test]
    async fn invoke_skips_transform_when_already_cancelled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transform = {
            let calls = Arc::clone(&calls);
            move |v: usize| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, ()>(v) }
            }
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = invoke(&transform, pending(0), &cancel).await;
        assert!(outcome.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_stops_waiting_on_cancel() {
        let transform = |_: usize| std::future::pending::<Result<usize, ()>>();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = invoke(&transform, pending(0), &cancel).await;
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn invoke_settled_captures_panic() {
        let transform = |v: usize| async move {
            if v == 1 {
                panic!("bad element");
            }
            Ok::<_, ()>(v)
        };
        let cancel = CancellationToken::new();

        let settled = invoke_settled(&transform, pending(1), &cancel).await;
        let payload = settled.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"bad element"));

        let settled = invoke_settled(&transform, pending(0), &cancel).await;
        assert_eq!(deliver(settled), Outcome::Value(0));
    }

    #[test]
    #[should_panic(expected = "resumed")]
    fn deliver_resumes_panic() {
        let settled: Settled<u32, ()> = Err(Box::new("resumed"));
        deliver(settled);
    }

    #[tokio::test]
    async fn aborted_task_joins_as_cancelled() {
        let handle = tokio::spawn(async {
            std::future::pending::<()>().await;
            Outcome::<u32, ()>::Value(1)
        });
        handle.abort();

        assert!(from_join(handle.await).is_cancelled());
    }

    #[tokio::test]
    async fn joined_outcome_passes_through() {
        let handle = tokio::spawn(async { Outcome::<u32, ()>::Value(5) });
        assert_eq!(from_join(handle.await), Outcome::Value(5));
    }
}
