//! select-parallel: bounded-parallelism streaming map over async transforms.
//!
//! Applies an async [`Transform`] to every element of a finite source, never
//! running more than `max_parallel` transforms at once, and streams each
//! [`Outcome`] as soon as it settles. Output order is completion order, not
//! input order.
//!
//! ```no_run
//! use futures::StreamExt;
//! use select_parallel::SelectParallelExt;
//!
//! # async fn demo() -> Result<(), select_parallel::SelectError> {
//! let fetch = |id: u32| async move { Ok::<_, std::io::Error>(id * 2) };
//! let mut results = (0..100u32).select_parallel(fetch, 8)?;
//! while let Some(outcome) = results.next().await {
//!     println!("{outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Several [`Strategy`] implementations share this contract; see the
//! [`strategy`] module for how they differ.

mod config;
mod error;
mod for_each;
mod outcome;
mod relay;
mod transform;

pub mod strategy;

pub use config::{MAX_PARALLEL_ENV, MaxParallel, SelectOptions};
pub use error::{SelectError, TaskError};
pub use for_each::{for_each_parallel, for_each_parallel_with};
pub use outcome::Outcome;
pub use strategy::{OutcomeStream, Strategy};
pub use tokio_util::sync::CancellationToken;
pub use transform::Transform;

/// Apply `transform` to every element of `source` with the default strategy,
/// running at most `max_parallel` transforms at once.
///
/// Fails only if `max_parallel` is zero. The returned stream does nothing until
/// it is polled, and must be polled from within a tokio runtime.
pub fn select_parallel<I, F>(
    source: I,
    transform: F,
    max_parallel: usize,
) -> Result<OutcomeStream<F::Value, F::Error>, SelectError>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
    F: Transform<I::Item>,
{
    let max_parallel = MaxParallel::new(max_parallel)?;
    Ok(Strategy::default().select_parallel(source, transform, max_parallel))
}

/// Method-call form of [`select_parallel`] for any iterable source.
pub trait SelectParallelExt: IntoIterator + Sized {
    fn select_parallel<F>(
        self,
        transform: F,
        max_parallel: usize,
    ) -> Result<OutcomeStream<F::Value, F::Error>, SelectError>
    where
        Self::IntoIter: Send + 'static,
        Self::Item: Send + 'static,
        F: Transform<Self::Item>,
    {
        crate::select_parallel(self, transform, max_parallel)
    }

    fn select_parallel_with<F>(
        self,
        strategy: Strategy,
        transform: F,
        options: impl Into<SelectOptions>,
    ) -> OutcomeStream<F::Value, F::Error>
    where
        Self::IntoIter: Send + 'static,
        Self::Item: Send + 'static,
        F: Transform<Self::Item>,
    {
        strategy.select_parallel(self, transform, options)
    }
}

impl<I: IntoIterator> SelectParallelExt for I {}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn zero_cap_is_rejected() {
        let transform = |v: u32| async move { Ok::<_, Infallible>(v) };
        let err = select_parallel(0..3u32, transform, 0).err();
        assert_eq!(err, Some(SelectError::InvalidConcurrency(0)));
    }

    #[tokio::test]
    async fn extension_method_streams_values() {
        let transform = |v: u32| async move { Ok::<_, Infallible>(v + 1) };
        let mut values: Vec<u32> = vec![1u32, 2, 3]
            .select_parallel(transform, 2)
            .unwrap()
            .filter_map(|o| async move { o.value() })
            .collect()
            .await;
        values.sort_unstable();
        assert_eq!(values, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn extension_method_with_strategy() {
        let transform = |v: u32| async move { Ok::<_, Infallible>(v) };
        let count = (0..10u32)
            .select_parallel_with(Strategy::SlotPipeline, transform, MaxParallel::new(3).unwrap())
            .count()
            .await;
        assert_eq!(count, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cap_above_source_length_launches_everything() {
        let transform = |v: u32| async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, Infallible>(v)
        };

        let start = tokio::time::Instant::now();
        let count = select_parallel(0..4u32, transform, 1000)
            .unwrap()
            .count()
            .await;
        assert_eq!(count, 4);
        assert!(start.elapsed() < Duration::from_secs(2));

        for strategy in Strategy::ALL.into_iter().filter(Strategy::is_strict) {
            let start = tokio::time::Instant::now();
            let count = (0..4u32)
                .select_parallel_with(strategy, transform, MaxParallel::new(1000).unwrap())
                .count()
                .await;
            assert_eq!(count, 4, "{strategy}");
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "{strategy} ran elements one after another"
            );
        }
    }
}
