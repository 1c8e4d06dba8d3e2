//! The caller-supplied async function applied to every element.

use std::future::Future;

/// Async function mapping one input element to a value or an error.
///
/// Implemented for every `Fn(T) -> impl Future<Output = Result<R, E>>` that can
/// be shared across tasks, so plain closures and `async fn`s work directly.
/// Transforms are not assumed to be idempotent: each element is passed to
/// [`call`](Transform::call) at most once.
pub trait Transform<T>: Send + Sync + 'static {
    type Value: Send + 'static;
    type Error: Send + 'static;
    type Future: Future<Output = Result<Self::Value, Self::Error>> + Send + 'static;

    fn call(&self, item: T) -> Self::Future;
}

impl<T, F, Fut, R, E> Transform<T> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    type Value = R;
    type Error = E;
    type Future = Fut;

    fn call(&self, item: T) -> Fut {
        self(item)
    }
}
