//! Concurrency configuration.

use std::fmt;
use std::num::NonZeroUsize;

use tokio_util::sync::CancellationToken;

use crate::error::SelectError;

/// Environment variable read by [`SelectOptions::default`].
pub const MAX_PARALLEL_ENV: &str = "SELECT_PARALLEL_MAX";

/// Maximum number of transform invocations allowed to run at once. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaxParallel(NonZeroUsize);

impl MaxParallel {
    pub const ONE: MaxParallel = MaxParallel(NonZeroUsize::MIN);

    pub fn new(n: usize) -> Result<Self, SelectError> {
        NonZeroUsize::new(n)
            .map(Self)
            .ok_or(SelectError::InvalidConcurrency(n))
    }

    /// Parallelism reported by the host, or 1 if it can't be determined.
    pub fn available() -> Self {
        std::thread::available_parallelism()
            .map(Self)
            .unwrap_or(Self::ONE)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Number of tasks to launch up front for `len` elements.
    pub fn initial_window(self, len: usize) -> usize {
        self.get().min(len)
    }
}

impl TryFrom<usize> for MaxParallel {
    type Error = SelectError;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl fmt::Display for MaxParallel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Options shared by every strategy.
#[derive(Debug, Clone)]
pub struct SelectOptions {
    pub max_parallel: MaxParallel,
    /// Cancelling this token settles all unfinished elements as
    /// [`Outcome::Cancelled`](crate::Outcome::Cancelled).
    pub cancel_token: CancellationToken,
}

impl SelectOptions {
    pub fn new(max_parallel: MaxParallel) -> Self {
        Self {
            max_parallel,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }
}

impl Default for SelectOptions {
    fn default() -> Self {
        let max_parallel = std::env::var(MAX_PARALLEL_ENV)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .and_then(|n| MaxParallel::new(n).ok())
            .unwrap_or_else(MaxParallel::available);
        Self::new(max_parallel)
    }
}

impl From<MaxParallel> for SelectOptions {
    fn from(max_parallel: MaxParallel) -> Self {
        Self::new(max_parallel)
    }
}
