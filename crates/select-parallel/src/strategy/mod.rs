//! Interchangeable algorithms behind one bounded-parallel streaming contract.
//!
//! Every strategy takes a finite source, a [`Transform`] and [`SelectOptions`],
//! and returns a lazy stream yielding exactly one [`Outcome`] per element in
//! completion order. Nothing starts until the stream is first polled.
//!
//! | strategy          | in-flight bound | source drained |
//! |-------------------|-----------------|----------------|
//! | `GateAndRace`     | strict          | eagerly        |
//! | `SlotPipeline`    | strict          | eagerly        |
//! | `ManagedPipe`     | strict          | lazily         |
//! | `DataParallel`    | advisory        | lazily         |

mod gate;
mod pipe;
mod query;
mod slots;

use std::fmt;
use std::str::FromStr;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::SelectOptions;
use crate::error::SelectError;
use crate::outcome::Outcome;
use crate::transform::Transform;

/// Single-pass stream of outcomes, in completion order.
pub type OutcomeStream<R, E> = BoxStream<'static, Outcome<R, E>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One task per element up front, a semaphore in front of the transform,
    /// outstanding tasks raced for the next completion.
    #[default]
    GateAndRace,
    /// Pre-allocated result slots claimed in completion order; each consumed
    /// slot admits one more element.
    SlotPipeline,
    /// Bounded input channel drained by a fixed pool of workers.
    ManagedPipe,
    /// Rayon pool sized to the requested degree, blocking on each transform.
    /// The cap is advisory.
    DataParallel,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::GateAndRace,
        Strategy::SlotPipeline,
        Strategy::ManagedPipe,
        Strategy::DataParallel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GateAndRace => "gate-and-race",
            Self::SlotPipeline => "slot-pipeline",
            Self::ManagedPipe => "managed-pipe",
            Self::DataParallel => "data-parallel",
        }
    }

    /// Whether the strategy guarantees that no more than `max_parallel`
    /// transforms ever run at once.
    pub fn is_strict(&self) -> bool {
        !matches!(self, Self::DataParallel)
    }

    /// Apply `transform` to every element of `source` with this strategy.
    ///
    /// Must be polled from within a tokio runtime.
    pub fn select_parallel<I, F>(
        self,
        source: I,
        transform: F,
        options: impl Into<SelectOptions>,
    ) -> OutcomeStream<F::Value, F::Error>
    where
        I: IntoIterator,
        I::IntoIter: Send + 'static,
        I::Item: Send + 'static,
        F: Transform<I::Item>,
    {
        let source = source.into_iter();
        let options = options.into();
        match self {
            Self::GateAndRace => gate::select_parallel(source, transform, options),
            Self::SlotPipeline => slots::select_parallel(source, transform, options),
            Self::ManagedPipe => pipe::select_parallel(source, transform, options),
            Self::DataParallel => query::select_parallel(source, transform, options),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = SelectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| SelectError::UnknownStrategy(s.to_string()))
    }
}
