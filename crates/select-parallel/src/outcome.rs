//! Settled result of one transform invocation.

use crate::error::TaskError;

/// What one input element settled into.
///
/// Exactly one `Outcome` is produced per input element, and it is delivered at
/// most once. Faults travel through the stream alongside values, so the
/// consumer handles both on the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R, E> {
    /// The transform returned a value.
    Value(R),
    /// The transform returned an error for this element.
    Fault(E),
    /// The element's work was abandoned before the transform settled.
    Cancelled,
}

impl<R, E> Outcome<R, E> {
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn value(self) -> Option<R> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn fault(self) -> Option<E> {
        match self {
            Self::Fault(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&R> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> Outcome<U, E> {
        match self {
            Self::Value(v) => Outcome::Value(f(v)),
            Self::Fault(e) => Outcome::Fault(e),
            Self::Cancelled => Outcome::Cancelled,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Fault(_) => "fault",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn into_result(self) -> Result<R, TaskError<E>> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Fault(e) => Err(TaskError::Fault(e)),
            Self::Cancelled => Err(TaskError::Cancelled),
        }
    }
}

impl<R, E> From<Result<R, E>> for Outcome<R, E> {
    fn from(result: Result<R, E>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Fault(e),
        }
    }
}
