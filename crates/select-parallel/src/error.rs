//! Error types.

/// Invalid configuration passed to one of the entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("max_parallel must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error(
        "unknown strategy '{0}', expected one of: gate-and-race, slot-pipeline, managed-pipe, data-parallel"
    )]
    UnknownStrategy(String),
}

/// Failure of a single element, or of the for-each form as a whole.
#[derive(Debug, thiserror::Error)]
pub enum TaskError<E> {
    /// The transform returned an error.
    #[error("transform failed: {0}")]
    Fault(E),

    #[error("operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] SelectError),
}

impl<E> TaskError<E> {
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The transform's own error, if this is a fault.
    pub fn into_fault(self) -> Option<E> {
        match self {
            Self::Fault(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_error_display() {
        insta::assert_snapshot!(
            SelectError::InvalidConcurrency(0).to_string(),
            @"max_parallel must be at least 1, got 0"
        );
        insta::assert_snapshot!(
            SelectError::UnknownStrategy("round-robin".to_string()).to_string(),
            @"unknown strategy 'round-robin', expected one of: gate-and-race, slot-pipeline, managed-pipe, data-parallel"
        );
    }

    #[test]
    fn task_error_display() {
        let err: TaskError<String> = TaskError::Fault("connection reset".to_string());
        assert_eq!(err.to_string(), "transform failed: connection reset");

        let err: TaskError<String> = TaskError::Cancelled;
        assert_eq!(err.to_string(), "operation was cancelled");

        let err: TaskError<String> = SelectError::InvalidConcurrency(0).into();
        assert_eq!(err.to_string(), "max_parallel must be at least 1, got 0");
    }

    #[test]
    fn task_error_into_fault() {
        let err: TaskError<&str> = TaskError::Fault("boom");
        assert!(err.is_fault());
        assert_eq!(err.into_fault(), Some("boom"));

        let err: TaskError<&str> = TaskError::Cancelled;
        assert!(err.is_cancelled());
        assert_eq!(err.into_fault(), None);
    }
}
