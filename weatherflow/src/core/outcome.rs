//! What a task body reports back to the scheduler.

use crate::errors::WeatherflowError;

/// Result of running one task body.
///
/// Bodies never raise; failures are returned as `Failed` after the task has
/// recorded them in its error accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The body completed its work.
    Succeeded,
    /// The body hit a local failure and cancelled itself.
    Failed(WeatherflowError),
    /// The body stopped early without a failure.
    Cancelled(String),
}

impl TaskOutcome {
    /// Creates a cancelled outcome.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Returns true if the outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl From<Result<(), WeatherflowError>> for TaskOutcome {
    fn from(result: Result<(), WeatherflowError>) -> Self {
        match result {
            Ok(()) => Self::Succeeded,
            Err(err) => Self::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(TaskOutcome::from(Ok(())), TaskOutcome::Succeeded);
        let failed = TaskOutcome::from(Err(WeatherflowError::missing("key")));
        assert!(!failed.is_success());
        assert!(matches!(failed, TaskOutcome::Failed(WeatherflowError::MissingData { .. })));
    }
}
