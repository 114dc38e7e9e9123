//! Task status, cancellation reasons and task kinds.

use crate::errors::WeatherflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Acquires the device coordinate.
    Locate,
    /// Builds the request descriptor.
    Request,
    /// Performs network I/O.
    Fetch,
    /// Decodes raw bytes into records.
    Deserialize,
    /// Maps records to values or persisted entities.
    Map,
    /// Maps and commits in one scoped session.
    Persist,
    /// Hands the outcome to the caller.
    Complete,
    /// Anything else (sentinels, closures in tests).
    #[default]
    Custom,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locate => write!(f, "locate"),
            Self::Request => write!(f, "request"),
            Self::Fetch => write!(f, "fetch"),
            Self::Deserialize => write!(f, "deserialize"),
            Self::Map => write!(f, "map"),
            Self::Persist => write!(f, "persist"),
            Self::Complete => write!(f, "complete"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Why a task ended up cancelled.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelReason {
    /// Cancelled through a handle or token before or while running.
    Explicit(String),
    /// Short-circuited because the named predecessor was cancelled.
    Predecessor(String),
    /// The task recorded a failure and cancelled itself.
    Failed(WeatherflowError),
    /// The task body panicked.
    Panicked(String),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(reason) => write!(f, "explicit: {reason}"),
            Self::Predecessor(name) => write!(f, "predecessor '{name}' cancelled"),
            Self::Failed(err) => write!(f, "failed: {err}"),
            Self::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

/// The lifecycle state of a scheduled task.
///
/// A single tagged state replaces separate "cancelled", "failed" and
/// "finished" flags; `Cancelled` carries the reason that won.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TaskStatus {
    /// Registered but not started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished without failure.
    Succeeded,
    /// Finished cancelled, for the given reason.
    Cancelled(CancelReason),
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Cancelled(_) => write!(f, "cancelled"),
        }
    }
}

impl TaskStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled(_))
    }

    /// Returns true if the task finished cancelled, for any reason.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the cancellation reason, if cancelled.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_display() {
        assert_eq!(TaskKind::Fetch.to_string(), "fetch");
        assert_eq!(TaskKind::Complete.to_string(), "complete");
        assert_eq!(TaskKind::default(), TaskKind::Custom);
    }

    #[test]
    fn test_task_kind_serialize() {
        let json = serde_json::to_string(&TaskKind::Deserialize).unwrap();
        assert_eq!(json, r#""deserialize""#);
    }

    #[test]
    fn test_task_status_is_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Cancelled(CancelReason::Explicit("x".into())).is_terminal());
    }

    #[test]
    fn test_cancel_reason_is_carried() {
        let status = TaskStatus::Cancelled(CancelReason::Failed(WeatherflowError::web(500)));
        assert!(status.is_cancelled());
        assert_eq!(status.to_string(), "cancelled");
        assert_eq!(
            status.cancel_reason().map(ToString::to_string),
            Some("failed: web error: HTTP status 500".to_string())
        );
    }
}
