//! Error types for the weatherflow pipeline.
//!
//! Every pipeline stage catches its own failures and records exactly one
//! [`WeatherflowError`] in the invocation's error accumulator. Graph wiring
//! problems are reported separately as [`ConfigurationError`], which is a
//! programmer error rather than a runtime condition.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result alias for fallible weatherflow operations.
pub type Result<T> = std::result::Result<T, WeatherflowError>;

/// A failure recorded by a pipeline stage.
///
/// The type is `Clone` so that the error accumulator can hand the first
/// failure to the completion stage while keeping its own ordered history.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherflowError {
    /// Transport-level failure (connection refused, DNS, timeout, aborted body).
    #[error("network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// The server answered with a status outside `200..=299`.
    #[error("web error: HTTP status {status}")]
    Web {
        /// The HTTP status code.
        status: u16,
    },

    /// The payload could not be decoded.
    #[error("malformed data: {message}")]
    MalformedData {
        /// Decoder diagnostic.
        message: String,
    },

    /// A required field or configuration value was absent.
    #[error("missing data: {field}")]
    MissingData {
        /// Name of the absent field.
        field: String,
    },

    /// Persisting or fetching from the object store failed.
    #[error("persistence error: {message}")]
    Persistence {
        /// Description of the store failure.
        message: String,
    },

    /// The location service denied permission or failed.
    #[error("geolocation error: {reason}")]
    Geolocation {
        /// Why no coordinate could be obtained.
        reason: String,
    },

    /// The task graph was wired incorrectly.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl WeatherflowError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a web error for a non-success status code.
    #[must_use]
    pub fn web(status: u16) -> Self {
        Self::Web { status }
    }

    /// Creates a malformed data error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedData {
            message: message.into(),
        }
    }

    /// Creates a missing data error for the named field.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingData {
            field: field.into(),
        }
    }

    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Creates a geolocation error.
    #[must_use]
    pub fn geolocation(reason: impl Into<String>) -> Self {
        Self::Geolocation {
            reason: reason.into(),
        }
    }

    /// Returns a stable snake-case label for events and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Web { .. } => "web",
            Self::MalformedData { .. } => "malformed_data",
            Self::MissingData { .. } => "missing_data",
            Self::Persistence { .. } => "persistence",
            Self::Geolocation { .. } => "geolocation",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::Web { status } = self {
            map.insert("status".to_string(), serde_json::json!(status));
        }
        map
    }
}

#[cfg(test)]
impl WeatherflowError {
    pub(crate) fn is_missing_data(&self) -> bool {
        matches!(self, Self::MissingData { .. })
    }
}

/// Stable codes attached to [`ConfigurationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum ConfigurationCode {
    /// Adding an edge would close a cycle.
    GraphCycle,
    /// A referenced task id does not belong to the graph.
    GraphUnknownTask,
    /// A task depends on itself.
    GraphSelfDependency,
    /// A task targets the result context but the graph has none.
    GraphNoResultContext,
    /// The result context thread is gone.
    ResultContextClosed,
    /// The scheduler could not make progress.
    GraphStalled,
}

impl ConfigurationCode {
    /// Returns the code as a string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GraphCycle => "GRAPH-CYCLE",
            Self::GraphUnknownTask => "GRAPH-UNKNOWN-TASK",
            Self::GraphSelfDependency => "GRAPH-SELF-DEPENDENCY",
            Self::GraphNoResultContext => "GRAPH-NO-RESULT-CONTEXT",
            Self::ResultContextClosed => "RESULT-CONTEXT-CLOSED",
            Self::GraphStalled => "GRAPH-STALLED",
        }
    }
}

/// Error raised when a task graph is wired incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}] {message}", code.as_str())]
pub struct ConfigurationError {
    /// Stable error code.
    pub code: ConfigurationCode,
    /// Human readable message.
    pub message: String,
    /// Names of the tasks involved.
    pub tasks: Vec<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(code: ConfigurationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            tasks: Vec::new(),
        }
    }

    /// Sets the tasks involved.
    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Error for an edge that would close a cycle; `path` lists the loop.
    #[must_use]
    pub fn cycle(path: Vec<String>) -> Self {
        Self::new(
            ConfigurationCode::GraphCycle,
            format!("Dependency cycle: {}", path.join(" -> ")),
        )
        .with_tasks(path)
    }

    /// Error for a task id that is not part of the graph.
    #[must_use]
    pub fn unknown_task(index: usize) -> Self {
        Self::new(
            ConfigurationCode::GraphUnknownTask,
            format!("Task #{index} is not registered in this graph"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(WeatherflowError::network("refused").kind(), "network");
        assert_eq!(WeatherflowError::web(404).kind(), "web");
        assert_eq!(WeatherflowError::malformed("eof").kind(), "malformed_data");
        assert_eq!(WeatherflowError::missing("endpoint").kind(), "missing_data");
        assert_eq!(WeatherflowError::persistence("disk").kind(), "persistence");
        assert_eq!(WeatherflowError::geolocation("denied").kind(), "geolocation");
    }

    #[test]
    fn test_web_error_display_and_dict() {
        let err = WeatherflowError::web(503);
        assert_eq!(err.to_string(), "web error: HTTP status 503");

        let dict = err.to_dict();
        assert_eq!(dict.get("type").unwrap(), "web");
        assert_eq!(dict.get("status").unwrap(), 503);
    }

    #[test]
    fn test_cycle_error() {
        let err = ConfigurationError::cycle(vec![
            "fetch".to_string(),
            "parse".to_string(),
            "fetch".to_string(),
        ]);

        assert_eq!(err.code, ConfigurationCode::GraphCycle);
        assert!(err.to_string().contains("fetch -> parse -> fetch"));
        assert!(err.to_string().starts_with("[GRAPH-CYCLE]"));
    }

    #[test]
    fn test_configuration_converts_into_weatherflow_error() {
        let err: WeatherflowError = ConfigurationError::unknown_task(7).into();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("#7"));
    }
}
