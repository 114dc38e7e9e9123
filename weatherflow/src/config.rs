//! Per-invocation configuration.
//!
//! A [`WeatherConfig`] value is handed to the service at construction time and
//! copied into each pipeline it assembles; nothing reads process-wide state
//! after that. Blank endpoint or key values are accepted here and surface as
//! `MissingData` from the request stage.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the API base URL.
pub const ENV_ENDPOINT: &str = "WEATHERFLOW_ENDPOINT";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "WEATHERFLOW_API_KEY";
/// Environment variable bounding concurrent task bodies.
pub const ENV_MAX_CONCURRENCY: &str = "WEATHERFLOW_MAX_CONCURRENCY";
/// Environment variable holding the fetch timeout in seconds.
pub const ENV_TIMEOUT_SECONDS: &str = "WEATHERFLOW_TIMEOUT_SECONDS";

/// Configuration for the weather pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// API base URL; `/forecast` is appended.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key sent as `APPID`.
    #[serde(default)]
    pub api_key: String,
    /// Maximum number of task bodies running at once per pipeline.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Fetch timeout in seconds; `None` waits indefinitely.
    #[serde(default)]
    pub request_timeout_seconds: Option<f64>,
    /// User agent for the HTTP client.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_endpoint() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_user_agent() -> String {
    format!("weatherflow/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            max_concurrency: default_max_concurrency(),
            request_timeout_seconds: None,
            user_agent: default_user_agent(),
        }
    }
}

impl WeatherConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads defaults overridden by `WEATHERFLOW_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults overridden by values from `lookup`.
    ///
    /// Blank or unparseable values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(endpoint) = value(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(key) = value(ENV_API_KEY) {
            config.api_key = key;
        }
        if let Some(max) = value(ENV_MAX_CONCURRENCY).and_then(|v| v.parse::<usize>().ok()) {
            config.max_concurrency = max.max(1);
        }
        if let Some(seconds) = value(ENV_TIMEOUT_SECONDS).and_then(|v| v.parse::<f64>().ok()) {
            config.request_timeout_seconds = Some(seconds);
        }
        config
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Sets the fetch timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.request_timeout_seconds = Some(seconds);
        self
    }

    /// The fetch timeout, if a positive one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WeatherConfig::new();
        assert_eq!(config.endpoint, "https://api.openweathermap.org/data/2.5");
        assert!(config.api_key.is_empty());
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.timeout(), None);
        assert!(config.user_agent.starts_with("weatherflow/"));
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_blanks() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ENDPOINT, "  "),
            (ENV_API_KEY, "secret"),
            (ENV_MAX_CONCURRENCY, "0"),
            (ENV_TIMEOUT_SECONDS, "2.5"),
        ]);
        let config = WeatherConfig::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.endpoint, "https://api.openweathermap.org/data/2.5");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_unparseable_values_are_ignored() {
        let config = WeatherConfig::from_lookup(|key| match key {
            ENV_MAX_CONCURRENCY | ENV_TIMEOUT_SECONDS => Some("many".to_string()),
            _ => None,
        });
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.request_timeout_seconds, None);
    }

    #[test]
    fn test_non_positive_timeout_disables_it() {
        assert_eq!(WeatherConfig::new().with_timeout(0.0).timeout(), None);
        assert_eq!(WeatherConfig::new().with_timeout(-1.0).timeout(), None);
    }

    #[test]
    fn test_unrepresentable_timeout_disables_it() {
        let config =
            WeatherConfig::from_lookup(|key| (key == ENV_TIMEOUT_SECONDS).then(|| "1e30".into()));
        assert_eq!(config.timeout(), None);
        assert_eq!(WeatherConfig::new().with_timeout(f64::INFINITY).timeout(), None);
        assert_eq!(WeatherConfig::new().with_timeout(f64::NAN).timeout(), None);
    }

    #[test]
    fn test_serde_defaults() {
        let config: WeatherConfig = serde_json::from_str(r#"{"api_key": "k"}"#).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.endpoint, default_endpoint());
    }
}
