//! Builds the forecast request for one invocation.

use super::record_failure;
use crate::buffers::{ErrorAccumulator, SharedList, Slot};
use crate::core::{TaskKind, TaskOutcome};
use crate::errors::{Result, WeatherflowError};
use crate::scheduler::{Task, TaskContext};
use crate::store::Coordinate;
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

/// Path appended to the endpoint.
pub const FORECAST_PATH: &str = "forecast";

/// What the request asks for.
#[derive(Debug, Clone)]
pub enum RegionQuery {
    /// A city by server id.
    ById(i64),
    /// A fixed coordinate.
    ByCoordinate(Coordinate),
    /// The latest coordinate written by a geolocation stage.
    FromLocation(SharedList<Coordinate>),
}

/// A fully formed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Absolute URL including the query string.
    pub url: Url,
}

impl RequestDescriptor {
    /// Value of the first query parameter named `key`.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// All query parameters in order.
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

/// Writes a [`RequestDescriptor`] into its output slot.
pub struct RequestTask {
    name: String,
    endpoint: String,
    api_key: String,
    query: RegionQuery,
    output: Slot<RequestDescriptor>,
    errors: ErrorAccumulator,
}

impl RequestTask {
    /// Creates a new request stage.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        query: RegionQuery,
        output: Slot<RequestDescriptor>,
        errors: ErrorAccumulator,
    ) -> Self {
        Self {
            name: "request".to_string(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            query,
            output,
            errors,
        }
    }

    /// Sets the task name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the descriptor without writing it anywhere.
    ///
    /// # Errors
    ///
    /// Returns `MissingData` if the endpoint, key or location is absent and
    /// `MalformedData` if the endpoint is not a usable URL.
    pub fn build(&self) -> Result<RequestDescriptor> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(WeatherflowError::missing("endpoint"));
        }
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(WeatherflowError::missing("api_key"));
        }

        let params: Vec<(&str, String)> = match &self.query {
            RegionQuery::ById(sid) => vec![
                ("units", "metric".to_string()),
                ("id", sid.to_string()),
                ("APPID", key.to_string()),
            ],
            RegionQuery::ByCoordinate(coordinate) => coordinate_params(*coordinate, key),
            RegionQuery::FromLocation(locations) => {
                let coordinate = locations
                    .last()
                    .ok_or_else(|| WeatherflowError::missing("location"))?;
                coordinate_params(coordinate, key)
            }
        };

        let base = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("https://{endpoint}")
        };
        let mut url = Url::parse(&base)
            .map_err(|e| WeatherflowError::malformed(format!("endpoint '{endpoint}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                WeatherflowError::malformed(format!("endpoint '{endpoint}' cannot carry a path"))
            })?
            .pop_if_empty()
            .push(FORECAST_PATH);
        url.query_pairs_mut().clear().extend_pairs(params);

        Ok(RequestDescriptor { url })
    }
}

fn coordinate_params(coordinate: Coordinate, key: &str) -> Vec<(&'static str, String)> {
    vec![
        ("lat", coordinate.latitude.to_string()),
        ("lon", coordinate.longitude.to_string()),
        ("units", "metric".to_string()),
        ("APPID", key.to_string()),
    ]
}

impl std::fmt::Debug for RequestTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTask")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for RequestTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Request
    }

    async fn execute(&self, _ctx: &TaskContext) -> TaskOutcome {
        match self.build() {
            Ok(descriptor) => {
                debug!(task = %self.name, url = %descriptor.url.path(), "Request built");
                if self.output.set(descriptor).is_err() {
                    debug!(task = %self.name, "Request slot already resolved; keeping it");
                }
                TaskOutcome::Succeeded
            }
            Err(err) => record_failure(&self.errors, &self.name, err),
        }
    }
}
