//! Acquires the device coordinate.

use super::record_failure;
use crate::buffers::{ErrorAccumulator, SharedList};
use crate::core::{TaskKind, TaskOutcome};
use crate::errors::WeatherflowError;
use crate::scheduler::{Task, TaskContext};
use crate::store::Coordinate;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Why no coordinate could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or platform denied location access.
    #[error("location permission denied")]
    PermissionDenied,
    /// The location service reported a failure.
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

impl From<LocationError> for WeatherflowError {
    fn from(err: LocationError) -> Self {
        Self::geolocation(err.to_string())
    }
}

/// Platform location service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Requests the current coordinate.
    async fn current_coordinate(&self) -> Result<Coordinate, LocationError>;
}

/// Provider for hosts without a location service.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLocationProvider;

#[async_trait]
impl LocationProvider for UnavailableLocationProvider {
    async fn current_coordinate(&self) -> Result<Coordinate, LocationError> {
        Err(LocationError::Unavailable("no location service configured".to_string()))
    }
}

/// Writes the device coordinate into a location buffer.
pub struct GeolocationTask {
    name: String,
    provider: Arc<dyn LocationProvider>,
    output: SharedList<Coordinate>,
    errors: ErrorAccumulator,
}

impl GeolocationTask {
    /// Creates a new geolocation stage.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        output: SharedList<Coordinate>,
        errors: ErrorAccumulator,
    ) -> Self {
        Self {
            name: "locate".to_string(),
            provider,
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
}

impl std::fmt::Debug for GeolocationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeolocationTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for GeolocationTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Locate
    }

    async fn execute(&self, ctx: &TaskContext) -> TaskOutcome {
        let result = tokio::select! {
            biased;
            () = ctx.token().cancelled() => {
                return TaskOutcome::cancelled(ctx.token().reason().unwrap_or_default());
            }
            result = self.provider.current_coordinate() => result,
        };

        match result {
            Ok(coordinate) => {
                debug!(
                    task = %self.name,
                    lat = coordinate.latitude,
                    lon = coordinate.longitude,
                    "Location acquired"
                );
                self.output.push(coordinate);
                TaskOutcome::Succeeded
            }
            Err(err) => record_failure(&self.errors, &self.name, err.into()),
        }
    }
}
