//! Performs the HTTP request.

use super::{record_failure, RequestDescriptor};
use crate::buffers::{ByteBuffer, ErrorAccumulator, Slot};
use crate::config::WeatherConfig;
use crate::core::{TaskKind, TaskOutcome};
use crate::errors::{Result, WeatherflowError};
use crate::scheduler::{Task, TaskContext};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in `200..=299`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by the fetch stage.
///
/// Implementations return `Err` only for transport failures; any HTTP status
/// is a successful response at this level.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues a GET request.
    async fn get(&self, request: &RequestDescriptor) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    http: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Builds a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Network` if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WeatherflowError::network(e.to_string()))?;
        Ok(Self { http })
    }

    /// Wraps an existing `reqwest` client.
    #[must_use]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, request: &RequestDescriptor) -> Result<HttpResponse> {
        let response = self
            .http
            .get(request.url.clone())
            .send()
            .await
            .map_err(|e| WeatherflowError::network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| WeatherflowError::network(e.to_string()))?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Fetches the request written by the request stage into a byte buffer.
///
/// A buffer that already holds bytes is treated as a cached response and no
/// request is made.
pub struct FetchTask {
    name: String,
    client: Arc<dyn HttpClient>,
    request: Slot<RequestDescriptor>,
    output: ByteBuffer,
    errors: ErrorAccumulator,
    timeout: Option<Duration>,
}

impl FetchTask {
    /// Creates a new fetch stage.
    #[must_use]
    pub fn new(
        client: Arc<dyn HttpClient>,
        request: Slot<RequestDescriptor>,
        output: ByteBuffer,
        errors: ErrorAccumulator,
    ) -> Self {
        Self {
            name: "fetch".to_string(),
            client,
            request,
            output,
            errors,
            timeout: None,
        }
    }

    /// Sets the task name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bounds the request duration.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse> {
        let call = self.client.get(request);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(WeatherflowError::network(format!(
                    "request timed out after {}ms",
                    limit.as_millis()
                )))
            }),
            None => call.await,
        }
    }
}

impl std::fmt::Debug for FetchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchTask")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for FetchTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Fetch
    }

    async fn execute(&self, ctx: &TaskContext) -> TaskOutcome {
        if !self.output.is_empty() {
            debug!(
                task = %self.name,
                bytes = self.output.len(),
                "Buffer pre-seeded; skipping request"
            );
            return TaskOutcome::Succeeded;
        }
        let Some(request) = self.request.get() else {
            return record_failure(&self.errors, &self.name, WeatherflowError::missing("request"));
        };

        let response = tokio::select! {
            biased;
            () = ctx.token().cancelled() => {
                debug!(task = %self.name, "Request aborted by cancellation");
                return TaskOutcome::cancelled(ctx.token().reason().unwrap_or_default());
            }
            response = self.send(&request) => response,
        };

        match response {
            Ok(response) if response.is_success() => {
                debug!(
                    task = %self.name,
                    status = response.status,
                    bytes = response.body.len(),
                    "Response received"
                );
                self.output.append(&response.body);
                TaskOutcome::Succeeded
            }
            Ok(response) => {
                record_failure(&self.errors, &self.name, WeatherflowError::web(response.status))
            }
            Err(err) => record_failure(&self.errors, &self.name, err),
        }
    }
}
