//! Test doubles for running pipelines without a network, a location
//! service or durable storage.

pub mod fixtures;

use crate::errors::{Result, WeatherflowError};
use crate::stages::{HttpClient, HttpResponse, LocationError, LocationProvider, RequestDescriptor};
use crate::store::{Coordinate, EntityRef, Region, StoreBackend};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays one scripted response for every request and records the URLs.
#[derive(Debug)]
pub struct StaticHttpClient {
    response: Result<HttpResponse>,
    requests: Mutex<Vec<String>>,
}

impl StaticHttpClient {
    /// Answers every request with `status` and `body`.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            response: Ok(HttpResponse::new(status, body)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with `200` and a forecast for `sid`.
    #[must_use]
    pub fn forecast(sid: i64, name: &str) -> Self {
        Self::new(200, fixtures::forecast_body(sid, name))
    }

    /// Fails every request at the transport level.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(WeatherflowError::network(message)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests issued.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// URLs requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for StaticHttpClient {
    async fn get(&self, request: &RequestDescriptor) -> Result<HttpResponse> {
        self.requests.lock().push(request.url.to_string());
        self.response.clone()
    }
}

/// Location provider returning a fixed answer.
#[derive(Debug)]
pub struct StaticLocationProvider {
    answer: std::result::Result<Coordinate, LocationError>,
    calls: AtomicUsize,
}

impl StaticLocationProvider {
    /// Always reports `coordinate`.
    #[must_use]
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            answer: Ok(Coordinate::new(latitude, longitude)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always denies permission.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            answer: Err(LocationError::PermissionDenied),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of coordinate requests.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn current_coordinate(&self) -> std::result::Result<Coordinate, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Backend whose reads are empty and whose commits always fail.
#[derive(Debug)]
pub struct FailingBackend {
    message: String,
}

impl FailingBackend {
    /// Fails commits with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl StoreBackend for FailingBackend {
    fn load(&self, _id: EntityRef) -> Result<Option<Region>> {
        Ok(None)
    }

    fn scan(&self) -> Result<Vec<(EntityRef, Region)>> {
        Ok(Vec::new())
    }

    fn commit(&self, _changes: Vec<(EntityRef, Region)>) -> Result<()> {
        Err(WeatherflowError::persistence(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_static_client_counts_requests() {
        let client = StaticHttpClient::forecast(1, "Oslo");
        let request = RequestDescriptor {
            url: reqwest::Url::parse("https://api.example.test/forecast?id=1").unwrap(),
        };

        let response = client.get(&request).await.unwrap();

        assert!(response.is_success());
        assert_eq!(client.call_count(), 1);
        assert_eq!(client.requests(), vec!["https://api.example.test/forecast?id=1".to_string()]);
    }

    #[test]
    fn test_failing_backend_rejects_save() {
        let store = ObjectStore::new(Arc::new(FailingBackend::new("read only")));
        let session = store.main_session();
        session.insert(Region::default());
        assert_eq!(session.save(false), Err(WeatherflowError::persistence("read only")));
        assert!(session.has_changes());
    }
}
