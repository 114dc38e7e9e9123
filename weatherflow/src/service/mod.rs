//! Pipeline assembly for each call site.
//!
//! Every call builds a fresh set of buffers and tasks, runs them as one
//! [`TaskGraph`] and reports through a callback on the service's
//! [`ResultContext`]. Nothing is shared between invocations except the
//! object store and the collaborators.

mod handle;
#[cfg(test)]
mod integration_tests;

pub use handle::PipelineHandle;

use crate::buffers::{ByteBuffer, ErrorAccumulator, SharedList, Slot};
use crate::config::WeatherConfig;
use crate::errors::{ConfigurationCode, ConfigurationError, Result, WeatherflowError};
use crate::events::{EventSink, NoOpEventSink};
use crate::mapping::{Mapper, RegionMapper};
use crate::scheduler::{GraphHandle, ResultContext, TaskGraph, TaskId, TaskSpec};
use crate::stages::{
    CallbackCell, CompletionTask, DeserializeTask, FetchTask, GeolocationTask, HttpClient,
    LocationProvider, ManagedParseTask, ParseTask, RegionQuery, ReqwestHttpClient, RequestTask,
    UnavailableLocationProvider,
};
use crate::store::{Coordinate, ObjectStore, Region};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Name of the thread backing the default result context.
pub const RESULT_CONTEXT_NAME: &str = "weatherflow-result";

/// Fetches forecasts and keeps the object store up to date.
pub struct WeatherService {
    config: WeatherConfig,
    store: ObjectStore,
    http: Arc<dyn HttpClient>,
    location: Arc<dyn LocationProvider>,
    result_context: Arc<ResultContext>,
    sink: Arc<dyn EventSink>,
}

impl WeatherService {
    /// Creates a service with a `reqwest` client, an in-memory store and a
    /// dedicated result context thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the result context cannot be
    /// created.
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let http = ReqwestHttpClient::new(&config)?;
        let result_context = ResultContext::spawn(RESULT_CONTEXT_NAME).map_err(|e| {
            ConfigurationError::new(
                ConfigurationCode::ResultContextClosed,
                format!("Cannot start result context: {e}"),
            )
        })?;
        Ok(Self::with_parts(config, Arc::new(http), result_context))
    }

    /// Creates a service from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: WeatherConfig,
        http: Arc<dyn HttpClient>,
        result_context: Arc<ResultContext>,
    ) -> Self {
        Self {
            config,
            store: ObjectStore::in_memory(),
            http,
            location: Arc::new(UnavailableLocationProvider),
            result_context,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Uses the given object store.
    #[must_use]
    pub fn with_store(mut self, store: ObjectStore) -> Self {
        self.store = store;
        self
    }

    /// Uses the given location service for current-region lookups.
    #[must_use]
    pub fn with_location_provider(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = location;
        self
    }

    /// Sends scheduler events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The configuration every invocation is built from.
    #[must_use]
    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    /// The object store regions are persisted to.
    #[must_use]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// The context callbacks run on.
    #[must_use]
    pub fn result_context(&self) -> &Arc<ResultContext> {
        &self.result_context
    }

    /// Fetches and persists the region with server id `sid`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_region_by_id(
        &self,
        sid: i64,
        callback: impl FnOnce(Option<Region>, Option<WeatherflowError>) + Send + 'static,
    ) -> PipelineHandle {
        let cell = CallbackCell::new(callback);
        let graph = self.graph("region-by-id");
        let built = self.persist_region(
            graph,
            ErrorAccumulator::new(),
            RegionQuery::ById(sid),
            &[],
            RegionMapper::by_id(),
            cell.clone(),
        );
        self.launch(built, cell)
    }

    /// Fetches and persists the region around `coordinate`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_region_for_location(
        &self,
        coordinate: Coordinate,
        callback: impl FnOnce(Option<Region>, Option<WeatherflowError>) + Send + 'static,
    ) -> PipelineHandle {
        let cell = CallbackCell::new(callback);
        let graph = self.graph("region-for-location");
        let built = self.persist_region(
            graph,
            ErrorAccumulator::new(),
            RegionQuery::ByCoordinate(coordinate),
            &[],
            RegionMapper::by_location(),
            cell.clone(),
        );
        self.launch(built, cell)
    }

    /// Locates the device, then fetches and persists the current region.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_current_region(
        &self,
        callback: impl FnOnce(Option<Region>, Option<WeatherflowError>) + Send + 'static,
    ) -> PipelineHandle {
        let cell = CallbackCell::new(callback);
        let built = self.current_region_graph(cell.clone());
        self.launch(built, cell)
    }

    /// Fetches `query` and maps every record with `mapper` without touching
    /// the store. The callback receives the last mapped value.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn fetch_mapped<M>(
        &self,
        query: RegionQuery,
        mapper: M,
        callback: impl FnOnce(Option<M::Output>, Option<WeatherflowError>) + Send + 'static,
    ) -> PipelineHandle
    where
        M: Mapper + 'static,
    {
        let cell = CallbackCell::new(callback);
        let built = self.mapped_graph(query, mapper, cell.clone());
        self.launch(built, cell)
    }

    /// Awaitable form of [`get_region_by_id`](Self::get_region_by_id).
    ///
    /// # Errors
    ///
    /// Returns the first failure recorded by the pipeline.
    pub async fn region_by_id(&self, sid: i64) -> Result<Option<Region>> {
        let (tx, rx) = oneshot::channel();
        let _pipeline = self.get_region_by_id(sid, settle_into(tx));
        receive(rx).await
    }

    /// Awaitable form of [`get_region_for_location`](Self::get_region_for_location).
    ///
    /// # Errors
    ///
    /// Returns the first failure recorded by the pipeline.
    pub async fn region_for_location(&self, coordinate: Coordinate) -> Result<Option<Region>> {
        let (tx, rx) = oneshot::channel();
        let _pipeline = self.get_region_for_location(coordinate, settle_into(tx));
        receive(rx).await
    }

    /// Awaitable form of [`get_current_region`](Self::get_current_region).
    ///
    /// # Errors
    ///
    /// Returns the first failure recorded by the pipeline.
    pub async fn current_region(&self) -> Result<Option<Region>> {
        let (tx, rx) = oneshot::channel();
        let _pipeline = self.get_current_region(settle_into(tx));
        receive(rx).await
    }

    /// Awaitable form of [`fetch_mapped`](Self::fetch_mapped).
    ///
    /// # Errors
    ///
    /// Returns the first failure recorded by the pipeline.
    pub async fn mapped<M>(&self, query: RegionQuery, mapper: M) -> Result<Option<M::Output>>
    where
        M: Mapper + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let _pipeline = self.fetch_mapped(query, mapper, settle_into(tx));
        receive(rx).await
    }

    fn graph(&self, name: &str) -> TaskGraph {
        TaskGraph::new(name)
            .with_max_concurrency(self.config.max_concurrency)
            .with_result_context(Arc::clone(&self.result_context))
            .with_event_sink(Arc::clone(&self.sink))
    }

    /// Schedules request, fetch and deserialize behind `after`.
    fn fetch_stages(
        &self,
        graph: &mut TaskGraph,
        query: RegionQuery,
        after: &[TaskId],
        errors: &ErrorAccumulator,
    ) -> std::result::Result<(TaskId, SharedList<Value>), ConfigurationError> {
        let request = Slot::new();
        let bytes = ByteBuffer::new();
        let records = SharedList::new();

        let build = graph.schedule(
            RequestTask::new(
                self.config.endpoint.clone(),
                self.config.api_key.clone(),
                query,
                request.clone(),
                errors.clone(),
            ),
            after,
        )?;
        let fetch = graph.schedule(
            FetchTask::new(Arc::clone(&self.http), request, bytes.clone(), errors.clone())
                .with_timeout(self.config.timeout()),
            &[build],
        )?;
        let decode = graph.schedule(
            DeserializeTask::new(bytes, records.clone(), errors.clone()),
            &[fetch],
        )?;
        Ok((decode, records))
    }

    fn persist_region(
        &self,
        mut graph: TaskGraph,
        errors: ErrorAccumulator,
        query: RegionQuery,
        after: &[TaskId],
        mapper: RegionMapper,
        callback: CallbackCell<Region>,
    ) -> std::result::Result<TaskGraph, ConfigurationError> {
        let refs = SharedList::new();
        let (decode, records) = self.fetch_stages(&mut graph, query, after, &errors)?;
        let persist = graph.schedule(
            ManagedParseTask::new(
                self.store.clone(),
                Arc::new(mapper),
                records,
                refs.clone(),
                errors.clone(),
            ),
            &[decode],
        )?;

        let main = self.store.main_session();
        let complete = CompletionTask::new(refs, errors, move |id| main.resolve(id), callback);
        graph.add(
            TaskSpec::new(Arc::new(complete))
                .with_predecessor(persist)
                .on_result_context()
                .always_run(),
        )?;
        Ok(graph)
    }

    fn current_region_graph(
        &self,
        callback: CallbackCell<Region>,
    ) -> std::result::Result<TaskGraph, ConfigurationError> {
        let mut graph = self.graph("current-region");
        let errors = ErrorAccumulator::new();
        let locations = SharedList::new();
        let locate = graph.schedule(
            GeolocationTask::new(Arc::clone(&self.location), locations.clone(), errors.clone()),
            &[],
        )?;
        self.persist_region(
            graph,
            errors,
            RegionQuery::FromLocation(locations),
            &[locate],
            RegionMapper::current(),
            callback,
        )
    }

    fn mapped_graph<M>(
        &self,
        query: RegionQuery,
        mapper: M,
        callback: CallbackCell<M::Output>,
    ) -> std::result::Result<TaskGraph, ConfigurationError>
    where
        M: Mapper + 'static,
    {
        let mut graph = self.graph("fetch-mapped");
        let errors = ErrorAccumulator::new();
        let values = SharedList::new();
        let (decode, records) = self.fetch_stages(&mut graph, query, &[], &errors)?;
        let parse = graph.schedule(
            ParseTask::new(mapper, records, values.clone(), errors.clone()),
            &[decode],
        )?;

        let complete = CompletionTask::new(values, errors, |value| Ok(Some(value)), callback);
        graph.add(
            TaskSpec::new(Arc::new(complete))
                .with_predecessor(parse)
                .on_result_context()
                .always_run(),
        )?;
        Ok(graph)
    }

    fn launch<O: Send + 'static>(
        &self,
        built: std::result::Result<TaskGraph, ConfigurationError>,
        callback: CallbackCell<O>,
    ) -> PipelineHandle {
        let context = Arc::clone(&self.result_context);
        match built {
            Ok(graph) => {
                let handle = graph.handle();
                let join = tokio::spawn(async move {
                    let name = graph.name().to_string();
                    match graph.run().await {
                        Ok(report) => {
                            debug!(
                                graph = %name,
                                duration_ms = report.duration_ms,
                                "Pipeline finished"
                            );
                            Some(report)
                        }
                        Err(err) => {
                            warn!(graph = %name, error = %err, "Pipeline could not run");
                            report_failure(&context, &callback, err.into());
                            None
                        }
                    }
                });
                PipelineHandle::new(handle, join)
            }
            Err(err) => {
                warn!(error = %err, "Pipeline could not be assembled");
                report_failure(&context, &callback, err.into());
                PipelineHandle::new(GraphHandle::default(), tokio::spawn(async { None }))
            }
        }
    }
}

impl std::fmt::Debug for WeatherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherService")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("result_context", &self.result_context)
            .finish_non_exhaustive()
    }
}

/// Fires `callback` on the result context, or inline if it has exited.
fn report_failure<O: Send + 'static>(
    context: &ResultContext,
    callback: &CallbackCell<O>,
    err: WeatherflowError,
) {
    let cell = callback.clone();
    let fallback = err.clone();
    if context
        .dispatch(move || {
            cell.fire(None, Some(err));
        })
        .is_err()
    {
        callback.fire(None, Some(fallback));
    }
}

fn settle_into<O: Send + 'static>(
    tx: oneshot::Sender<Result<Option<O>>>,
) -> impl FnOnce(Option<O>, Option<WeatherflowError>) + Send + 'static {
    move |value, error| {
        let _ = tx.send(error.map_or(Ok(value), Err));
    }
}

async fn receive<O>(rx: oneshot::Receiver<Result<Option<O>>>) -> Result<Option<O>> {
    rx.await.map_err(|_| {
        WeatherflowError::from(ConfigurationError::new(
            ConfigurationCode::ResultContextClosed,
            "Pipeline ended without reporting",
        ))
    })?
}
