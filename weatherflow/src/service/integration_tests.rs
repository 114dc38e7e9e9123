//! End-to-end pipelines against scripted collaborators.

use super::*;
use crate::core::{CancelReason, TaskStatus};
use crate::errors::Result;
use crate::events::{CollectingEventSink, GRAPH_COMPLETED};
use crate::mapping::RegionSnapshotMapper;
use crate::stages::{HttpResponse, RequestDescriptor};
use crate::testing::fixtures::forecast_body;
use crate::testing::{StaticHttpClient, StaticLocationProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};

const ENDPOINT: &str = "https://api.example.test/data/2.5";

fn config() -> WeatherConfig {
    WeatherConfig::new()
        .with_endpoint(ENDPOINT)
        .with_api_key("secret")
}

fn service(http: &Arc<StaticHttpClient>) -> WeatherService {
    let context = ResultContext::spawn("test-result").unwrap();
    WeatherService::with_parts(config(), Arc::clone(http) as Arc<dyn HttpClient>, context)
}

fn stored_regions(service: &WeatherService) -> Vec<Region> {
    service
        .store()
        .main_session()
        .fetch(|_| true)
        .unwrap()
        .into_iter()
        .map(|(_, region)| region)
        .collect()
}

/// Never answers until the request is dropped.
#[derive(Debug, Default)]
struct StalledClient {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for StalledClient {
    async fn get(&self, _request: &RequestDescriptor) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

type Calls = Arc<Mutex<Vec<(Option<Region>, Option<WeatherflowError>, bool)>>>;

/// Callback that records each invocation and whether it ran on `context`.
fn recording(
    context: &Arc<ResultContext>,
) -> (Calls, impl FnOnce(Option<Region>, Option<WeatherflowError>) + Send + 'static) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let context = Arc::clone(context);
    let callback = move |region, error| {
        sink.lock().push((region, error, context.is_current()));
    };
    (calls, callback)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_region_by_id_persists_and_reports() {
    let http = Arc::new(StaticHttpClient::forecast(3_143_244, "Oslo"));
    let service = service(&http);

    let region = service.region_by_id(3_143_244).await.unwrap().unwrap();

    assert_eq!(region.sid, 3_143_244);
    assert_eq!(region.name.as_deref(), Some("Oslo"));
    assert_eq!(region.forecasts.len(), 2);
    assert!(!region.is_current);
    assert_eq!(stored_regions(&service), vec![region]);

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0],
        "https://api.example.test/data/2.5/forecast?units=metric&id=3143244&APPID=secret"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_callback_fires_once_on_result_context() {
    let http = Arc::new(StaticHttpClient::forecast(7, "Bergen"));
    let service = service(&http);
    let (calls, callback) = recording(service.result_context());

    let report = service.get_region_by_id(7, callback).join().await.unwrap();

    assert!(report.all_succeeded());
    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    let (region, error, on_context) = &calls[0];
    assert_eq!(region.as_ref().map(|r| r.sid), Some(7));
    assert_eq!(error, &None);
    assert!(on_context);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repeated_lookup_upserts_same_entity() {
    let http = Arc::new(StaticHttpClient::forecast(7, "Bergen"));
    let service = service(&http);

    service.region_by_id(7).await.unwrap();
    service.region_by_id(7).await.unwrap();

    assert_eq!(http.call_count(), 2);
    let matches = service.store().main_session().fetch(|r| r.sid == 7).unwrap();
    assert_eq!(matches.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mapping_failure_leaves_store_untouched() {
    let http = Arc::new(StaticHttpClient::new(200, r#"{"city": {"id": 1}}"#));
    let service = service(&http);
    let (calls, callback) = recording(service.result_context());

    let report = service.get_region_by_id(1, callback).join().await.unwrap();

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, None);
    assert!(calls[0].1.as_ref().is_some_and(WeatherflowError::is_missing_data));
    assert!(stored_regions(&service).is_empty());
    assert!(matches!(
        report.status_of("persist"),
        Some(TaskStatus::Cancelled(CancelReason::Failed(_)))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_api_key_issues_no_request() {
    let http = Arc::new(StaticHttpClient::forecast(1, "Oslo"));
    let context = ResultContext::spawn("test-result").unwrap();
    let service = WeatherService::with_parts(
        WeatherConfig::new().with_endpoint(ENDPOINT).with_api_key(""),
        Arc::clone(&http) as Arc<dyn HttpClient>,
        context,
    );

    let result = service.region_by_id(1).await;

    assert_eq!(result, Err(WeatherflowError::missing("api_key")));
    assert_eq!(http.call_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_status_is_web_error() {
    let http = Arc::new(StaticHttpClient::new(404, r#"{"cod":"404"}"#));
    let service = service(&http);

    assert_eq!(service.region_by_id(9).await, Err(WeatherflowError::web(404)));
    assert!(stored_regions(&service).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transport_failure_is_network_error() {
    let http = Arc::new(StaticHttpClient::failing("connection refused"));
    let service = service(&http);

    assert_eq!(
        service.region_by_id(9).await,
        Err(WeatherflowError::network("connection refused"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_truncated_body_is_malformed() {
    let http = Arc::new(StaticHttpClient::new(200, r#"{"city": {"id""#));
    let service = service(&http);

    let err = service.region_by_id(9).await.unwrap_err();

    assert_eq!(err.kind(), "malformed_data");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_region_for_location_queries_coordinate() {
    let http = Arc::new(StaticHttpClient::forecast(5, "Tromsø"));
    let service = service(&http);

    let region = service
        .region_for_location(Coordinate::new(69.65, 18.96))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(region.sid, 5);
    assert_eq!(
        http.requests()[0],
        "https://api.example.test/data/2.5/forecast?lat=69.65&lon=18.96&units=metric&APPID=secret"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_current_region_is_flagged_singleton() {
    let http = Arc::new(StaticHttpClient::forecast(1, "Oslo"));
    let location = Arc::new(StaticLocationProvider::at(59.91, 10.75));
    let service = service(&http)
        .with_location_provider(Arc::clone(&location) as Arc<dyn LocationProvider>);

    let first = service.current_region().await.unwrap().unwrap();
    let second = service.current_region().await.unwrap().unwrap();

    assert!(first.is_current && second.is_current);
    assert_eq!(location.call_count(), 2);
    assert!(http.requests()[0].contains("lat=59.91&lon=10.75"));
    assert_eq!(service.store().main_session().fetch(|r| r.is_current).unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_location_denied_cancels_downstream() {
    let http = Arc::new(StaticHttpClient::forecast(1, "Oslo"));
    let service = service(&http)
        .with_location_provider(Arc::new(StaticLocationProvider::denied()));
    let (calls, callback) = recording(service.result_context());

    let report = service.get_current_region(callback).join().await.unwrap();

    assert_eq!(http.call_count(), 0);
    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.as_ref().map(WeatherflowError::kind), Some("geolocation"));
    assert!(matches!(
        report.status_of("fetch"),
        Some(TaskStatus::Cancelled(CancelReason::Predecessor(_)))
    ));
    assert_eq!(report.status_of("complete"), Some(&TaskStatus::Succeeded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_aborts_fetch_and_still_reports_once() {
    let http = Arc::new(StalledClient::default());
    let context = ResultContext::spawn("test-result").unwrap();
    let service = WeatherService::with_parts(
        config(),
        Arc::clone(&http) as Arc<dyn HttpClient>,
        Arc::clone(&context),
    );
    let (calls, callback) = recording(&context);

    let handle = service.get_region_by_id(1, callback);
    while http.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    handle.cancel();
    let report = handle.join().await.unwrap();

    assert_eq!(*calls.lock(), vec![(None, None, true)]);
    assert!(report.status_of("fetch").is_some_and(TaskStatus::is_cancelled));
    assert!(stored_regions(&service).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_mapped_skips_store() {
    let http = Arc::new(StaticHttpClient::forecast(11, "Stavanger"));
    let service = service(&http);

    let region = service
        .mapped(RegionQuery::ById(11), RegionSnapshotMapper)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(region.name.as_deref(), Some("Stavanger"));
    assert!(stored_regions(&service).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pre_seeded_bytes_skip_network() {
    let http = Arc::new(StaticHttpClient::forecast(1, "ignored"));
    let store = ObjectStore::in_memory();
    let context = ResultContext::spawn("test-result").unwrap();
    let errors = ErrorAccumulator::new();
    let bytes = ByteBuffer::seeded(forecast_body(21, "Bodø"));
    let seeded_len = bytes.len();
    let records = SharedList::new();
    let refs = SharedList::new();
    let fired = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&fired);

    let mut graph = TaskGraph::new("seeded").with_result_context(Arc::clone(&context));
    let fetch = graph
        .schedule(
            FetchTask::new(
                Arc::clone(&http) as Arc<dyn HttpClient>,
                Slot::new(),
                bytes.clone(),
                errors.clone(),
            ),
            &[],
        )
        .unwrap();
    let decode = graph
        .schedule(DeserializeTask::new(bytes.clone(), records.clone(), errors.clone()), &[fetch])
        .unwrap();
    let persist = graph
        .schedule(
            ManagedParseTask::new(
                store.clone(),
                Arc::new(RegionMapper::by_id()),
                records,
                refs.clone(),
                errors.clone(),
            ),
            &[decode],
        )
        .unwrap();
    let main = store.main_session();
    let complete = CompletionTask::new(
        refs,
        errors.clone(),
        move |id| main.resolve(id),
        CallbackCell::new(move |region: Option<Region>, _| *sink.lock() = region.map(|r| r.sid)),
    );
    graph
        .add(
            TaskSpec::new(Arc::new(complete))
                .with_predecessor(persist)
                .on_result_context()
                .always_run(),
        )
        .unwrap();

    graph.run().await.unwrap();

    assert_eq!(http.call_count(), 0);
    assert_eq!(bytes.len(), seeded_len);
    assert!(errors.is_empty());
    assert_eq!(*fired.lock(), Some(21));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_events_reach_configured_sink() {
    let http = Arc::new(StaticHttpClient::forecast(1, "Oslo"));
    let sink = Arc::new(CollectingEventSink::new());
    let service = service(&http).with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);

    service.get_region_by_id(1, |_, _| {}).join().await.unwrap();

    assert_eq!(sink.events_of_type(GRAPH_COMPLETED).len(), 1);
    assert_eq!(sink.events_of_type("task.succeeded").len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invocations_do_not_share_errors() {
    let failing = Arc::new(StaticHttpClient::new(500, ""));
    let healthy = Arc::new(StaticHttpClient::forecast(2, "Oslo"));
    let context = ResultContext::spawn("test-result").unwrap();
    let store = ObjectStore::in_memory();
    let broken = WeatherService::with_parts(
        config(),
        Arc::clone(&failing) as Arc<dyn HttpClient>,
        Arc::clone(&context),
    )
    .with_store(store.clone());
    let working =
        WeatherService::with_parts(config(), Arc::clone(&healthy) as Arc<dyn HttpClient>, context)
            .with_store(store);

    let (bad, good) = tokio::join!(broken.region_by_id(2), working.region_by_id(2));

    assert_eq!(bad, Err(WeatherflowError::web(500)));
    assert_eq!(good.unwrap().map(|r| r.sid), Some(2));
}
