//! End-to-end exporter tests.
//!
//! Wires a scripted backend through the scheduler, the store, and the axum
//! router, then scrapes `/metrics` the way Prometheus would.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use gatewatch_api::build_router;
use gatewatch_core::{api_metrics, ExporterConfig, MetricDefinition, TimeWindow};
use gatewatch_fetcher::{Datapoint, MetricFetcher, MetricQuery, QueryError, QueryFuture};
use gatewatch_scheduler::Scheduler;
use gatewatch_store::MetricStore;
use tokio::sync::watch;
use tower::ServiceExt;

/// Backend answering from a per-metric script, then `default_value`.
struct ScriptedBackend {
    script: Mutex<HashMap<String, VecDeque<Result<f64, QueryError>>>>,
    default_value: f64,
}

impl ScriptedBackend {
    fn new(default_value: f64) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(HashMap::new()),
            default_value,
        })
    }

    fn push(&self, metric_name: &str, response: Result<f64, QueryError>) {
        self.script
            .lock()
            .unwrap()
            .entry(metric_name.to_string())
            .or_default()
            .push_back(response);
    }
}

impl MetricQuery for ScriptedBackend {
    fn query<'a>(&'a self, definition: &'a MetricDefinition, _window: TimeWindow) -> QueryFuture<'a> {
        let response = self
            .script
            .lock()
            .unwrap()
            .get_mut(&definition.metric_name)
            .and_then(|q| q.pop_front())
            .unwrap_or(Ok(self.default_value));
        Box::pin(async move {
            let value = response?;
            Ok(vec![Datapoint {
                timestamp: UNIX_EPOCH + Duration::from_secs(60),
                value,
            }])
        })
    }
}

fn config(refresh_interval_secs: u64, max_workers: usize) -> ExporterConfig {
    ExporterConfig::builder("abc123")
        .refresh_interval_secs(refresh_interval_secs)
        .max_workers(max_workers)
        .build()
        .unwrap()
}

fn exporter(backend: Arc<ScriptedBackend>, config: &ExporterConfig) -> (Arc<Scheduler>, Router) {
    let store = MetricStore::new();
    let fetcher = MetricFetcher::new(backend, config.refresh_interval);
    let scheduler = Scheduler::new(
        fetcher,
        store.clone(),
        api_metrics(config),
        config.refresh_interval,
        config.max_workers,
    );
    let router = build_router(store, scheduler.status());
    (Arc::new(scheduler), router)
}

async fn scrape(router: &Router) -> (StatusCode, String) {
    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn sample_lines(body: &str) -> Vec<&str> {
    body.lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}

#[tokio::test]
async fn scrape_before_first_tick_is_empty_and_ok() {
    let (_scheduler, router) = exporter(ScriptedBackend::new(1.0), &config(60, 4));

    let (status, body) = scrape(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert!(sample_lines(&body).is_empty());
}

#[tokio::test]
async fn throttled_metric_is_omitted_from_first_scrape() {
    let backend = ScriptedBackend::new(2.0);
    backend.push("Count", Err(QueryError::Throttled("Rate exceeded".to_string())));
    let (scheduler, router) = exporter(backend, &config(60, 4));

    let report = scheduler.run_tick().await;
    assert_eq!(report.fresh, 4);
    assert_eq!(report.throttled, 1);

    let (status, body) = scrape(&router).await;
    assert_eq!(status, StatusCode::OK);
    let lines = sample_lines(&body);
    assert_eq!(lines.len(), 4, "body:\n{body}");
    assert!(!body.contains("apigateway_count{"));
    assert!(body.contains("apigateway_count_4xx{api_id=\"abc123\",stage=\"$default\"} 2\n"));
}

#[tokio::test]
async fn throttled_latency_scrape_lists_stored_series_and_derived_percent() {
    let backend = ScriptedBackend::new(0.0);
    backend.push("Count", Ok(100.0));
    backend.push("4xx", Ok(3.0));
    backend.push("5xx", Ok(1.0));
    backend.push("IntegrationLatency", Ok(12.0));
    backend.push("Latency", Err(QueryError::Throttled("Rate exceeded".to_string())));
    let (scheduler, router) = exporter(backend, &config(60, 4));

    let report = scheduler.run_tick().await;
    assert_eq!(report.fresh, 4);
    assert_eq!(report.throttled, 1);

    let (_, body) = scrape(&router).await;
    assert_eq!(
        sample_lines(&body),
        vec![
            "apigateway_count{api_id=\"abc123\",stage=\"$default\"} 100",
            "apigateway_count_4xx{api_id=\"abc123\",stage=\"$default\"} 3",
            "apigateway_count_5xx{api_id=\"abc123\",stage=\"$default\"} 1",
            "apigateway_error_percent{api_id=\"abc123\",stage=\"$default\"} 4",
            "apigateway_integration_latency_milliseconds{api_id=\"abc123\",stage=\"$default\"} 12",
        ]
    );
    assert!(!body.contains("apigateway_latency_milliseconds"));
}

#[tokio::test]
async fn throttled_metric_keeps_previous_value_on_later_tick() {
    let backend = ScriptedBackend::new(2.0);
    backend.push("Count", Ok(100.0));
    backend.push("Count", Err(QueryError::Throttled("Rate exceeded".to_string())));
    let (scheduler, router) = exporter(backend, &config(60, 4));

    scheduler.run_tick().await;
    scheduler.run_tick().await;

    let (_, body) = scrape(&router).await;
    // Four fresh series and the stale count; no percent from a stale count.
    assert_eq!(sample_lines(&body).len(), 5, "body:\n{body}");
    assert!(body.contains("apigateway_count{api_id=\"abc123\",stage=\"$default\"} 100\n"));
    assert!(!body.contains("apigateway_error_percent"));
}

#[tokio::test(start_paused = true)]
async fn scrape_after_second_tick_sees_latest_value() {
    let backend = ScriptedBackend::new(0.0);
    backend.push("Count", Ok(10.0));
    backend.push("Count", Ok(20.0));
    let (scheduler, router) = exporter(backend, &config(1, 2));
    let status = scheduler.status();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    // Immediate first tick, second tick one interval later.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(status.stats().ticks, 2);

    let (_, body) = scrape(&router).await;
    assert!(body.contains("apigateway_count{api_id=\"abc123\",stage=\"$default\"} 20\n"));
    assert!(!body.contains("} 10\n"));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn healthz_tracks_ticks() {
    let (scheduler, router) = exporter(ScriptedBackend::new(1.0), &config(60, 4));
    scheduler.run_tick().await;

    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("\"status\":\"ok\""));
    assert!(body.contains("\"metrics\":5"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (_scheduler, router) = exporter(ScriptedBackend::new(1.0), &config(60, 4));
    let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
