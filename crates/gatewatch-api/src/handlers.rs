//! HTTP handlers.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use gatewatch_metrics::{render_prometheus, CONTENT_TYPE};
use gatewatch_scheduler::{FailureCounts, SchedulerState};
use serde::Serialize;
use tracing::trace;

use crate::ApiState;

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let body = render_prometheus(&snapshot);
    trace!(series = snapshot.len(), bytes = body.len(), "scrape served");
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    /// `starting` until the first tick completes, then `ok`.
    status: &'static str,
    scheduler: SchedulerState,
    ticks: u64,
    last_tick_epoch: Option<u64>,
    metrics: usize,
    stale: usize,
    /// Fetches that found no datapoints. Not an error.
    no_data: u64,
    failures: FailureCounts,
}

/// GET /healthz
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    let stats = state.status.stats();
    let snapshot = state.store.snapshot();
    let stale = snapshot.iter().filter(|(_, sample)| sample.stale).count();

    Json(HealthResponse {
        status: if stats.ticks > 0 { "ok" } else { "starting" },
        scheduler: state.status.state(),
        ticks: stats.ticks,
        last_tick_epoch: stats.last_tick_epoch,
        metrics: snapshot.len(),
        stale,
        no_data: stats.no_data,
        failures: stats.failures,
    })
}
