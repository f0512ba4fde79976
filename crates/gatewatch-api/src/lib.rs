//! gatewatch-api — HTTP surface of the exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition of the cached samples |
//! | GET | `/healthz` | Scheduler state and refresh counters (JSON) |
//!
//! Handlers only read from the store; they never wait on in-flight fetches.

pub mod handlers;

use axum::routing::get;
use axum::Router;
use gatewatch_scheduler::SchedulerStatus;
use gatewatch_store::MetricStore;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: MetricStore,
    pub status: SchedulerStatus,
}

/// Build the exporter router.
pub fn build_router(store: MetricStore, status: SchedulerStatus) -> Router {
    let state = ApiState { store, status };

    Router::new()
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
