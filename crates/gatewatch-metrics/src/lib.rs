//! gatewatch-metrics — Prometheus text exposition.
//!
//! Renders a [`MetricStore`](gatewatch_store::MetricStore) snapshot for the
//! `/metrics` endpoint. Every cached series becomes a gauge labelled with its
//! dimensions; the API Gateway error percentage is derived at render time
//! from the `Count`, `4xx`, and `5xx` series of the same label set.

pub mod prometheus;

pub use prometheus::{render_prometheus, CONTENT_TYPE};
