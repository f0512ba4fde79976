//! gatewatch-core — shared types for the gatewatch exporter.
//!
//! Defines what gets fetched ([`MetricDefinition`]), what gets cached
//! ([`MetricSample`]), the API Gateway metric catalog, and the validated
//! startup configuration ([`ExporterConfig`]).

pub mod catalog;
pub mod config;
pub mod types;

pub use catalog::{api_metrics, route_metrics, ApiRoute};
pub use config::{ConfigError, ExporterConfig};
pub use types::*;
