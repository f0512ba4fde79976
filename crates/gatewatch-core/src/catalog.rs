//! API Gateway metric catalog.
//!
//! Every scope (the whole API, or one route) gets the same five series:
//! request count, latency, integration latency, and 4xx/5xx error counts.

use crate::config::ExporterConfig;
use crate::types::{Dimension, MetricDefinition, Statistic, Unit};

/// CloudWatch namespace for API Gateway metrics.
pub const NAMESPACE: &str = "AWS/ApiGateway";

pub const COUNT: &str = "Count";
pub const LATENCY: &str = "Latency";
pub const INTEGRATION_LATENCY: &str = "IntegrationLatency";
pub const ERRORS_5XX: &str = "5xx";
pub const ERRORS_4XX: &str = "4xx";

/// Exposition name of the derived error percentage gauge.
pub const ERROR_PERCENT_NAME: &str = "apigateway_error_percent";

struct CatalogEntry {
    metric_name: &'static str,
    statistic: Statistic,
    unit: Unit,
    name: &'static str,
    help: &'static str,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        metric_name: COUNT,
        statistic: Statistic::Sum,
        unit: Unit::Count,
        name: "apigateway_count",
        help: "Request count",
    },
    CatalogEntry {
        metric_name: LATENCY,
        statistic: Statistic::Average,
        unit: Unit::Milliseconds,
        name: "apigateway_latency_milliseconds",
        help: "API gateway latency",
    },
    CatalogEntry {
        metric_name: INTEGRATION_LATENCY,
        statistic: Statistic::Average,
        unit: Unit::Milliseconds,
        name: "apigateway_integration_latency_milliseconds",
        help: "API gateway integration latency",
    },
    CatalogEntry {
        metric_name: ERRORS_5XX,
        statistic: Statistic::Sum,
        unit: Unit::Count,
        name: "apigateway_count_5xx",
        help: "API gateway 5xx errors",
    },
    CatalogEntry {
        metric_name: ERRORS_4XX,
        statistic: Statistic::Sum,
        unit: Unit::Count,
        name: "apigateway_count_4xx",
        help: "API gateway 4xx errors",
    },
];

/// A route of an HTTP API, split from its route key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiRoute {
    pub method: String,
    pub resource: String,
}

impl ApiRoute {
    /// Parse a route key such as `"GET /users/{id}"`.
    ///
    /// Keys without a method (`$default`) map to method `ANY`.
    pub fn from_route_key(route_key: &str) -> Self {
        let route_key = route_key.trim();
        match route_key.split_once(char::is_whitespace) {
            Some((method, resource)) => Self {
                method: method.to_string(),
                resource: resource.trim().to_string(),
            },
            None => Self {
                method: "ANY".to_string(),
                resource: route_key.to_string(),
            },
        }
    }
}

fn build(dimensions: Vec<Dimension>) -> Vec<MetricDefinition> {
    CATALOG
        .iter()
        .map(|entry| MetricDefinition {
            namespace: NAMESPACE.to_string(),
            metric_name: entry.metric_name.to_string(),
            statistic: entry.statistic,
            unit: entry.unit,
            dimensions: dimensions.clone(),
            name: entry.name.to_string(),
            help: entry.help.to_string(),
        })
        .collect()
}

/// API-level definitions (dimensions `ApiId`, `Stage`).
pub fn api_metrics(config: &ExporterConfig) -> Vec<MetricDefinition> {
    build(vec![
        Dimension::new("ApiId", &config.api_id),
        Dimension::new("Stage", &config.stage),
    ])
}

/// Per-route definitions (dimensions `ApiId`, `Method`, `Resource`, `Stage`).
pub fn route_metrics(config: &ExporterConfig, routes: &[ApiRoute]) -> Vec<MetricDefinition> {
    routes
        .iter()
        .flat_map(|route| {
            build(vec![
                Dimension::new("ApiId", &config.api_id),
                Dimension::new("Method", &route.method),
                Dimension::new("Resource", &route.resource),
                Dimension::new("Stage", &config.stage),
            ])
        })
        .collect()
}
