//! gatewatch-fetcher — turns one metric definition into one sample.
//!
//! The backend is injected through the [`MetricQuery`] trait so the fetcher
//! can be driven by a fake in tests. [`CloudWatchQuery`] is the production
//! backend; [`ApiGatewayRoutes`] lists an HTTP API's routes for per-route
//! metrics.
//!
//! # Architecture
//!
//! ```text
//! MetricFetcher
//!   ├── window() → TimeWindow ending now, ≥ one refresh interval
//!   ├── MetricQuery::query() → datapoints | QueryError
//!   └── FetchOutcome::{Success(MetricSample), Failure(QueryError)}
//! ```

pub mod cloudwatch;
pub mod error;
pub mod fetcher;
pub mod query;
pub mod routes;

pub use cloudwatch::{load_sdk_config, CloudWatchQuery};
pub use error::QueryError;
pub use fetcher::{FetchOutcome, MetricFetcher};
pub use query::{Datapoint, MetricQuery, QueryFuture};
pub use routes::{ApiGatewayRoutes, RouteSource, RoutesFuture};
