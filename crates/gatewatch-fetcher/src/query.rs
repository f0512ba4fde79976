//! The backend query seam.

use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use gatewatch_core::{MetricDefinition, TimeWindow};

use crate::error::QueryError;

/// One aggregated backend datapoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    pub timestamp: SystemTime,
    pub value: f64,
}

/// Boxed future returned by [`MetricQuery::query`].
pub type QueryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Datapoint>, QueryError>> + Send + 'a>>;

/// Backend that answers "statistic of this metric over this window".
///
/// Injected into the fetcher for testability.
pub trait MetricQuery: Send + Sync {
    /// Query `definition` over `window`, returning datapoints in any order.
    fn query<'a>(&'a self, definition: &'a MetricDefinition, window: TimeWindow)
        -> QueryFuture<'a>;
}
