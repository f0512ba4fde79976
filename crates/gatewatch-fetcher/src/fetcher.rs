//! MetricFetcher — one query per call, normalized into a [`FetchOutcome`].

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use gatewatch_core::{MetricDefinition, MetricSample, TimeWindow};
use tracing::debug;

use crate::error::QueryError;
use crate::query::MetricQuery;

/// Smallest aggregation period CloudWatch accepts for standard metrics.
pub const BACKEND_PERIOD: Duration = Duration::from_secs(60);

/// Result of a single fetch. Consumed by the scheduler, never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(MetricSample),
    Failure(QueryError),
}

/// Issues metric queries against an injected backend.
#[derive(Clone)]
pub struct MetricFetcher {
    query: Arc<dyn MetricQuery>,
    refresh_interval: Duration,
    period: Duration,
}

impl MetricFetcher {
    pub fn new(query: Arc<dyn MetricQuery>, refresh_interval: Duration) -> Self {
        Self {
            query,
            refresh_interval,
            period: BACKEND_PERIOD,
        }
    }

    /// Override the aggregation period (tests, high-resolution metrics).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Window ending at `now` that spans at least one refresh interval, so
    /// the backend has a datapoint even when its ingestion lags.
    pub fn window_at(&self, now: SystemTime) -> TimeWindow {
        TimeWindow::ending_at(now, self.refresh_interval, self.period)
    }

    /// Fetch `definition` over a window ending now.
    pub async fn fetch(&self, definition: &MetricDefinition) -> FetchOutcome {
        let window = self.window_at(SystemTime::now());
        self.fetch_window(definition, window).await
    }

    /// Fetch `definition` over an explicit window.
    pub async fn fetch_window(
        &self,
        definition: &MetricDefinition,
        window: TimeWindow,
    ) -> FetchOutcome {
        let datapoints = match self.query.query(definition, window).await {
            Ok(points) => points,
            Err(e) => return FetchOutcome::Failure(e),
        };

        let latest = datapoints
            .into_iter()
            .filter(|p| p.value.is_finite())
            .max_by_key(|p| p.timestamp);

        match latest {
            Some(point) => {
                debug!(series = %definition.series(), value = point.value, "metric fetched");
                FetchOutcome::Success(MetricSample::fresh(point.value, SystemTime::now()))
            }
            None => FetchOutcome::Failure(QueryError::NotFound(definition.series())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::UNIX_EPOCH;

    use gatewatch_core::{Dimension, Statistic, Unit};

    use crate::query::{Datapoint, QueryFuture};

    /// Fake backend returning a canned response and recording windows.
    struct FakeQuery {
        response: Result<Vec<Datapoint>, QueryError>,
        windows: Mutex<Vec<TimeWindow>>,
    }

    impl FakeQuery {
        fn new(response: Result<Vec<Datapoint>, QueryError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                windows: Mutex::new(Vec::new()),
            })
        }
    }

    impl MetricQuery for FakeQuery {
        fn query<'a>(
            &'a self,
            _definition: &'a MetricDefinition,
            window: TimeWindow,
        ) -> QueryFuture<'a> {
            self.windows.lock().unwrap().push(window);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn definition() -> MetricDefinition {
        MetricDefinition {
            namespace: "AWS/ApiGateway".to_string(),
            metric_name: "Count".to_string(),
            statistic: Statistic::Sum,
            unit: Unit::Count,
            dimensions: vec![Dimension::new("ApiId", "abc123")],
            name: "apigateway_count".to_string(),
            help: "Request count".to_string(),
        }
    }

    fn point(secs: u64, value: f64) -> Datapoint {
        Datapoint {
            timestamp: UNIX_EPOCH + Duration::from_secs(secs),
            value,
        }
    }

    #[tokio::test]
    async fn latest_datapoint_wins() {
        let query = FakeQuery::new(Ok(vec![point(120, 5.0), point(180, 9.0), point(60, 1.0)]));
        let fetcher = MetricFetcher::new(query, Duration::from_secs(60));

        match fetcher.fetch(&definition()).await {
            FetchOutcome::Success(sample) => {
                assert_eq!(sample.value, 9.0);
                assert!(!sample.stale);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_datapoints_is_not_found() {
        let fetcher = MetricFetcher::new(FakeQuery::new(Ok(vec![])), Duration::from_secs(60));
        let outcome = fetcher.fetch(&definition()).await;
        assert!(matches!(outcome, FetchOutcome::Failure(QueryError::NotFound(_))));
    }

    #[tokio::test]
    async fn non_finite_values_are_ignored() {
        let query = FakeQuery::new(Ok(vec![point(60, 3.0), point(120, f64::NAN)]));
        let fetcher = MetricFetcher::new(query, Duration::from_secs(60));
        match fetcher.fetch(&definition()).await {
            FetchOutcome::Success(sample) => assert_eq!(sample.value, 3.0),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_errors_pass_through() {
        for err in [
            QueryError::Throttled("rate exceeded".to_string()),
            QueryError::Transport("timeout".to_string()),
            QueryError::Backend("invalid parameter".to_string()),
        ] {
            let fetcher =
                MetricFetcher::new(FakeQuery::new(Err(err.clone())), Duration::from_secs(60));
            assert_eq!(fetcher.fetch(&definition()).await, FetchOutcome::Failure(err));
        }
    }

    #[tokio::test]
    async fn window_spans_refresh_interval() {
        let query = FakeQuery::new(Ok(vec![point(1, 1.0)]));
        let fetcher = MetricFetcher::new(query.clone(), Duration::from_secs(300));
        fetcher.fetch(&definition()).await;

        let windows = query.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].span(), Duration::from_secs(300));
        assert_eq!(windows[0].period, BACKEND_PERIOD);
    }

    #[test]
    fn short_interval_still_gets_a_full_period() {
        let fetcher =
            MetricFetcher::new(FakeQuery::new(Ok(vec![])), Duration::from_secs(1));
        let now = UNIX_EPOCH + Duration::from_secs(10_000);
        let window = fetcher.window_at(now);
        assert_eq!(window.end, now);
        assert_eq!(window.span(), BACKEND_PERIOD);
    }

    #[test]
    fn error_reasons() {
        assert_eq!(QueryError::Throttled(String::new()).reason(), "throttled");
        assert_eq!(QueryError::NotFound(String::new()).reason(), "not_found");
        assert!(!QueryError::NotFound(String::new()).is_transient());
        assert!(QueryError::Transport(String::new()).is_transient());
    }
}
