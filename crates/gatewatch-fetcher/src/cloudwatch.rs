//! CloudWatch `GetMetricStatistics` backend.

use std::time::{Duration, SystemTime};

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudwatch::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Datapoint as CwDatapoint, Dimension, Statistic as CwStatistic};
use aws_sdk_cloudwatch::Client;
use gatewatch_core::{MetricDefinition, Statistic, TimeWindow};
use tracing::trace;

use crate::error::QueryError;
use crate::query::{Datapoint, MetricQuery, QueryFuture};

/// Load AWS SDK configuration for `region` using the default credential chain.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// [`MetricQuery`] backed by the CloudWatch API.
#[derive(Clone, Debug)]
pub struct CloudWatchQuery {
    client: Client,
}

impl CloudWatchQuery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    async fn get_statistics(
        &self,
        definition: &MetricDefinition,
        window: TimeWindow,
    ) -> Result<Vec<Datapoint>, QueryError> {
        let period = period_secs(window.period)?;
        let dimensions = definition
            .dimensions
            .iter()
            .map(|d| Dimension::builder().name(&d.name).value(&d.value).build())
            .collect();

        let output = self
            .client
            .get_metric_statistics()
            .namespace(&definition.namespace)
            .metric_name(&definition.metric_name)
            .set_dimensions(Some(dimensions))
            .start_time(DateTime::from(window.start))
            .end_time(DateTime::from(window.end))
            .period(period)
            .statistics(cloudwatch_statistic(definition.statistic))
            .send()
            .await
            .map_err(classify)?;

        let points: Vec<Datapoint> = output
            .datapoints()
            .iter()
            .filter_map(|p| to_datapoint(p, definition.statistic))
            .collect();

        trace!(series = %definition.series(), datapoints = points.len(), "cloudwatch response");
        Ok(points)
    }
}

impl MetricQuery for CloudWatchQuery {
    fn query<'a>(
        &'a self,
        definition: &'a MetricDefinition,
        window: TimeWindow,
    ) -> QueryFuture<'a> {
        Box::pin(self.get_statistics(definition, window))
    }
}

fn cloudwatch_statistic(statistic: Statistic) -> CwStatistic {
    match statistic {
        Statistic::Sum => CwStatistic::Sum,
        Statistic::Average => CwStatistic::Average,
        Statistic::Minimum => CwStatistic::Minimum,
        Statistic::Maximum => CwStatistic::Maximum,
        Statistic::SampleCount => CwStatistic::SampleCount,
    }
}

/// Aggregation period in whole seconds, as the API expects it.
fn period_secs(period: Duration) -> Result<i32, QueryError> {
    i32::try_from(period.as_secs())
        .map_err(|_| QueryError::Backend(format!("period of {}s is out of range", period.as_secs())))
}

fn to_datapoint(point: &CwDatapoint, statistic: Statistic) -> Option<Datapoint> {
    let value = match statistic {
        Statistic::Sum => point.sum(),
        Statistic::Average => point.average(),
        Statistic::Minimum => point.minimum(),
        Statistic::Maximum => point.maximum(),
        Statistic::SampleCount => point.sample_count(),
    }?;
    let timestamp = SystemTime::try_from(*point.timestamp()?).ok()?;
    Some(Datapoint { timestamp, value })
}

/// Map an SDK error onto the fetch failure taxonomy.
pub(crate) fn classify<E, R>(err: SdkError<E, R>) -> QueryError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            QueryError::Transport(message)
        }
        SdkError::ServiceError(service) => classify_code(service.err().code(), message),
        _ => QueryError::Backend(message),
    }
}

/// Classify a service error by its AWS error code.
fn classify_code(code: Option<&str>, message: String) -> QueryError {
    match code {
        Some(
            "Throttling"
            | "ThrottlingException"
            | "TooManyRequestsException"
            | "RequestLimitExceeded"
            | "LimitExceededException",
        ) => QueryError::Throttled(message),
        Some("ResourceNotFound" | "ResourceNotFoundException" | "NotFoundException") => {
            QueryError::NotFound(message)
        }
        Some("ServiceUnavailable" | "RequestTimeout" | "RequestTimeoutException") => {
            QueryError::Transport(message)
        }
        _ => QueryError::Backend(message),
    }
}
