//! Domain types for metric definitions, samples, and query windows.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// CloudWatch aggregation applied over a query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Sum,
    Average,
    Minimum,
    Maximum,
    SampleCount,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Sum => "Sum",
            Statistic::Average => "Average",
            Statistic::Minimum => "Minimum",
            Statistic::Maximum => "Maximum",
            Statistic::SampleCount => "SampleCount",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of the values reported for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Count,
    Milliseconds,
}

/// A single name/value pair scoping a metric query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Exposition label name for this dimension (`ApiId` → `api_id`).
    pub fn label_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 4);
        let mut prev_lower = false;
        for c in self.name.chars() {
            if c.is_ascii_uppercase() {
                if prev_lower {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
                prev_lower = false;
            } else {
                out.push(c);
                prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            }
        }
        out
    }
}

/// Immutable descriptor of one backend metric series.
///
/// Two definitions are the same metric iff every field is equal; the store
/// keys samples by this identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Backend namespace (e.g., "AWS/ApiGateway").
    pub namespace: String,
    /// Backend metric name (e.g., "Count", "Latency").
    pub metric_name: String,
    pub statistic: Statistic,
    pub unit: Unit,
    /// Query dimensions, in the order they are sent to the backend.
    pub dimensions: Vec<Dimension>,
    /// Exposition metric family name.
    pub name: String,
    /// Exposition help text.
    pub help: String,
}

impl MetricDefinition {
    /// Short human-readable identifier for logs.
    pub fn series(&self) -> String {
        let dims: Vec<String> = self
            .dimensions
            .iter()
            .map(|d| format!("{}={}", d.name, d.value))
            .collect();
        format!("{}:{}[{}]", self.metric_name, self.statistic, dims.join(","))
    }
}

/// The latest known value of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub value: f64,
    /// When the value was fetched.
    pub observed_at: SystemTime,
    /// Set when the most recent refresh attempt failed.
    pub stale: bool,
}

impl MetricSample {
    /// A fresh sample observed at `observed_at`.
    pub fn fresh(value: f64, observed_at: SystemTime) -> Self {
        Self {
            value,
            observed_at,
            stale: false,
        }
    }
}

/// A backend query window `[start, end)` aggregated in `period` buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: SystemTime,
    pub end: SystemTime,
    pub period: Duration,
}

impl TimeWindow {
    /// Window ending at `end`, covering at least `min_span` and at least one
    /// `period`, rounded up to a whole number of periods.
    pub fn ending_at(end: SystemTime, min_span: Duration, period: Duration) -> Self {
        let period_secs = period.as_secs().max(1);
        let wanted = min_span.as_secs().max(period_secs);
        let buckets = wanted.div_ceil(period_secs);
        let span = Duration::from_secs(buckets * period_secs);
        Self {
            start: end.checked_sub(span).unwrap_or(SystemTime::UNIX_EPOCH),
            end,
            period: Duration::from_secs(period_secs),
        }
    }

    pub fn span(&self) -> Duration {
        self.end.duration_since(self.start).unwrap_or_default()
    }
}
