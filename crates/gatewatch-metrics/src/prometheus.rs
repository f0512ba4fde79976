//! Prometheus text exposition format.
//!
//! Renders store snapshots into the text format scraped by a Prometheus
//! server or compatible agent. Output is sorted by family name and label set
//! so consecutive scrapes of unchanged data are byte-identical.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use gatewatch_core::catalog::{COUNT, ERRORS_4XX, ERRORS_5XX, ERROR_PERCENT_NAME, NAMESPACE};
use gatewatch_core::MetricDefinition;
use gatewatch_store::SnapshotEntry;
use tracing::warn;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const ERROR_PERCENT_HELP: &str = "API gateway error percent";

#[derive(Default)]
struct Family {
    help: String,
    /// Rendered label set → value.
    series: BTreeMap<String, f64>,
}

#[derive(Default)]
struct ErrorParts {
    count: Option<f64>,
    errors_4xx: Option<f64>,
    errors_5xx: Option<f64>,
}

/// Render a snapshot into Prometheus text format.
///
/// Every series is a GAUGE labelled with its dimensions. Entries whose metric
/// or label names are invalid are skipped. An empty snapshot renders as an
/// empty body.
///
/// On top of the stored entries, `apigateway_error_percent` is derived for
/// each label set whose `Count`, `4xx` and `5xx` samples are all fresh.
pub fn render_prometheus(snapshot: &[SnapshotEntry]) -> String {
    let mut families: BTreeMap<String, Family> = BTreeMap::new();
    let mut error_parts: BTreeMap<String, ErrorParts> = BTreeMap::new();

    for (definition, sample) in snapshot {
        let Some(labels) = render_labels(definition) else {
            continue;
        };

        // Stale inputs would mix refreshes and can exceed 100%.
        if definition.namespace == NAMESPACE && !sample.stale {
            let parts = error_parts.entry(labels.clone()).or_default();
            match definition.metric_name.as_str() {
                COUNT => parts.count = Some(sample.value),
                ERRORS_4XX => parts.errors_4xx = Some(sample.value),
                ERRORS_5XX => parts.errors_5xx = Some(sample.value),
                _ => {}
            }
        }

        let family = families
            .entry(definition.name.clone())
            .or_insert_with(|| Family {
                help: definition.help.clone(),
                series: BTreeMap::new(),
            });
        family.series.insert(labels, sample.value);
    }

    let percents: BTreeMap<String, f64> = error_parts
        .into_iter()
        .filter_map(|(labels, parts)| {
            let count = parts.count?;
            let errors = parts.errors_4xx? + parts.errors_5xx?;
            Some((labels, error_percent(errors, count)))
        })
        .collect();
    if !percents.is_empty() {
        families.insert(
            ERROR_PERCENT_NAME.to_string(),
            Family {
                help: ERROR_PERCENT_HELP.to_string(),
                series: percents,
            },
        );
    }

    let mut out = String::new();
    for (name, family) in &families {
        let _ = writeln!(out, "# HELP {name} {}", escape_help(&family.help));
        let _ = writeln!(out, "# TYPE {name} gauge");
        for (labels, value) in &family.series {
            let _ = writeln!(out, "{name}{labels} {}", format_value(*value));
        }
    }
    out
}

/// `(4xx + 5xx) * 100 / count`, zero when there were no requests.
fn error_percent(errors: f64, count: f64) -> f64 {
    if count > 0.0 {
        errors * 100.0 / count
    } else {
        0.0
    }
}

/// Render `{label="value",...}` for a definition, or `None` (logged) if any
/// name is invalid.
fn render_labels(definition: &MetricDefinition) -> Option<String> {
    if !is_valid_metric_name(&definition.name) {
        warn!(name = %definition.name, "skipping metric with invalid name");
        return None;
    }
    if definition.dimensions.is_empty() {
        return Some(String::new());
    }

    let mut out = String::from("{");
    for (i, dimension) in definition.dimensions.iter().enumerate() {
        let label = dimension.label_name();
        if !is_valid_label_name(&label) {
            warn!(
                name = %definition.name,
                label = %label,
                "skipping metric with invalid label name"
            );
            return None;
        }
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{label}=\"{}\"", escape_label_value(&dimension.value));
    }
    out.push('}');
    Some(out)
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
