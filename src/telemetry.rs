//! Metrics and error sink used by the pipeline
//!
//! The sink is a collaborator: it may fail or even panic, and none of that is
//! allowed to reach comment processing. Pipeline code therefore never calls a
//! [`Telemetry`] method directly but goes through [`metric`] and [`error`],
//! which give every call its own failure boundary.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

pub const METRIC_ANSWER_BROADCAST: &str = "answers.broadcast";
pub const METRIC_DROPPED_NO_QUESTION: &str = "answers.dropped_no_question";
pub const METRIC_FEED_LAGGED: &str = "feed.lagged";

pub type Tags = BTreeMap<String, String>;

/// Result type for sink operations
pub type TelemetryResult = Result<(), TelemetryError>;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry sink unavailable: {0}")]
    Unavailable(String),

    #[error("Telemetry sink rejected record: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
    Milliseconds,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::Count => "count",
            MetricUnit::Milliseconds => "ms",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Sink for metrics and errors
pub trait Telemetry: Send + Sync {
    fn record_metric(&self, name: &str, value: f64, unit: MetricUnit, tags: &Tags)
        -> TelemetryResult;

    fn record_error(&self, error: &str, severity: Severity, context: &Tags) -> TelemetryResult;
}

/// Default sink: everything goes to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn record_metric(
        &self,
        name: &str,
        value: f64,
        unit: MetricUnit,
        tags: &Tags,
    ) -> TelemetryResult {
        tracing::debug!(metric = name, value, unit = unit.as_str(), ?tags, "metric");
        Ok(())
    }

    fn record_error(&self, error: &str, severity: Severity, context: &Tags) -> TelemetryResult {
        match severity {
            Severity::High | Severity::Critical => {
                tracing::error!(?severity, ?context, "{}", error)
            }
            Severity::Medium => tracing::warn!(?severity, ?context, "{}", error),
            Severity::Low => tracing::info!(?severity, ?context, "{}", error),
        }
        Ok(())
    }
}

/// Build a tag map from string pairs
pub fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Record a metric, swallowing sink errors and panics
pub fn metric(sink: &dyn Telemetry, name: &str, value: f64, unit: MetricUnit, tags: &Tags) {
    match panic::catch_unwind(AssertUnwindSafe(|| {
        sink.record_metric(name, value, unit, tags)
    })) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(metric = name, "Failed to record metric: {}", e),
        Err(_) => tracing::warn!(metric = name, "Telemetry sink panicked while recording metric"),
    }
}

/// Record an error, swallowing sink errors and panics
pub fn error(sink: &dyn Telemetry, error: &str, severity: Severity, context: &Tags) {
    match panic::catch_unwind(AssertUnwindSafe(|| {
        sink.record_error(error, severity, context)
    })) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(?severity, "Failed to record error '{}': {}", error, e),
        Err(_) => tracing::warn!(?severity, "Telemetry sink panicked while recording '{}'", error),
    }
}
