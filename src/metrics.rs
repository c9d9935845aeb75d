use crate::llm_types::ResponseFragment;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

const NANOS_PER_SECOND: f64 = 1e9;

pub const NOT_AVAILABLE: &str = "N/A";

/// A metric the server may or may not have reported.
///
/// Absent values stay `NotAvailable`; they are never coerced to zero, since
/// zero is a real measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue<T> {
    Available(T),
    NotAvailable,
}

impl<T> MetricValue<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> MetricValue<U> {
        match self {
            MetricValue::Available(value) => MetricValue::Available(f(value)),
            MetricValue::NotAvailable => MetricValue::NotAvailable,
        }
    }
}

impl<T> From<Option<T>> for MetricValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => MetricValue::Available(value),
            None => MetricValue::NotAvailable,
        }
    }
}

impl<T: fmt::Display> fmt::Display for MetricValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Available(value) => fmt::Display::fmt(value, f),
            MetricValue::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl<T: Serialize> Serialize for MetricValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Available(value) => serializer.serialize_some(value),
            MetricValue::NotAvailable => serializer.serialize_none(),
        }
    }
}

/// Timing and token figures for one completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetrics {
    #[serde(rename = "response_time_seconds")]
    pub wall_clock_seconds: f64,
    pub model: MetricValue<String>,
    pub created_at: MetricValue<String>,
    pub eval_count: MetricValue<u64>,
    #[serde(rename = "eval_duration")]
    pub eval_duration_nanos: MetricValue<u64>,
}

impl ResponseMetrics {
    /// Build metrics from the terminal fragment and the measured wall time.
    pub fn from_terminal(fragment: &ResponseFragment, elapsed: Duration) -> Self {
        Self {
            wall_clock_seconds: elapsed.as_secs_f64(),
            model: fragment.model.clone().into(),
            created_at: fragment.created_at.clone().into(),
            eval_count: fragment.eval_count.into(),
            eval_duration_nanos: fragment.eval_duration.into(),
        }
    }

    pub fn eval_duration_seconds(&self) -> MetricValue<f64> {
        self.eval_duration_nanos
            .map(|nanos| nanos as f64 / NANOS_PER_SECOND)
    }

    pub fn response_time_display(&self) -> String {
        format!("{:.2}s", self.wall_clock_seconds)
    }

    pub fn processing_time_display(&self) -> String {
        match self.eval_duration_seconds() {
            MetricValue::Available(seconds) => format!("{:.2}s", seconds),
            MetricValue::NotAvailable => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn token_count_display(&self) -> String {
        self.eval_count.to_string()
    }
}
