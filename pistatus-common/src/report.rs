//! Structured failure reports.
//!
//! Nothing the publisher does fails silently: sample, connect and delivery
//! failures are all turned into a [`FailureReport`] and handed to the log.

use serde::{Deserialize, Serialize};

use crate::metric::current_timestamp_millis;

/// Failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A sample source could not produce a value.
    SampleFailed,
    /// The transport could not send a message.
    TransportError,
    /// The broker refused a publish.
    BrokerRejected,
    /// The broker session could not be established.
    ConnectFailed,
}

impl FailureKind {
    /// Get the string representation used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SampleFailed => "sample_failed",
            FailureKind::TransportError => "transport_error",
            FailureKind::BrokerRejected => "broker_rejected",
            FailureKind::ConnectFailed => "connect_failed",
        }
    }

    /// Whether the run keeps going after this kind of failure.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FailureKind::ConnectFailed)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failure, ready for the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    /// Timestamp (millis since epoch).
    pub timestamp: i64,
    /// Metric concerned (absent for connection failures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    /// Failure classification.
    pub kind: FailureKind,
    /// Error message.
    pub message: String,
}

impl FailureReport {
    /// Create a report for a metric-level failure.
    pub fn metric(
        metric: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            timestamp,
            metric: Some(metric.into()),
            kind,
            message: message.into(),
        }
    }

    /// Create a report for a connection failure.
    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            metric: None,
            kind: FailureKind::ConnectFailed,
            message: message.into(),
        }
    }

    /// Emit this report through `tracing`.
    ///
    /// Recoverable failures are warnings, connection failures are errors.
    pub fn emit(&self) {
        let metric = self.metric.as_deref().unwrap_or("-");
        if self.kind.is_recoverable() {
            tracing::warn!(
                metric = %metric,
                timestamp = self.timestamp,
                kind = %self.kind,
                error = %self.message,
                "Metric failure"
            );
        } else {
            tracing::error!(
                timestamp = self.timestamp,
                kind = %self.kind,
                error = %self.message,
                "Connection failure"
            );
        }
    }
}
