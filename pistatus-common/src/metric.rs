use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single named sample produced by a sample source.
///
/// Metrics are immutable once created: the constructors stamp the read time
/// and the publisher only ever reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Unix epoch milliseconds when the sample was read.
    pub timestamp: i64,

    /// Metric name (e.g., "cpu_temperature", "disk_usage").
    pub name: String,

    /// The sampled value.
    pub value: f64,

    /// Unit of the value (e.g., "°C", "%").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Metric {
    /// Create a new metric stamped with the current time.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            name: name.into(),
            value,
            unit: None,
        }
    }

    /// Set the unit of this metric.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Override the read timestamp (Unix epoch milliseconds).
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// A copy of this metric with its value rounded to one decimal place.
    ///
    /// Sensors report with a precision of 0.1, so this is what goes on the wire.
    pub fn rounded(&self) -> Self {
        Self {
            value: round_to_tenth(self.value),
            ..self.clone()
        }
    }
}

/// Round a value to one decimal place.
///
/// Rounds the exact binary value with ties to even: 45.25 is an exact tie and
/// becomes 45.2, while 0.15 is stored just below the tie and becomes 0.1.
pub fn round_to_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format_tenth(value).parse().unwrap_or(value)
}

/// Format a value with exactly one decimal, rounded like [`round_to_tenth`].
pub fn format_tenth(value: f64) -> String {
    format!("{:.1}", value)
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_creation() {
        let metric = Metric::new("cpu_temperature", 45.67).with_unit("°C");

        assert_eq!(metric.name, "cpu_temperature");
        assert_eq!(metric.value, 45.67);
        assert_eq!(metric.unit.as_deref(), Some("°C"));
        assert!(metric.timestamp > 0);
    }

    #[test]
    fn test_rounded_keeps_identity() {
        let metric = Metric::new("disk_usage", 23.456).at(1_700_000_000_000);
        let rounded = metric.rounded();

        assert_eq!(rounded.value, 23.5);
        assert_eq!(rounded.name, "disk_usage");
        assert_eq!(rounded.timestamp, 1_700_000_000_000);
        // Rounding returns a copy.
        assert_eq!(metric.value, 23.456);
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(45.67), 45.7);
        assert_eq!(round_to_tenth(78.9), 78.9);
        assert_eq!(round_to_tenth(-3.14), -3.1);
        assert_eq!(round_to_tenth(0.04), 0.0);
    }

    #[test]
    fn test_round_to_tenth_ties() {
        assert_eq!(round_to_tenth(45.25), 45.2);
        assert_eq!(round_to_tenth(2.25), 2.2);
        assert_eq!(round_to_tenth(0.15), 0.1);
        assert_eq!(round_to_tenth(0.25), 0.2);
        assert_eq!(round_to_tenth(0.35), 0.3);
        assert_eq!(round_to_tenth(23.456), 23.5);
    }

    #[test]
    fn test_thermal_zone_tie() {
        // 45250 millidegrees
        let celsius = 45250_f64 / 1000.0;
        assert_eq!(format_tenth(celsius), "45.2");
        assert_eq!(Metric::new("cpu_temperature", celsius).rounded().value, 45.2);
    }

    #[test]
    fn test_round_non_finite() {
        assert!(round_to_tenth(f64::NAN).is_nan());
        assert_eq!(round_to_tenth(f64::INFINITY), f64::INFINITY);
    }
}
