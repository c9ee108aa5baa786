//! pistatus Common Library
//!
//! This crate provides shared types and utilities for the pistatus metrics publisher:
//!
//! - [`metric`] - Metric data model (`Metric`)
//! - [`serialization`] - Plain/JSON/CBOR payload encoding
//! - [`config`] - MQTT and logging configuration sections
//! - [`topic`] - Metric to topic mapping
//! - [`report`] - Structured failure reports
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod metric;
pub mod report;
pub mod serialization;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig, Qos};
pub use error::{Error, Result};
pub use metric::{Metric, current_timestamp_millis, format_tenth, round_to_tenth};
pub use report::{FailureKind, FailureReport};
pub use serialization::{Format, encode, encode_metric};
pub use topic::{TOPIC_PREFIX, TopicMap, validate_topic};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Example
///
/// ```ignore
/// use pistatus_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
