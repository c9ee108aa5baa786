//! Configuration traits and utilities.

use std::path::Path;

use pistatus_common::{LoggingConfig, MqttConfig, TopicMap};
use serde::de::DeserializeOwned;

use crate::error::{PublisherError, Result};
use crate::scheduler::ScheduleConfig;

/// Trait for publisher configuration types.
///
/// Implement this for the application's configuration struct to get
/// JSON5 loading plus validation of the shared sections.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use pistatus_publisher::{LoggingConfig, MqttConfig, PublisherConfig, ScheduleConfig, TopicMap};
///
/// #[derive(Debug, Deserialize)]
/// pub struct AgentConfig {
///     pub mqtt: MqttConfig,
///     #[serde(default)]
///     pub topics: TopicMap,
///     #[serde(default)]
///     pub schedule: ScheduleConfig,
///     #[serde(default)]
///     pub logging: LoggingConfig,
/// }
///
/// impl PublisherConfig for AgentConfig {
///     fn mqtt(&self) -> &MqttConfig { &self.mqtt }
///     fn topics(&self) -> &TopicMap { &self.topics }
///     fn schedule(&self) -> &ScheduleConfig { &self.schedule }
///     fn logging(&self) -> &LoggingConfig { &self.logging }
/// }
/// ```
pub trait PublisherConfig: Sized + DeserializeOwned {
    /// Get the broker configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the metric → topic map.
    fn topics(&self) -> &TopicMap;

    /// Get the schedule.
    fn schedule(&self) -> &ScheduleConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// The default checks the shared sections; override to add more and
    /// call [`validate_common`] from the override.
    fn validate(&self) -> Result<()> {
        validate_common(self)
    }

    /// Parse configuration from a JSON5 string without validating it.
    fn parse(content: &str) -> Result<Self> {
        Ok(json5::from_str(content)?)
    }

    /// Load configuration from a file path.
    ///
    /// Does not validate: callers apply environment and CLI overrides first
    /// and then call [`validate`](Self::validate).
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PublisherError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Checks shared by every [`PublisherConfig`].
pub fn validate_common<C: PublisherConfig>(config: &C) -> Result<()> {
    let mqtt = config.mqtt();
    if mqtt.server.trim().is_empty() {
        return Err(PublisherError::validation("mqtt.server must be set"));
    }
    if mqtt.port == 0 {
        return Err(PublisherError::validation("mqtt.port must be > 0"));
    }
    if mqtt.keepalive_secs < 5 {
        return Err(PublisherError::validation("mqtt.keepalive_secs must be >= 5"));
    }
    if mqtt.connect_timeout_secs == 0 {
        return Err(PublisherError::validation("mqtt.connect_timeout_secs must be > 0"));
    }
    if mqtt.password.is_some() && mqtt.user.is_none() {
        return Err(PublisherError::validation("mqtt.password requires mqtt.user"));
    }
    if let Some(topic) = &mqtt.availability_topic {
        pistatus_common::validate_topic(topic)
            .map_err(|e| PublisherError::validation(format!("mqtt.availability_topic: {}", e)))?;
    }

    config
        .topics()
        .validate()
        .map_err(|e| PublisherError::validation(format!("topics: {}", e)))?;

    config.schedule().validate()
}
