use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Default topic prefix for metrics without an explicit topic.
pub const TOPIC_PREFIX: &str = "pistatus";

/// Maps metric names to MQTT topics.
///
/// Metrics with an explicit entry use it verbatim; every other metric is
/// published to `<prefix>/<name>`.
///
/// In JSON5 configuration the map is written flat:
///
/// ```text
/// topics: {
///     prefix: "home/pi4",
///     cpu_temperature: "home/pi4/cpu_temp",
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMap {
    /// Prefix for metrics without an explicit topic.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Explicit per-metric topics.
    #[serde(flatten)]
    pub topics: BTreeMap<String, String>,
}

fn default_prefix() -> String {
    TOPIC_PREFIX.to_string()
}

impl Default for TopicMap {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            topics: BTreeMap::new(),
        }
    }
}

impl TopicMap {
    /// Create a topic map with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            topics: BTreeMap::new(),
        }
    }

    /// Set an explicit topic for a metric.
    pub fn insert(&mut self, metric: impl Into<String>, topic: impl Into<String>) {
        self.topics.insert(metric.into(), topic.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_topic(mut self, metric: impl Into<String>, topic: impl Into<String>) -> Self {
        self.insert(metric, topic);
        self
    }

    /// Resolve the topic for a metric.
    ///
    /// # Example
    /// ```
    /// use pistatus_common::topic::TopicMap;
    ///
    /// let topics = TopicMap::with_prefix("home/pi").with_topic("cpu_temperature", "pi/temp");
    /// assert_eq!(topics.topic_for("cpu_temperature"), "pi/temp");
    /// assert_eq!(topics.topic_for("disk_usage"), "home/pi/disk_usage");
    /// ```
    pub fn topic_for(&self, metric: &str) -> String {
        match self.topics.get(metric) {
            Some(topic) => topic.clone(),
            None if self.prefix.is_empty() => sanitize_segment(metric),
            None => format!("{}/{}", self.prefix, sanitize_segment(metric)),
        }
    }

    /// Check every configured topic is a valid MQTT publish topic.
    pub fn validate(&self) -> Result<()> {
        if !self.prefix.is_empty() {
            validate_topic(&self.prefix)?;
        }
        for topic in self.topics.values() {
            validate_topic(topic)?;
        }
        Ok(())
    }
}

/// Check that a topic can be published to.
///
/// Publish topics must be non-empty and may not contain the `+` and `#`
/// wildcards or NUL.
pub fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(Error::Topic("topic must not be empty".to_string()));
    }
    if topic.contains(['+', '#', '\0']) {
        return Err(Error::Topic(format!(
            "'{}' contains a wildcard or NUL character",
            topic
        )));
    }
    Ok(())
}

/// Sanitize a metric name for use as a single topic level.
/// Replaces separators and wildcards with underscores.
pub fn sanitize_segment(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '/' | ' ' | '#' | '+' | '\0' => {
                if !result.ends_with('_') && !result.is_empty() {
                    result.push('_');
                }
            }
            _ => result.push(c),
        }
    }
    result.trim_matches('_').to_string()
}
