use serde::{Deserialize, Serialize};

use crate::serialization::Format;

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Qos {
    /// QoS 0: fire and forget.
    #[default]
    AtMostOnce,
    /// QoS 1: acknowledged by the broker.
    AtLeastOnce,
    /// QoS 2: four-way handshake.
    ExactlyOnce,
}

impl TryFrom<u8> for Qos {
    type Error = String;

    fn try_from(level: u8) -> std::result::Result<Self, Self::Error> {
        match level {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(format!("invalid QoS level {}, expected 0, 1 or 2", other)),
        }
    }
}

impl From<Qos> for u8 {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

impl std::fmt::Display for Qos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// MQTT broker connection and delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address.
    #[serde(default)]
    pub server: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// User name (anonymous when absent).
    #[serde(default)]
    pub user: Option<String>,

    /// Password, only used together with `user`.
    #[serde(default)]
    pub password: Option<String>,

    /// Client identifier. "auto" derives one from the hostname.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// QoS level for metric publishes (0, 1 or 2).
    #[serde(default)]
    pub qos: Qos,

    /// Ask the broker to retain metric messages.
    #[serde(default)]
    pub retain: bool,

    /// Payload format.
    #[serde(default)]
    pub format: Format,

    /// Topic carrying "online"/"offline" (disabled when absent).
    #[serde(default)]
    pub availability_topic: Option<String>,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "auto".to_string()
}

fn default_keepalive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: default_port(),
            user: None,
            password: None,
            client_id: default_client_id(),
            keepalive_secs: default_keepalive(),
            connect_timeout_secs: default_connect_timeout(),
            qos: Qos::default(),
            retain: false,
            format: Format::default(),
            availability_topic: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
