//! Error types for the publisher framework.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`PublisherError`].
pub type Result<T> = std::result::Result<T, PublisherError>;

/// Errors that can occur while setting up or running the publisher.
#[derive(Error, Debug)]
pub enum PublisherError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Broker session could not be established.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Transport failure outside of a publish.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Source registration failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublisherError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<json5::Error> for PublisherError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

/// Local failures reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No session is open.
    #[error("not connected")]
    NotConnected,

    /// The network connection failed or dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The client refused the request locally (e.g., request queue closed).
    #[error("client error: {0}")]
    Client(String),

    /// The operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to establish a broker session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The broker answered the connect with a non-zero reason code.
    #[error("broker refused connection (reason code {reason_code}: {})", connack_reason(*reason_code))]
    Refused { reason_code: u8 },

    /// No answer within the connect timeout.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed before the broker answered.
    #[error("connect failed: {0}")]
    Transport(#[from] TransportError),
}

impl ConnectError {
    /// Whether another attempt could succeed.
    ///
    /// Credential and authorization refusals are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConnectError::Refused { reason_code: 4 | 5 })
    }
}

/// Human-readable meaning of an MQTT CONNACK reason code.
pub fn connack_reason(reason_code: u8) -> &'static str {
    match reason_code {
        0 => "connection accepted",
        1 => "unacceptable protocol version",
        2 => "client identifier rejected",
        3 => "server unavailable",
        4 => "bad user name or password",
        5 => "not authorized",
        _ => "unknown reason",
    }
}

/// Failure of a single sample source read.
#[derive(Error, Debug)]
pub enum SampleError {
    /// The sensor is missing or produced nothing.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    /// Reading the sensor failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The sensor produced something that is not a number.
    #[error("invalid reading: {0}")]
    Parse(String),
}

impl SampleError {
    /// Create an unavailable-sensor error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Errors from the sample source registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A source with this name is already registered.
    #[error("sample source '{0}' is already registered")]
    DuplicateName(String),
}
