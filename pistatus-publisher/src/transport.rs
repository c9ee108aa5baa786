//! Broker transport abstraction.
//!
//! The publisher never talks to the network directly; it drives a
//! [`Transport`], which owns the single broker session. [`MqttTransport`]
//! is the real implementation and [`MockTransport`] the recording double
//! used in tests.
//!
//! [`MqttTransport`]: crate::mqtt::MqttTransport
//! [`MockTransport`]: crate::mock::MockTransport

use std::future::Future;
use std::time::Duration;

use pistatus_common::{MqttConfig, Qos};

use crate::error::TransportError;

/// Broker address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint from the MQTT configuration.
    pub fn from_config(config: &MqttConfig) -> Self {
        Self::new(config.server.clone(), config.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// User name and password for the broker.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Credentials from the MQTT configuration, if a user is set.
    pub fn from_config(config: &MqttConfig) -> Option<Self> {
        config.user.as_ref().map(|user| Self {
            username: user.clone(),
            password: config.password.clone().unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Message the broker publishes for us if the session dies uncleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
}

/// Session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval.
    pub keepalive: Duration,
    /// How long to wait for the broker's answer.
    pub timeout: Duration,
    /// Optional last will.
    pub last_will: Option<LastWill>,
}

impl ConnectOptions {
    /// Options from the MQTT configuration.
    ///
    /// `client_id` must already be resolved (no "auto").
    pub fn from_config(config: &MqttConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            keepalive: Duration::from_secs(config.keepalive_secs),
            timeout: Duration::from_secs(config.connect_timeout_secs),
            last_will: None,
        }
    }

    /// Set the last will.
    pub fn with_last_will(mut self, will: LastWill) -> Self {
        self.last_will = Some(will);
        self
    }
}

/// Outcome of a publish the transport handled without a local error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent (QoS 0) or acknowledged (QoS 1/2).
    Accepted,
    /// The broker answered with a negative acknowledgement.
    Rejected { reason_code: u8 },
}

/// A connection to a pub/sub broker.
///
/// Implementations hold at most one session. Calls are strictly sequential:
/// the publisher never issues a second call before the first completes.
pub trait Transport: Send {
    /// Open a session and return the broker's CONNACK reason code.
    ///
    /// `0` means accepted; any other value is a broker-defined refusal.
    /// Errors are local failures (network, client) before an answer arrived.
    fn connect(
        &mut self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<u8, TransportError>> + Send;

    /// Send one message.
    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> impl Future<Output = Result<Delivery, TransportError>> + Send;

    /// Close the session and release every resource held for it.
    ///
    /// Must succeed (as a no-op) when no session is open.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for `period` while keeping the session alive.
    fn idle(&mut self, period: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(period)
    }
}
