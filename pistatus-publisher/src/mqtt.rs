//! MQTT transport built on `rumqttc`.
//!
//! The event loop is polled inline: a publish returns once the packet left
//! the client (QoS 0) or the broker acknowledged it (QoS 1/2), and
//! [`Transport::idle`] keeps polling so keep-alive pings flow while the
//! scheduler sleeps.

use std::future::Future;
use std::time::Duration;

use pistatus_common::Qos;
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, NetworkOptions, Outgoing, Packet,
    QoS,
};

use crate::error::TransportError;
use crate::transport::{ConnectOptions, Credentials, Delivery, Endpoint, Transport};

/// Capacity of the client request channel.
const REQUEST_CAPACITY: usize = 16;

/// Upper bound on waiting for the DISCONNECT packet to go out.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after an event loop error while idle, before the next reconnect.
const IDLE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Session state: present only between a successful connect and disconnect.
struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// [`Transport`] speaking MQTT 3.1.1 through `rumqttc`.
#[derive(Default)]
pub struct MqttTransport {
    session: Option<Session>,
}

impl MqttTransport {
    /// Create a transport with no open session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn to_mqtt_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn build_options(
    endpoint: &Endpoint,
    credentials: Option<&Credentials>,
    options: &ConnectOptions,
) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(&options.client_id, &endpoint.host, endpoint.port);
    mqtt_options.set_keep_alive(options.keepalive);
    mqtt_options.set_clean_session(true);

    if let Some(creds) = credentials {
        mqtt_options.set_credentials(&creds.username, &creds.password);
    }

    if let Some(will) = &options.last_will {
        mqtt_options.set_last_will(rumqttc::LastWill::new(
            &will.topic,
            will.payload.clone(),
            to_mqtt_qos(will.qos),
            will.retain,
        ));
    }

    mqtt_options
}

/// Socket settings for the event loop.
///
/// rumqttc gives up on the TCP connect after its own timeout (5 s unless
/// set), so it is raised to the configured connect timeout in whole seconds.
fn network_options(options: &ConnectOptions) -> NetworkOptions {
    let secs = options.timeout.as_secs_f64().ceil() as u64;
    let mut network = NetworkOptions::new();
    network.set_connection_timeout(secs.max(1));
    network
}

impl Transport for MqttTransport {
    fn connect(
        &mut self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<u8, TransportError>> + Send {
        async move {
            // A previous session is dropped rather than reused.
            self.session = None;

            let mqtt_options = build_options(endpoint, credentials, options);
            let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
            eventloop.network_options = network_options(options);

            let reason_code = loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => break ack.code as u8,
                    Ok(_) => continue,
                    Err(ConnectionError::ConnectionRefused(code)) => break code as u8,
                    Err(e) => return Err(TransportError::Network(e.to_string())),
                }
            };

            tracing::debug!(endpoint = %endpoint, reason_code, "CONNACK received");

            if reason_code == 0 {
                self.session = Some(Session { client, eventloop });
            }

            Ok(reason_code)
        }
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> impl Future<Output = Result<Delivery, TransportError>> + Send {
        async move {
            let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;

            session
                .client
                .publish(topic, to_mqtt_qos(qos), retain, payload)
                .await
                .map_err(|e| TransportError::Client(e.to_string()))?;

            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(_))) if qos == Qos::AtMostOnce => {
                        return Ok(Delivery::Accepted);
                    }
                    Ok(Event::Incoming(Packet::PubAck(_))) if qos == Qos::AtLeastOnce => {
                        return Ok(Delivery::Accepted);
                    }
                    Ok(Event::Incoming(Packet::PubComp(_))) if qos == Qos::ExactlyOnce => {
                        return Ok(Delivery::Accepted);
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        return Err(TransportError::Network(
                            "broker closed the session".to_string(),
                        ));
                    }
                    Ok(_) => continue,
                    Err(e) => return Err(TransportError::Network(e.to_string())),
                }
            }
        }
    }

    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            let Some(mut session) = self.session.take() else {
                return Ok(());
            };

            session
                .client
                .disconnect()
                .await
                .map_err(|e| TransportError::Client(e.to_string()))?;

            let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
                loop {
                    match session.eventloop.poll().await {
                        Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                        Ok(_) => continue,
                    }
                }
            })
            .await;

            flushed.map_err(|_| TransportError::Timeout(DISCONNECT_TIMEOUT))
        }
    }

    fn idle(&mut self, period: Duration) -> impl Future<Output = ()> + Send {
        async move {
            let Some(session) = self.session.as_mut() else {
                tokio::time::sleep(period).await;
                return;
            };

            // Polling drives pings and, after a drop, rumqttc's reconnect.
            let _ = tokio::time::timeout(period, async {
                loop {
                    if let Err(e) = session.eventloop.poll().await {
                        tracing::debug!(error = %e, "MQTT event loop error while idle");
                        tokio::time::sleep(IDLE_RETRY_DELAY).await;
                    }
                }
            })
            .await;
        }
    }
}
