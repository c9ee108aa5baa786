//! Metric publisher over a managed broker session.

use std::time::Duration;

use pistatus_common::{
    FailureKind, FailureReport, Format, Metric, Qos, TopicMap, encode_metric,
};

use crate::error::{ConnectError, TransportError};
use crate::transport::{ConnectOptions, Credentials, Delivery, Endpoint, Transport};

/// Publisher for sending metrics to the broker.
///
/// Owns the [`Transport`] and therefore the one broker session. Resolves
/// each metric's topic through a [`TopicMap`] and encodes payloads with the
/// configured [`Format`].
#[derive(Debug)]
pub struct Publisher<T: Transport> {
    transport: T,
    topics: TopicMap,
    format: Format,
    connected: bool,
    stats: PublishStats,
}

impl<T: Transport> Publisher<T> {
    /// Create a new publisher. No session is opened until [`connect`](Self::connect).
    pub fn new(transport: T, topics: TopicMap, format: Format) -> Self {
        Self {
            transport,
            topics,
            format,
            connected: false,
            stats: PublishStats::default(),
        }
    }

    /// Get the topic map.
    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    /// Get the payload format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Counts over every publish since creation.
    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Open the broker session.
    ///
    /// A non-zero CONNACK reason code is returned as
    /// [`ConnectError::Refused`]. No retry happens here.
    pub async fn connect(
        &mut self,
        endpoint: &Endpoint,
        credentials: Option<&Credentials>,
        options: &ConnectOptions,
    ) -> Result<(), ConnectError> {
        tracing::info!(
            endpoint = %endpoint,
            client_id = %options.client_id,
            user = credentials.map(|c| c.username.as_str()).unwrap_or("-"),
            "Connecting to MQTT broker"
        );

        let reason_code = tokio::time::timeout(
            options.timeout,
            self.transport.connect(endpoint, credentials, options),
        )
        .await
        .map_err(|_| ConnectError::Timeout(options.timeout))??;

        if reason_code != 0 {
            tracing::error!(reason_code, "Error connecting with reason code {}", reason_code);
            return Err(ConnectError::Refused { reason_code });
        }

        tracing::info!(endpoint = %endpoint, "Connected with result code {}", reason_code);
        self.connected = true;
        Ok(())
    }

    /// Publish a metric.
    ///
    /// The value is rounded to one decimal place. A failed send leaves the
    /// session open.
    pub async fn publish(&mut self, metric: &Metric, qos: Qos, retain: bool) -> PublishResult {
        let topic = self.topics.topic_for(&metric.name);
        let attempted_at = chrono::Utc::now().timestamp_millis();

        let (payload, outcome) = match encode_metric(metric, self.format) {
            Ok(payload) => {
                let outcome = self.send(&topic, payload.clone(), qos, retain).await;
                (payload, outcome)
            }
            Err(e) => (
                Vec::new(),
                PublishOutcome::TransportError(format!("encoding failed: {}", e)),
            ),
        };

        let result = PublishResult {
            metric_name: metric.name.clone(),
            topic,
            payload,
            outcome,
            attempted_at,
        };

        match result.failure_report() {
            Some(report) => report.emit(),
            None => tracing::info!(
                metric = %result.metric_name,
                qos = %qos,
                "Successfully sent {:.1} to {}",
                metric.rounded().value,
                result.topic
            ),
        }
        self.stats.record(&result.outcome);

        result
    }

    /// Publish a raw payload to an explicit topic (availability messages, etc.).
    pub async fn publish_raw(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> PublishOutcome {
        self.send(topic, payload, qos, retain).await
    }

    async fn send(&mut self, topic: &str, payload: Vec<u8>, qos: Qos, retain: bool) -> PublishOutcome {
        if !self.connected {
            return PublishOutcome::TransportError(TransportError::NotConnected.to_string());
        }

        match self.transport.publish(topic, payload, qos, retain).await {
            Ok(Delivery::Accepted) => PublishOutcome::Success,
            Ok(Delivery::Rejected { reason_code }) => PublishOutcome::BrokerRejected { reason_code },
            Err(e) => PublishOutcome::TransportError(e.to_string()),
        }
    }

    /// Wait for `period`, letting the transport keep the session alive.
    pub async fn idle(&mut self, period: Duration) {
        self.transport.idle(period).await;
    }

    /// Close the session.
    ///
    /// Always forwarded to the transport, even without an open session, so
    /// that anything left over from a failed connect is released too.
    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        let was_connected = std::mem::replace(&mut self.connected, false);
        let result = self.transport.disconnect().await;

        match &result {
            Ok(()) if was_connected => tracing::info!("Disconnected from MQTT broker"),
            Ok(()) => tracing::debug!("Transport released"),
            Err(e) => tracing::warn!(error = %e, "Error closing MQTT session"),
        }

        result
    }
}

/// Delivery outcome of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The transport reported no local error.
    Success,
    /// The send failed locally (e.g., connection dropped).
    TransportError(String),
    /// The broker returned a negative acknowledgement (QoS ≥ 1 only).
    BrokerRejected { reason_code: u8 },
}

impl PublishOutcome {
    /// Whether the publish succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success)
    }
}

/// Result of one publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// Name of the metric.
    pub metric_name: String,
    /// Topic it was sent to.
    pub topic: String,
    /// Encoded payload.
    pub payload: Vec<u8>,
    /// What happened.
    pub outcome: PublishOutcome,
    /// When the attempt started (Unix epoch millis).
    pub attempted_at: i64,
}

impl PublishResult {
    /// Whether the publish succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Structured report for a failed publish.
    pub fn failure_report(&self) -> Option<FailureReport> {
        let (kind, message) = match &self.outcome {
            PublishOutcome::Success => return None,
            PublishOutcome::TransportError(reason) => {
                (FailureKind::TransportError, reason.clone())
            }
            PublishOutcome::BrokerRejected { reason_code } => (
                FailureKind::BrokerRejected,
                format!("broker rejected publish to {} (reason code {})", self.topic, reason_code),
            ),
        };

        Some(FailureReport::metric(
            &self.metric_name,
            kind,
            message,
            self.attempted_at,
        ))
    }
}

/// Publish counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successful publishes.
    pub success: usize,
    /// Number of local transport failures.
    pub transport_errors: usize,
    /// Number of broker rejections.
    pub rejected: usize,
}

impl PublishStats {
    /// Count one outcome.
    pub fn record(&mut self, outcome: &PublishOutcome) {
        match outcome {
            PublishOutcome::Success => self.success += 1,
            PublishOutcome::TransportError(_) => self.transport_errors += 1,
            PublishOutcome::BrokerRejected { .. } => self.rejected += 1,
        }
    }

    /// Number of failed publishes.
    pub fn failed(&self) -> usize {
        self.transport_errors + self.rejected
    }

    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed()
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }

    /// Add another set of counts.
    pub fn merge(&mut self, other: &PublishStats) {
        self.success += other.success;
        self.transport_errors += other.transport_errors;
        self.rejected += other.rejected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn endpoint() -> Endpoint {
        Endpoint::new("broker.local", 1883)
    }

    fn options() -> ConnectOptions {
        ConnectOptions {
            client_id: "pistatus-test".to_string(),
            keepalive: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
            last_will: None,
        }
    }

    async fn connected(mock: MockTransport, topics: TopicMap) -> Publisher<MockTransport> {
        let mut publisher = Publisher::new(mock, topics, Format::Plain);
        publisher.connect(&endpoint(), None, &options()).await.unwrap();
        publisher
    }

    #[tokio::test]
    async fn test_publish_rounds_value() {
        let mock = MockTransport::new();
        let topics = TopicMap::default().with_topic("cpu_temperature", "pi/cpu_temp");
        let mut publisher = connected(mock.clone(), topics).await;

        let result = publisher
            .publish(&Metric::new("cpu_temperature", 23.456), Qos::AtMostOnce, false)
            .await;

        assert!(result.is_success());
        assert_eq!(result.payload, b"23.5");
        assert_eq!(result.topic, "pi/cpu_temp");

        let sent = mock.publishes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "pi/cpu_temp");
        assert_eq!(sent[0].payload, b"23.5");
        assert_eq!(sent[0].qos, Qos::AtMostOnce);
        assert!(!sent[0].retain);
    }

    #[tokio::test]
    async fn test_transport_error_keeps_session_open() {
        let mock = MockTransport::new();
        mock.fail_next_publish(TransportError::Network("connection reset".to_string()));
        let mut publisher = connected(mock.clone(), TopicMap::default()).await;

        let result = publisher
            .publish(&Metric::new("disk_usage", 78.9), Qos::AtMostOnce, false)
            .await;

        assert_eq!(
            result.outcome,
            PublishOutcome::TransportError("network error: connection reset".to_string())
        );
        assert!(publisher.is_connected());
        assert_eq!(mock.disconnect_calls(), 0);

        let report = result.failure_report().unwrap();
        assert_eq!(report.kind, FailureKind::TransportError);
        assert_eq!(report.metric.as_deref(), Some("disk_usage"));

        // The next publish goes through on the same session.
        let result = publisher
            .publish(&Metric::new("disk_usage", 78.9), Qos::AtMostOnce, false)
            .await;
        assert!(result.is_success());
        assert_eq!(publisher.stats().transport_errors, 1);
        assert_eq!(publisher.stats().success, 1);
    }

    #[tokio::test]
    async fn test_broker_rejection() {
        let mock = MockTransport::new();
        mock.reject_next_publish(0x87);
        let mut publisher = connected(mock.clone(), TopicMap::default()).await;

        let result = publisher
            .publish(&Metric::new("disk_usage", 50.0), Qos::AtLeastOnce, true)
            .await;

        assert_eq!(result.outcome, PublishOutcome::BrokerRejected { reason_code: 0x87 });
        assert_eq!(result.failure_report().unwrap().kind, FailureKind::BrokerRejected);
        assert_eq!(mock.publishes()[0].qos, Qos::AtLeastOnce);
        assert!(mock.publishes()[0].retain);
    }

    #[tokio::test]
    async fn test_refused_connect_surfaces_reason_code() {
        let mock = MockTransport::new();
        mock.refuse_next_connect(5);
        let mut publisher = Publisher::new(mock.clone(), TopicMap::default(), Format::Plain);

        let err = publisher.connect(&endpoint(), None, &options()).await.unwrap_err();

        assert_eq!(err, ConnectError::Refused { reason_code: 5 });
        assert!(!publisher.is_connected());
        assert_eq!(mock.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let mock = MockTransport::new();
        mock.hang_next_connect();
        let mut publisher = Publisher::new(mock, TopicMap::default(), Format::Plain);

        let err = publisher.connect(&endpoint(), None, &options()).await.unwrap_err();
        assert_eq!(err, ConnectError::Timeout(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_publish_before_connect() {
        let mock = MockTransport::new();
        let mut publisher = Publisher::new(mock.clone(), TopicMap::default(), Format::Plain);

        let result = publisher
            .publish(&Metric::new("disk_usage", 1.0), Qos::AtMostOnce, false)
            .await;

        assert_eq!(
            result.outcome,
            PublishOutcome::TransportError("not connected".to_string())
        );
        assert!(mock.publishes().is_empty());
    }

    #[tokio::test]
    async fn test_json_payload() {
        let mock = MockTransport::new();
        let mut publisher = Publisher::new(mock.clone(), TopicMap::default(), Format::Json);
        publisher.connect(&endpoint(), None, &options()).await.unwrap();

        publisher
            .publish(&Metric::new("cpu_temperature", 45.67).with_unit("°C"), Qos::AtMostOnce, false)
            .await;

        let sent = mock.publishes();
        let doc: serde_json::Value = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(doc["name"], "cpu_temperature");
        assert_eq!(doc["value"], 45.7);
        assert_eq!(sent[0].topic, "pistatus/cpu_temperature");
    }

    #[tokio::test]
    async fn test_disconnect() {
        let mock = MockTransport::new();
        let mut publisher = connected(mock.clone(), TopicMap::default()).await;

        publisher.disconnect().await.unwrap();

        assert!(!publisher.is_connected());
        assert_eq!(mock.disconnect_calls(), 1);
    }

    #[test]
    fn test_publish_stats() {
        let mut stats = PublishStats::default();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        for _ in 0..8 {
            stats.record(&PublishOutcome::Success);
        }
        stats.record(&PublishOutcome::TransportError("reset".to_string()));
        stats.record(&PublishOutcome::BrokerRejected { reason_code: 0x80 });

        assert_eq!(stats.total(), 10);
        assert_eq!(stats.failed(), 2);
        assert_eq!(stats.success_rate(), 80.0);
    }
}
