//! Availability reporting.

use pistatus_common::Qos;

use crate::publisher::{PublishOutcome, Publisher};
use crate::transport::{LastWill, Transport};

/// Payload announcing the publisher is up.
pub const ONLINE: &str = "online";
/// Payload announcing the publisher is gone.
pub const OFFLINE: &str = "offline";

/// Publisher availability on a retained topic.
///
/// The broker is handed an `offline` last will at connect time, `online` is
/// published right after connecting and `offline` again just before a clean
/// disconnect, so subscribers always see the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    topic: String,
}

impl Availability {
    /// Create availability reporting on `topic`.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    /// Get the availability topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Last will carrying the `offline` state.
    pub fn last_will(&self) -> LastWill {
        LastWill {
            topic: self.topic.clone(),
            payload: OFFLINE.as_bytes().to_vec(),
            qos: Qos::AtLeastOnce,
            retain: true,
        }
    }

    /// Publish "online".
    pub async fn publish_online<T: Transport>(&self, publisher: &mut Publisher<T>) -> PublishOutcome {
        self.publish(publisher, ONLINE).await
    }

    /// Publish "offline".
    pub async fn publish_offline<T: Transport>(&self, publisher: &mut Publisher<T>) -> PublishOutcome {
        self.publish(publisher, OFFLINE).await
    }

    async fn publish<T: Transport>(&self, publisher: &mut Publisher<T>, state: &str) -> PublishOutcome {
        let outcome = publisher
            .publish_raw(&self.topic, state.as_bytes().to_vec(), Qos::AtLeastOnce, true)
            .await;

        if !outcome.is_success() {
            tracing::warn!(topic = %self.topic, state, outcome = ?outcome, "Failed to publish availability");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::transport::{ConnectOptions, Endpoint};
    use pistatus_common::{Format, TopicMap};
    use std::time::Duration;

    #[test]
    fn test_last_will() {
        let availability = Availability::new("pistatus/pi4/status");
        let will = availability.last_will();

        assert_eq!(will.topic, "pistatus/pi4/status");
        assert_eq!(will.payload, b"offline");
        assert!(will.retain);
    }

    #[tokio::test]
    async fn test_online_offline_are_retained() {
        let mock = MockTransport::new();
        let mut publisher = Publisher::new(mock.clone(), TopicMap::default(), Format::Plain);
        let options = ConnectOptions {
            client_id: "pistatus-test".to_string(),
            keepalive: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
            last_will: None,
        };
        publisher
            .connect(&Endpoint::new("broker.local", 1883), None, &options)
            .await
            .unwrap();

        let availability = Availability::new("pistatus/status");
        assert!(availability.publish_online(&mut publisher).await.is_success());
        assert!(availability.publish_offline(&mut publisher).await.is_success());

        let sent = mock.publishes();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].payload_str(), "online");
        assert_eq!(sent[1].payload_str(), "offline");
        assert!(sent.iter().all(|p| p.retain && p.topic == "pistatus/status"));
    }
}
