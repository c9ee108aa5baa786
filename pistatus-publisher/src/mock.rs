//! Recording transport for tests.
//!
//! [`MockTransport`] never touches the network. It records every call and
//! plays back scripted failures, so publisher and scheduler behaviour can be
//! checked through call counts and captured payloads.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use pistatus_common::Qos;

use crate::error::TransportError;
use crate::transport::{ConnectOptions, Credentials, Delivery, Endpoint, Transport};

/// A publish as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
}

impl RecordedPublish {
    /// Payload as text.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug)]
enum ConnectScript {
    Answer(u8),
    Fail(TransportError),
    Hang,
}

#[derive(Debug, Default)]
struct MockState {
    connect_script: VecDeque<ConnectScript>,
    publish_script: VecDeque<Result<Delivery, TransportError>>,
    connect_calls: usize,
    disconnect_calls: usize,
    last_options: Option<ConnectOptions>,
    publishes: Vec<RecordedPublish>,
    connected: bool,
}

/// Scriptable in-memory [`Transport`].
///
/// Clones share state: keep one clone in the test and hand the other to the
/// publisher. Unscripted connects are accepted and unscripted publishes
/// succeed.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next connect fail locally.
    pub fn fail_next_connect(&self, error: TransportError) {
        self.state().connect_script.push_back(ConnectScript::Fail(error));
    }

    /// Make the next connect answer with a CONNACK reason code.
    pub fn refuse_next_connect(&self, reason_code: u8) {
        self.state()
            .connect_script
            .push_back(ConnectScript::Answer(reason_code));
    }

    /// Make the next connect never complete.
    pub fn hang_next_connect(&self) {
        self.state().connect_script.push_back(ConnectScript::Hang);
    }

    /// Make the next publish fail locally.
    pub fn fail_next_publish(&self, error: TransportError) {
        self.state().publish_script.push_back(Err(error));
    }

    /// Make the next publish come back negatively acknowledged.
    pub fn reject_next_publish(&self, reason_code: u8) {
        self.state()
            .publish_script
            .push_back(Ok(Delivery::Rejected { reason_code }));
    }

    /// Number of connect calls.
    pub fn connect_calls(&self) -> usize {
        self.state().connect_calls
    }

    /// Number of disconnect calls.
    pub fn disconnect_calls(&self) -> usize {
        self.state().disconnect_calls
    }

    /// Every publish handed to the transport, in order.
    pub fn publishes(&self) -> Vec<RecordedPublish> {
        self.state().publishes.clone()
    }

    /// Options of the most recent connect.
    pub fn last_connect_options(&self) -> Option<ConnectOptions> {
        self.state().last_options.clone()
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        _endpoint: &Endpoint,
        _credentials: Option<&Credentials>,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<u8, TransportError>> + Send {
        async move {
            let script = {
                let mut state = self.state();
                state.connect_calls += 1;
                state.last_options = Some(options.clone());
                state.connect_script.pop_front()
            };

            let result = match script {
                None => Ok(0),
                Some(ConnectScript::Answer(code)) => Ok(code),
                Some(ConnectScript::Fail(error)) => Err(error),
                Some(ConnectScript::Hang) => std::future::pending().await,
            };

            if matches!(result, Ok(0)) {
                self.state().connected = true;
            }
            result
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
            let mut state = self.state();
            if !state.connected {
                return Err(TransportError::NotConnected);
            }

            state.publishes.push(RecordedPublish {
                topic: topic.to_string(),
                payload,
                qos,
                retain,
            });
            state.publish_script.pop_front().unwrap_or(Ok(Delivery::Accepted))
        }
    }

    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            let mut state = self.state();
            state.disconnect_calls += 1;
            state.connected = false;
            Ok(())
        }
    }
}
