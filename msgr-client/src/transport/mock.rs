//! Mock transport for testing.
//!
//! Queues events for the controller to consume and captures published
//! control messages for verification.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{SyncTransport, TransportError, TransportEvent};

/// Mock transport for testing.
///
/// `connect()` delivers a [`TransportEvent::Connected`] through the
/// event stream, as the contract requires. Frames and disconnects are
/// queued explicitly; `next_event` waits when the queue is empty.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    notify: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connect_calls: u32,
    events: VecDeque<TransportEvent>,
    published: Vec<(String, Vec<u8>)>,
    fail_next_connect: Option<String>,
    fail_next_publish: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound frame for the event stream.
    pub fn queue_frame(&self, topic: &str, payload: &[u8]) {
        self.push_event(TransportEvent::Frame {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Queue a disconnection for the event stream.
    pub fn queue_disconnect(&self, reason: &str) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.connected = false;
            inner.events.push_back(TransportEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
        self.notify.notify_one();
    }

    /// All published (topic, payload) pairs, in publish order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.lock().unwrap().published.clone()
    }

    /// The most recent published (topic, payload) pair.
    pub fn last_published(&self) -> Option<(String, Vec<u8>)> {
        self.inner.lock().unwrap().published.last().cloned()
    }

    /// How many times `connect` was called.
    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().unwrap().connect_calls
    }

    /// Cause the next `connect()` to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next `publish()` to fail with the given error.
    pub fn fail_next_publish(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_publish = Some(error.to_string());
    }

    fn push_event(&self, event: TransportEvent) {
        self.inner.lock().unwrap().events.push_back(event);
        self.notify.notify_one();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
        }
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.connect_calls += 1;

            if let Some(error) = inner.fail_next_connect.take() {
                return Err(TransportError::ConnectionFailed(error));
            }

            inner.connected = true;
            inner.events.push_back(TransportEvent::Connected);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_publish.take() {
            return Err(TransportError::PublishFailed(error));
        }

        inner.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn next_event(&self) -> Result<TransportEvent, TransportError> {
        loop {
            let notified = self.notify.notified();
            if let Some(event) = self.inner.lock().unwrap().events.pop_front() {
                return Ok(event);
            }
            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.lock().unwrap().connected = false;
        Ok(())
    }
}
