//! Streaming pub/sub transport abstraction (external collaborator).
//!
//! The underlying connection, wire framing, and topic plumbing are
//! assumed to already exist as a connected, ordered, reliable pub/sub
//! channel. This module only fixes the interface: connect, publish,
//! and an ordered event stream consumed from a single loop.
//!
//! # Ordering
//!
//! `next_event` yields `Connected` once per successful connection and
//! every inbound `Frame` in strict per-connection arrival order. No
//! ordering is guaranteed across reconnections; a new connection starts
//! a fresh ordered stream.

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// A publish failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The connection was closed.
    #[error("connection closed")]
    Closed,
}

/// An occurrence delivered by the transport's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection attempt completed; the stream is live.
    Connected,
    /// An inbound message on some topic.
    Frame {
        /// The topic the message arrived on.
        topic: String,
        /// The raw payload, framing bytes included.
        payload: Vec<u8>,
    },
    /// The connection was lost.
    Disconnected {
        /// Reason for the loss.
        reason: String,
    },
}

/// The streaming pub/sub transport.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Establish the streaming connection.
    ///
    /// On success a [`TransportEvent::Connected`] is delivered through
    /// the event stream.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Publish a payload on a topic.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Receive the next transport event.
    ///
    /// Waits until an event is available. The controller calls this
    /// from a single loop, which is what guarantees frames of one
    /// connection are never processed concurrently.
    async fn next_event(&self) -> Result<TransportEvent, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}
