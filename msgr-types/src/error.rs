//! Wire-level error types.

use thiserror::Error;

/// Errors raised while encoding or decoding protocol payloads.
///
/// A `ProtocolError` is always scoped to a single frame or payload; it
/// never invalidates the connection or the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An inbound frame failed to parse as JSON.
    #[error("frame is not valid JSON: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// An outbound payload failed to serialize.
    #[error("payload serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A delta entry was recognized but its contents were unusable.
    #[error("malformed {kind} delta: {reason}")]
    MalformedDelta {
        /// The delta tag (e.g. `deltaNewMessage`).
        kind: String,
        /// What was wrong with the entry.
        reason: String,
    },

    /// The thread union carried both identifiers, or neither.
    #[error("thread key must carry exactly one of the group or other-party identifiers")]
    AmbiguousThreadKey,
}
