//! Delta decoding: raw sync frames to normalized events.
//!
//! An inbound frame on the sync topic is JSON, possibly prefixed with a
//! single non-printable framing byte. It carries either a cursor update
//! (a new resumption token) or an ordered batch of deltas. Each delta
//! entry is decoded independently so one malformed entry never poisons
//! its siblings.

use serde::Deserialize;

use msgr_types::{Message, ProtocolError, ThreadKey};

/// Delta tag for a new message.
const DELTA_NEW_MESSAGE: &str = "deltaNewMessage";
/// Delta tag for a delivery receipt (recognized, not normalized).
const DELTA_DELIVERY_RECEIPT: &str = "deltaDeliveryReceipt";
/// Delta tag for a read receipt (recognized, not normalized).
const DELTA_READ_RECEIPT: &str = "deltaReadReceipt";

/// A fully decoded sync frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    /// The frame carried a new resumption token. Never produces
    /// message events, even if other fields are present.
    CursorUpdate(String),
    /// The frame carried a (possibly empty) batch of deltas.
    Deltas(Vec<DeltaEvent>),
}

/// One decoded delta entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    /// A new message, normalized.
    NewMessage(Message),
    /// A delivery receipt. Recognized but intentionally not normalized.
    DeliveryReceipt,
    /// A read receipt. Recognized but intentionally not normalized.
    ReadReceipt,
    /// A delta tag this client does not know.
    Unrecognized {
        /// The unknown tag.
        kind: String,
    },
    /// A recognized tag whose contents were unusable.
    Malformed {
        /// The delta tag.
        kind: String,
        /// What was wrong with the entry.
        reason: String,
    },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "syncToken")]
    sync_token: Option<String>,
    deltas: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNewMessage {
    message_metadata: RawMetadata,
    body: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    thread_key: RawThreadKey,
    actor_fb_id: IdValue,
    message_id: String,
    timestamp: IdValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawThreadKey {
    thread_fb_id: Option<IdValue>,
    other_user_fb_id: Option<IdValue>,
}

/// Identifiers and timestamps arrive as JSON strings or numbers
/// depending on the server code path; both are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(i64),
}

impl IdValue {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Text(s) => s.parse().ok(),
            Self::Number(n) => Some(*n),
        }
    }
}

impl RawThreadKey {
    /// Enforce the mutual-exclusivity invariant of the thread union.
    fn into_thread_key(self) -> Result<ThreadKey, ProtocolError> {
        match (self.thread_fb_id, self.other_user_fb_id) {
            (Some(group), None) => Ok(ThreadKey::Group(group.into_string())),
            (None, Some(other)) => Ok(ThreadKey::OneToOne(other.into_string())),
            _ => Err(ProtocolError::AmbiguousThreadKey),
        }
    }
}

/// Decode one inbound sync frame.
///
/// Strips the optional leading framing byte, parses the JSON payload,
/// and classifies it as a cursor update or a delta batch. Failure to
/// parse the frame itself is a [`ProtocolError`] scoped to this frame;
/// failures inside individual delta entries are reported per entry.
pub fn decode_frame(payload: &[u8]) -> Result<DecodedFrame, ProtocolError> {
    let payload = strip_framing_byte(payload);
    let frame: RawFrame =
        serde_json::from_slice(payload).map_err(ProtocolError::MalformedFrame)?;

    if let Some(token) = frame.sync_token {
        return Ok(DecodedFrame::CursorUpdate(token));
    }

    let entries = frame.deltas.unwrap_or_default();
    let events = entries.into_iter().map(decode_delta).collect();
    Ok(DecodedFrame::Deltas(events))
}

/// Strip a single leading non-printable framing byte, if present.
fn strip_framing_byte(payload: &[u8]) -> &[u8] {
    match payload.first() {
        Some(&b) if b < 0x20 && !b.is_ascii_whitespace() => &payload[1..],
        _ => payload,
    }
}

/// Decode one delta entry by its tag. Never fails: unusable entries
/// become [`DeltaEvent::Malformed`] so sibling deltas keep flowing.
fn decode_delta(entry: serde_json::Value) -> DeltaEvent {
    let object = match entry {
        serde_json::Value::Object(map) => map,
        _ => {
            return DeltaEvent::Malformed {
                kind: "<unknown>".into(),
                reason: "delta entry is not an object".into(),
            }
        }
    };

    let (kind, body) = match object.into_iter().next() {
        Some(pair) => pair,
        None => {
            return DeltaEvent::Malformed {
                kind: "<unknown>".into(),
                reason: "delta entry is empty".into(),
            }
        }
    };

    match kind.as_str() {
        DELTA_NEW_MESSAGE => match decode_new_message(body) {
            Ok(message) => DeltaEvent::NewMessage(message),
            Err(err) => DeltaEvent::Malformed {
                kind,
                reason: err.to_string(),
            },
        },
        DELTA_DELIVERY_RECEIPT => DeltaEvent::DeliveryReceipt,
        DELTA_READ_RECEIPT => DeltaEvent::ReadReceipt,
        _ => DeltaEvent::Unrecognized { kind },
    }
}

fn decode_new_message(body: serde_json::Value) -> Result<Message, ProtocolError> {
    let raw: RawNewMessage =
        serde_json::from_value(body).map_err(|e| ProtocolError::MalformedDelta {
            kind: DELTA_NEW_MESSAGE.into(),
            reason: e.to_string(),
        })?;

    let meta = raw.message_metadata;
    let thread = meta.thread_key.into_thread_key()?;
    let timestamp = meta
        .timestamp
        .as_i64()
        .ok_or_else(|| ProtocolError::MalformedDelta {
            kind: DELTA_NEW_MESSAGE.into(),
            reason: "timestamp is not numeric".into(),
        })?;

    Ok(Message::new(
        meta.message_id,
        thread,
        meta.actor_fb_id.into_string(),
        timestamp,
        raw.body.unwrap_or_default(),
    ))
}
