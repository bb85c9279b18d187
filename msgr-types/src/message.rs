//! The normalized message model.

use serde::{Deserialize, Serialize};

/// The mutually exclusive pair of identifiers distinguishing a group
/// conversation from a one-to-one conversation.
///
/// The raw wire payload carries this as two optional fields of which
/// exactly one is present; modeling it as a tagged variant makes the
/// exclusivity invariant explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadKey {
    /// A group-thread identifier.
    Group(String),
    /// The other party's identifier in a one-to-one conversation.
    OneToOne(String),
}

impl ThreadKey {
    /// Whether this key designates a group conversation.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// The thread identifier, whichever side of the union it came from.
    pub fn thread_id(&self) -> &str {
        match self {
            Self::Group(id) | Self::OneToOne(id) => id,
        }
    }
}

/// A message attachment.
///
/// Attachment transfer is not part of this protocol surface yet, so
/// there are no constructible variants; [`Message::attachments`] is
/// always empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attachment {}

/// A normalized message, derived from a raw new-message delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned message identifier.
    pub id: String,
    /// Identifier of the conversation the message belongs to.
    pub thread_id: String,
    /// Whether the conversation is a group thread.
    pub is_group: bool,
    /// Identifier of the sender.
    pub author_id: String,
    /// Server timestamp, milliseconds.
    pub timestamp: i64,
    /// Message text. Empty when the delta carried no body.
    pub body: String,
    /// Always empty; placeholder for future attachment support.
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Build a message from decoded delta fields.
    pub fn new(
        id: impl Into<String>,
        thread: ThreadKey,
        author_id: impl Into<String>,
        timestamp: i64,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            is_group: thread.is_group(),
            thread_id: thread.thread_id().to_string(),
            author_id: author_id.into(),
            timestamp,
            body: body.into(),
            attachments: Vec::new(),
        }
    }
}
