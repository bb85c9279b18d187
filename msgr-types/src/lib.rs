//! # msgr-types
//!
//! Shared wire and data types for the msgr delta-sync protocol client:
//! - [`Session`], [`Tokens`] - the persisted credential/identity record
//! - [`Message`], [`ThreadKey`] - the normalized message model
//! - [`QueueCreate`], [`QueueResume`] - outbound queue control payloads
//! - [`ProtocolError`] - wire-level error type

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod message;
mod session;
mod wire;

pub use error::ProtocolError;
pub use message::{Attachment, Message, ThreadKey};
pub use session::{Session, Tokens};
pub use wire::{
    QueryHashes, QueueCreate, QueueMode, QueueParams, QueueResume, DELTA_BATCH_SIZE, ENCODING,
    MAX_DELTAS_ABLE_TO_PROCESS, QUEUE_CREATE_TOPIC, QUEUE_RESUME_TOPIC, SYNC_API_VERSION,
    SYNC_TOPIC,
};
