//! Outbound queue control payloads and protocol constants.
//!
//! These are the two control messages published after each transport
//! connection: a queue-create when no resumption token is held, or a
//! queue-resume carrying the prior token. Field names and the fixed
//! parameter values are dictated by the remote service.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Topic carrying inbound sync frames.
pub const SYNC_TOPIC: &str = "/t_ms";
/// Topic for queue-create control messages.
pub const QUEUE_CREATE_TOPIC: &str = "/messenger_sync_create_queue";
/// Topic for queue-resume control messages.
pub const QUEUE_RESUME_TOPIC: &str = "/messenger_sync_get_diffs";

/// Number of deltas the server batches per frame.
pub const DELTA_BATCH_SIZE: u32 = 125;
/// Upper bound on deltas the client declares it can process.
pub const MAX_DELTAS_ABLE_TO_PROCESS: u32 = 1250;
/// Sync protocol revision spoken by this client.
pub const SYNC_API_VERSION: u32 = 3;
/// Payload encoding declared to the server.
pub const ENCODING: &str = "JSON";

const XMA_QUERY_ID: &str = "10153919431161729";

/// How the sync queue is established for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueMode {
    /// Fresh queue from the queried cursor; no resumption token held.
    Create,
    /// Resume a prior queue using the held resumption token.
    Resume,
}

/// Feed-selection parameters carried in the create payload.
///
/// Opaque to this client; the values are fixed by the service and
/// forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueParams {
    /// Service flag, stringly typed on the wire.
    pub buzz_on_deltas_enabled: String,
    /// GraphQL query hashes for attachment rendering.
    pub graphql_query_hashes: QueryHashes,
    /// Per-hash query parameters, keyed by query id.
    pub graphql_query_params: serde_json::Value,
}

/// GraphQL query hashes referenced by [`QueueParams`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHashes {
    /// Query id for XMA (share attachment) rendering.
    pub xma_query_id: String,
}

impl Default for QueueParams {
    fn default() -> Self {
        Self {
            buzz_on_deltas_enabled: "false".to_string(),
            graphql_query_hashes: QueryHashes {
                xma_query_id: XMA_QUERY_ID.to_string(),
            },
            graphql_query_params: serde_json::json!({
                XMA_QUERY_ID: { "xma_id": "<ID>" }
            }),
        }
    }
}

/// Payload published on [`QUEUE_CREATE_TOPIC`] when no resumption token
/// is held at connection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueCreate {
    /// See [`DELTA_BATCH_SIZE`].
    pub delta_batch_size: u32,
    /// See [`MAX_DELTAS_ABLE_TO_PROCESS`].
    pub max_deltas_able_to_process: u32,
    /// See [`SYNC_API_VERSION`].
    pub sync_api_version: u32,
    /// See [`ENCODING`].
    pub encoding: String,
    /// The cursor queried after connecting.
    pub initial_titan_sequence_id: String,
    /// This installation's device identifier.
    pub device_id: String,
    /// The account the queue belongs to.
    pub entity_fbid: String,
    /// Fixed feed-selection parameters.
    pub queue_params: QueueParams,
}

impl QueueCreate {
    /// Assemble a create payload for the given cursor and identity.
    pub fn new(seq_id: &str, device_id: &str, user_id: &str) -> Self {
        Self {
            delta_batch_size: DELTA_BATCH_SIZE,
            max_deltas_able_to_process: MAX_DELTAS_ABLE_TO_PROCESS,
            sync_api_version: SYNC_API_VERSION,
            encoding: ENCODING.to_string(),
            initial_titan_sequence_id: seq_id.to_string(),
            device_id: device_id.to_string(),
            entity_fbid: user_id.to_string(),
            queue_params: QueueParams::default(),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Serialization)
    }
}

/// Payload published on [`QUEUE_RESUME_TOPIC`] when a resumption token
/// is held at connection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueResume {
    /// See [`DELTA_BATCH_SIZE`].
    pub delta_batch_size: u32,
    /// See [`MAX_DELTAS_ABLE_TO_PROCESS`].
    pub max_deltas_able_to_process: u32,
    /// See [`SYNC_API_VERSION`].
    pub sync_api_version: u32,
    /// See [`ENCODING`].
    pub encoding: String,
    /// The cursor queried after connecting.
    pub last_seq_id: String,
    /// The held resumption token.
    pub sync_token: String,
}

impl QueueResume {
    /// Assemble a resume payload for the given cursor and token.
    pub fn new(seq_id: &str, sync_token: &str) -> Self {
        Self {
            delta_batch_size: DELTA_BATCH_SIZE,
            max_deltas_able_to_process: MAX_DELTAS_ABLE_TO_PROCESS,
            sync_api_version: SYNC_API_VERSION,
            encoding: ENCODING.to_string(),
            last_seq_id: seq_id.to_string(),
            sync_token: sync_token.to_string(),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Serialization)
    }
}
