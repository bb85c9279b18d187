//! Protocol state machine for the sync connection lifecycle.
//!
//! This module provides a pure, side-effect-free state machine driving
//! credential acquisition, queue creation/resumption, and reconnection.
//! The machine takes events as input and produces a new state plus a
//! list of actions to execute.
//!
//! The actual I/O (authenticating, connecting, publishing control
//! messages) is performed by msgr-client, not by this module. This
//! enables instant unit testing without network mocks.

use std::time::Duration;

use msgr_types::QueueMode;

/// Connection/queue lifecycle state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolState {
    /// Nothing started yet.
    Idle,
    /// Login exchange in flight.
    Authenticating,
    /// Transport connection in flight.
    Connecting {
        /// How many consecutive failed attempts preceded this one.
        attempt: u32,
    },
    /// Connected; the out-of-band cursor query is in flight.
    AwaitingCursor,
    /// Queue control message published; first sync frame not seen yet.
    EstablishingQueue {
        /// Create or resume, decided from the held resumption token.
        mode: QueueMode,
        /// The cursor the queue was established against.
        seq_id: String,
    },
    /// Deltas are flowing.
    Streaming {
        /// The mode this connection's queue was established with.
        mode: QueueMode,
        /// The cursor the queue was established against.
        seq_id: String,
    },
    /// Waiting out a reconnect delay.
    Backoff {
        /// Number of consecutive failures so far.
        attempt: u32,
    },
    /// Halted; no further transitions.
    Stopped,
}

impl ProtocolState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller
    /// (msgr-client) is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Idle: authenticate first iff no tokens are held.
            (Self::Idle, Event::Start { have_tokens: false }) => {
                (Self::Authenticating, vec![Action::Authenticate])
            }
            (Self::Idle, Event::Start { have_tokens: true }) => {
                (Self::Connecting { attempt: 0 }, vec![Action::Connect])
            }

            // From Authenticating. Tokens must be persisted before any
            // further progress.
            (Self::Authenticating, Event::AuthSucceeded) => (
                Self::Connecting { attempt: 0 },
                vec![Action::PersistSession, Action::Connect],
            ),
            (Self::Authenticating, Event::AuthFailed { error }) => (
                Self::Stopped,
                vec![
                    Action::EmitEvent(SyncEvent::AuthFailed {
                        error: error.clone(),
                    }),
                    Action::Halt { error },
                ],
            ),

            // From Connecting
            (Self::Connecting { .. }, Event::TransportConnected) => (
                Self::AwaitingCursor,
                vec![Action::EmitEvent(SyncEvent::Connected), Action::QueryCursor],
            ),
            (Self::Connecting { attempt }, Event::ConnectFailed { error }) => {
                let next_attempt = attempt.saturating_add(1);
                (
                    Self::Backoff {
                        attempt: next_attempt,
                    },
                    vec![
                        Action::EmitEvent(SyncEvent::ConnectionFailed { error }),
                        Action::StartBackoffTimer {
                            delay: reconnect_backoff(next_attempt),
                        },
                    ],
                )
            }

            // From AwaitingCursor. Mode selection happens here, on
            // every cycle: Create iff no resumption token is held.
            (
                Self::AwaitingCursor,
                Event::CursorAcquired {
                    seq_id,
                    have_sync_token,
                },
            ) => {
                let mode = if have_sync_token {
                    QueueMode::Resume
                } else {
                    QueueMode::Create
                };
                let publish = match mode {
                    QueueMode::Create => Action::PublishQueueCreate {
                        seq_id: seq_id.clone(),
                    },
                    QueueMode::Resume => Action::PublishQueueResume {
                        seq_id: seq_id.clone(),
                    },
                };
                (
                    Self::EstablishingQueue {
                        mode,
                        seq_id: seq_id.clone(),
                    },
                    vec![
                        Action::EmitEvent(SyncEvent::QueueEstablishing { mode, seq_id }),
                        publish,
                    ],
                )
            }
            (Self::AwaitingCursor, Event::CursorQueryFailed { error }) => (
                Self::Backoff { attempt: 1 },
                vec![
                    Action::EmitEvent(SyncEvent::ConnectionFailed { error }),
                    Action::Disconnect,
                    Action::StartBackoffTimer {
                        delay: reconnect_backoff(1),
                    },
                ],
            ),

            // From EstablishingQueue: no acknowledgment frame exists;
            // the first sync frame means the queue is live.
            (Self::EstablishingQueue { mode, seq_id }, Event::SyncFrame) => {
                (Self::Streaming { mode, seq_id }, vec![])
            }
            (Self::EstablishingQueue { .. }, Event::PublishFailed { error }) => (
                Self::Backoff { attempt: 1 },
                vec![
                    Action::EmitEvent(SyncEvent::ConnectionFailed { error }),
                    Action::Disconnect,
                    Action::StartBackoffTimer {
                        delay: reconnect_backoff(1),
                    },
                ],
            ),

            // Disconnection anywhere past Connecting re-enters the
            // connect sequence, preserving session and tokens.
            (
                Self::Connecting { .. }
                | Self::AwaitingCursor
                | Self::EstablishingQueue { .. }
                | Self::Streaming { .. },
                Event::Disconnected { reason },
            ) => (
                Self::Backoff { attempt: 1 },
                vec![
                    Action::EmitEvent(SyncEvent::Disconnected { reason }),
                    Action::StartBackoffTimer {
                        delay: reconnect_backoff(1),
                    },
                ],
            ),

            // From Backoff
            (Self::Backoff { attempt }, Event::BackoffElapsed) => {
                (Self::Connecting { attempt }, vec![Action::Connect])
            }

            // Shutdown from anywhere.
            (_, Event::Stop) => (Self::Stopped, vec![Action::Disconnect]),

            // Invalid transitions - stay in current state.
            (state, _) => (state, vec![]),
        }
    }

    /// Whether deltas are currently flowing.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// Whether the machine has halted.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the sync lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The controller was started.
    Start {
        /// Whether credential tokens are already held.
        have_tokens: bool,
    },
    /// The login exchange returned tokens.
    AuthSucceeded,
    /// The login exchange failed. Fatal; credentials are not retried.
    AuthFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The transport reported its connected event.
    TransportConnected,
    /// The transport connect call failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The out-of-band cursor query returned a sequence id.
    CursorAcquired {
        /// The queried cursor.
        seq_id: String,
        /// Whether a resumption token is held right now.
        have_sync_token: bool,
    },
    /// The out-of-band cursor query failed.
    CursorQueryFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// A queue control publish failed.
    PublishFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// A frame arrived on the sync topic.
    SyncFrame,
    /// The connection was lost.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// The reconnect delay elapsed.
    BackoffElapsed,
    /// Shutdown was requested.
    Stop,
}

/// Actions to be executed by msgr-client.
///
/// These are instructions, not side effects. The client interprets
/// them and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run the login exchange.
    Authenticate,
    /// Persist the in-memory session record.
    PersistSession,
    /// Initiate the transport connection.
    Connect,
    /// Close the transport connection.
    Disconnect,
    /// Issue the out-of-band cursor query.
    QueryCursor,
    /// Publish a queue-create control message.
    PublishQueueCreate {
        /// The cursor to create the queue from.
        seq_id: String,
    },
    /// Publish a queue-resume control message.
    PublishQueueResume {
        /// The cursor to resume the queue from.
        seq_id: String,
    },
    /// Sleep before the next connection attempt.
    StartBackoffTimer {
        /// Delay before attempting reconnection.
        delay: Duration,
    },
    /// Emit a lifecycle event to the application.
    EmitEvent(SyncEvent),
    /// Halt with a fatal error.
    Halt {
        /// Error message describing the failure.
        error: String,
    },
}

/// Lifecycle events surfaced to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The transport connected.
    Connected,
    /// A queue control message is being published.
    QueueEstablishing {
        /// Create or resume.
        mode: QueueMode,
        /// The cursor the queue is established against.
        seq_id: String,
    },
    /// A connect, cursor query, or publish failed; a retry is scheduled.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The connection was lost; a retry is scheduled.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// The login exchange failed; the controller halts.
    AuthFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Calculate the reconnect delay with jitter.
///
/// Exponential backoff with random jitter to avoid hot-looping against
/// the remote service and to spread simultaneous reconnects.
///
/// Formula: min(2^attempt seconds, 30s) + random(0..5000ms)
fn reconnect_backoff(attempt: u32) -> Duration {
    let base_secs = 2u64.pow(attempt.min(5)).min(30);
    let base = Duration::from_secs(base_secs);

    let jitter = Duration::from_millis(random_jitter_ms());
    base + jitter
}

/// Generate random jitter between 0 and 5000 milliseconds.
fn random_jitter_ms() -> u64 {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes).expect("getrandom failed");
    u64::from_le_bytes(bytes) % 5001
}
