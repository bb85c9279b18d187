//! The sync protocol controller.
//!
//! Owns the live [`Session`] and drives the whole lifecycle: session
//! load/repair, authentication, transport connection, queue
//! establishment, and delta dispatch. Protocol rules live in the pure
//! msgr-core state machine; this module interprets the actions it
//! produces and performs the actual I/O.
//!
//! ```text
//! Application ← EventBus ← SyncController → AuthApi / SyncTransport
//!                               ↓
//!                      msgr-core (pure state machine)
//! ```

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;
use tokio::sync::watch;

use msgr_core::{decode_frame, Action, DecodedFrame, DeltaEvent, Event, ProtocolState, SyncEvent};
use msgr_types::{
    QueueCreate, QueueResume, Session, QUEUE_CREATE_TOPIC, QUEUE_RESUME_TOPIC, SYNC_TOPIC,
};

use crate::auth::{AuthApi, AuthError};
use crate::bus::{Diagnostic, EventBus};
use crate::device;
use crate::store::{SessionStore, StorageError};
use crate::transport::{SyncTransport, TransportEvent};

/// Fatal controller errors.
///
/// Recoverable conditions (connect, publish, single-frame decode
/// failures) never surface here; they are retried or reported on the
/// event bus.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The login exchange failed. Credentials are not retried.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The session record could not be read or written. Proceeding
    /// with an unpersisted identity or token would corrupt resumption.
    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The state machine halted with a fatal error.
    #[error("protocol halted: {0}")]
    Halted(String),
}

/// Login credentials supplied by the host configuration.
#[derive(Clone)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Handle for requesting controller shutdown from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent; safe to call from any task.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The orchestrating state machine driver.
///
/// One controller instance manages one session and one active
/// connection; reconnects run to completion before another is started.
pub struct SyncController<A: AuthApi, T: SyncTransport> {
    credentials: Credentials,
    store: SessionStore,
    auth: A,
    transport: T,
    bus: EventBus,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<A: AuthApi, T: SyncTransport> SyncController<A, T> {
    /// Create a controller around its collaborators.
    pub fn new(credentials: Credentials, store: SessionStore, auth: A, transport: T) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            credentials,
            store,
            auth,
            transport,
            bus: EventBus::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// The event bus decoded messages and diagnostics are published on.
    ///
    /// Subscribe before calling [`run`](Self::run).
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// A handle that can stop [`run`](Self::run) from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Drive the protocol until shutdown or a fatal error.
    ///
    /// Loads (or initializes and persists) the session, authenticates
    /// if no tokens are held, then loops over transport events,
    /// reconnecting with capped exponential backoff on any recoverable
    /// failure.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let mut session = self.load_or_init_session().await?;
        let mut state = ProtocolState::new();

        let have_tokens = session.tokens.is_some();
        self.dispatch(Event::Start { have_tokens }, &mut state, &mut session)
            .await?;

        let mut shutdown = self.shutdown_rx.clone();
        loop {
            if state.is_stopped() {
                self.bus.close();
                return Ok(());
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("shutdown requested");
                    self.dispatch(Event::Stop, &mut state, &mut session).await?;
                    self.bus.close();
                    return Ok(());
                }
                event = self.transport.next_event() => {
                    match event {
                        Ok(TransportEvent::Connected) => {
                            self.dispatch(Event::TransportConnected, &mut state, &mut session)
                                .await?;
                        }
                        Ok(TransportEvent::Frame { topic, payload }) => {
                            self.handle_frame(&topic, &payload, &mut state, &mut session)
                                .await?;
                        }
                        Ok(TransportEvent::Disconnected { reason }) => {
                            self.dispatch(Event::Disconnected { reason }, &mut state, &mut session)
                                .await?;
                        }
                        Err(err) => {
                            self.dispatch(
                                Event::Disconnected { reason: err.to_string() },
                                &mut state,
                                &mut session,
                            )
                            .await?;
                        }
                    }
                }
            }
        }
    }

    /// Load the persisted session, or create and persist a fresh one.
    ///
    /// The device identity always hits disk before any network call so
    /// a crash between generation and login never loses it.
    async fn load_or_init_session(&self) -> Result<Session, ClientError> {
        if let Some(session) = self.store.load().await? {
            tracing::debug!(device_id = %session.device_id, "loaded persisted session");
            return Ok(session);
        }

        let session = Session::new(device::generate_device_id());
        tracing::info!(device_id = %session.device_id, "generated device identity");
        self.store.save(&session).await?;
        Ok(session)
    }

    /// Feed one event through the state machine, executing resulting
    /// actions and any follow-up events they produce.
    async fn dispatch(
        &self,
        first: Event,
        state: &mut ProtocolState,
        session: &mut Session,
    ) -> Result<(), ClientError> {
        let mut pending = VecDeque::from([first]);
        while let Some(event) = pending.pop_front() {
            tracing::trace!(?event, "protocol event");
            let (next, actions) = std::mem::take(state).on_event(event);
            *state = next;

            for action in actions {
                if let Some(follow_up) = self.perform(action, session).await? {
                    pending.push_back(follow_up);
                }
            }
        }
        Ok(())
    }

    /// Execute one state machine action, returning a follow-up event
    /// where the outcome feeds back into the machine.
    async fn perform(
        &self,
        action: Action,
        session: &mut Session,
    ) -> Result<Option<Event>, ClientError> {
        match action {
            Action::Authenticate => {
                tracing::info!(email = %self.credentials.email, "authenticating");
                match self
                    .auth
                    .authenticate(&self.credentials.email, &self.credentials.password)
                    .await
                {
                    Ok(tokens) => {
                        session.tokens = Some(tokens);
                        Ok(Some(Event::AuthSucceeded))
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "authentication failed");
                        self.bus
                            .publish_event(&Diagnostic::Lifecycle(SyncEvent::AuthFailed {
                                error: err.to_string(),
                            }));
                        Err(ClientError::Auth(err))
                    }
                }
            }

            Action::PersistSession => {
                self.store.save(session).await?;
                Ok(None)
            }

            Action::Connect => match self.transport.connect().await {
                Ok(()) => Ok(None),
                Err(err) => Ok(Some(Event::ConnectFailed {
                    error: err.to_string(),
                })),
            },

            Action::Disconnect => {
                if let Err(err) = self.transport.close().await {
                    tracing::warn!(error = %err, "transport close failed");
                }
                Ok(None)
            }

            Action::QueryCursor => match self.auth.query_sequence_id().await {
                Ok(seq_id) => {
                    tracing::debug!(seq_id, "cursor acquired");
                    Ok(Some(Event::CursorAcquired {
                        seq_id,
                        have_sync_token: session.has_sync_token(),
                    }))
                }
                Err(err) => Ok(Some(Event::CursorQueryFailed {
                    error: err.to_string(),
                })),
            },

            Action::PublishQueueCreate { seq_id } => {
                let user_id = session
                    .tokens
                    .as_ref()
                    .map(|t| t.user_id.as_str())
                    .unwrap_or_default();
                let payload = QueueCreate::new(&seq_id, &session.device_id, user_id);
                self.publish(QUEUE_CREATE_TOPIC, payload.to_bytes()).await
            }

            Action::PublishQueueResume { seq_id } => {
                let Some(token) = session.tokens.as_ref().and_then(|t| t.sync_token.clone())
                else {
                    // Resume is only selected when a token is held;
                    // reaching this means the session changed under us.
                    return Ok(Some(Event::PublishFailed {
                        error: "resume selected without a sync token".into(),
                    }));
                };
                let payload = QueueResume::new(&seq_id, &token);
                self.publish(QUEUE_RESUME_TOPIC, payload.to_bytes()).await
            }

            Action::StartBackoffTimer { delay } => {
                tracing::info!(?delay, "reconnect scheduled");
                let mut shutdown = self.shutdown_rx.clone();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(Some(Event::BackoffElapsed)),
                    _ = shutdown.changed() => Ok(Some(Event::Stop)),
                }
            }

            Action::EmitEvent(event) => {
                self.bus.publish_event(&Diagnostic::Lifecycle(event));
                Ok(None)
            }

            Action::Halt { error } => Err(ClientError::Halted(error)),
        }
    }

    async fn publish(
        &self,
        topic: &str,
        bytes: Result<Vec<u8>, msgr_types::ProtocolError>,
    ) -> Result<Option<Event>, ClientError> {
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(err) => {
                return Ok(Some(Event::PublishFailed {
                    error: err.to_string(),
                }))
            }
        };
        match self.transport.publish(topic, &bytes).await {
            Ok(()) => {
                tracing::debug!(topic, "queue control message published");
                Ok(None)
            }
            Err(err) => Ok(Some(Event::PublishFailed {
                error: err.to_string(),
            })),
        }
    }

    /// Route one inbound frame.
    ///
    /// Only frames on the sync topic are decoded; everything else is
    /// surfaced as a diagnostic. Decode failures are scoped to the
    /// single frame and never disturb the connection.
    async fn handle_frame(
        &self,
        topic: &str,
        payload: &[u8],
        state: &mut ProtocolState,
        session: &mut Session,
    ) -> Result<(), ClientError> {
        if topic != SYNC_TOPIC {
            tracing::debug!(topic, "frame on non-sync topic ignored");
            self.bus.publish_event(&Diagnostic::IgnoredFrame {
                topic: topic.to_string(),
            });
            return Ok(());
        }

        self.dispatch(Event::SyncFrame, state, session).await?;

        match decode_frame(payload) {
            Ok(DecodedFrame::CursorUpdate(token)) => {
                if session.set_sync_token(token) {
                    // The token may only be relied on for Resume once
                    // it has hit disk; a crash before this save falls
                    // back to Create, never a stale Resume.
                    self.store.save(session).await?;
                    tracing::debug!("sync token updated and persisted");
                    self.bus.publish_event(&Diagnostic::CursorUpdated);
                } else {
                    tracing::warn!("cursor update arrived before tokens were established");
                }
            }
            Ok(DecodedFrame::Deltas(events)) => {
                for event in events {
                    match event {
                        DeltaEvent::NewMessage(message) => {
                            tracing::debug!(id = %message.id, thread_id = %message.thread_id, "message");
                            self.bus.publish_message(&message);
                        }
                        // Receipts are recognized but intentionally
                        // not normalized.
                        DeltaEvent::DeliveryReceipt | DeltaEvent::ReadReceipt => {}
                        DeltaEvent::Unrecognized { kind } => {
                            tracing::debug!(kind, "unrecognized delta");
                            self.bus
                                .publish_event(&Diagnostic::UnrecognizedDelta { kind });
                        }
                        DeltaEvent::Malformed { kind, reason } => {
                            tracing::warn!(kind, reason, "malformed delta entry");
                            self.bus
                                .publish_event(&Diagnostic::MalformedDelta { kind, reason });
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "frame failed to decode");
                self.bus.publish_event(&Diagnostic::BadFrame {
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthApi;
    use crate::transport::MockTransport;
    use async_trait::async_trait;
    use msgr_types::{Message, Tokens};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::task::JoinHandle;

    const MESSAGE_FRAME: &[u8] = br#"{"deltas":[{"deltaNewMessage":{"messageMetadata":{"threadKey":{"threadFbId":"42"},"actorFbId":"7","messageId":"m1","timestamp":1000},"body":"hi"}}]}"#;

    struct Harness {
        transport: MockTransport,
        auth: MockAuthApi,
        bus: EventBus,
        store: SessionStore,
        shutdown: ShutdownHandle,
        task: JoinHandle<Result<(), ClientError>>,
        _dir: TempDir,
    }

    impl Harness {
        fn start() -> Self {
            Self::start_with(MockAuthApi::new(), None)
        }

        fn start_with(auth: MockAuthApi, session: Option<Session>) -> Self {
            let dir = tempdir().unwrap();
            let store = SessionStore::new(dir.path().join("session.json"));
            if let Some(session) = session {
                let store = store.clone();
                // Seed the persisted record synchronously before run.
                let contents = serde_json::to_vec(&session).unwrap();
                std::fs::write(store.path(), contents).unwrap();
            }

            let transport = MockTransport::new();
            let mut controller = SyncController::new(
                Credentials::new("a@b.com", "p"),
                store.clone(),
                auth.clone(),
                transport.clone(),
            );
            let bus = controller.bus();
            let shutdown = controller.shutdown_handle();
            let task = tokio::spawn(async move { controller.run().await });

            Self {
                transport,
                auth,
                bus,
                store,
                shutdown,
                task,
                _dir: dir,
            }
        }

        async fn stop(self) -> Result<(), ClientError> {
            self.shutdown.shutdown();
            self.task.await.unwrap()
        }
    }

    /// Let the controller task make progress (current-thread runtime).
    /// Sleeps between yields so work the controller offloads to the
    /// blocking pool (tokio::fs) also gets wall-clock time to finish.
    async fn settle() {
        for _ in 0..100 {
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Advance past any reconnect backoff (cap is 30s + 5s jitter).
    async fn advance_past_backoff() {
        settle().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
    }

    fn resumed_session() -> Session {
        Session {
            device_id: "dev-persisted".into(),
            tokens: Some(Tokens {
                access_token: "at".into(),
                user_id: "100".into(),
                sync_token: Some("T1".into()),
            }),
        }
    }

    // ===========================================
    // Startup and authentication
    // ===========================================

    /// AuthApi wrapper that records whether the session file existed
    /// when authenticate was called.
    struct ProbeAuth {
        inner: MockAuthApi,
        path: PathBuf,
        file_existed_at_auth: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AuthApi for ProbeAuth {
        async fn authenticate(&self, email: &str, password: &str) -> Result<Tokens, AuthError> {
            self.file_existed_at_auth
                .store(self.path.exists(), Ordering::SeqCst);
            self.inner.authenticate(email, password).await
        }

        async fn query_sequence_id(&self) -> Result<String, AuthError> {
            self.inner.query_sequence_id().await
        }
    }

    #[tokio::test]
    async fn identity_is_persisted_before_authentication() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let existed = Arc::new(AtomicBool::new(false));
        let auth = ProbeAuth {
            inner: MockAuthApi::new(),
            path: path.clone(),
            file_existed_at_auth: Arc::clone(&existed),
        };
        let transport = MockTransport::new();
        let mut controller = SyncController::new(
            Credentials::new("a@b.com", "p"),
            SessionStore::new(&path),
            auth,
            transport.clone(),
        );
        let shutdown = controller.shutdown_handle();
        let task = tokio::spawn(async move { controller.run().await });
        settle().await;

        assert!(
            existed.load(Ordering::SeqCst),
            "device identity must hit disk before the login exchange"
        );

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn first_run_authenticates_and_persists_tokens() {
        let h = Harness::start();
        settle().await;

        assert_eq!(h.auth.auth_calls(), vec![("a@b.com".into(), "p".into())]);

        let session = h.store.load().await.unwrap().unwrap();
        let tokens = session.tokens.expect("tokens persisted");
        assert_eq!(tokens.access_token, "mock-access-token");
        assert!(tokens.sync_token.is_none());

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn auth_failure_is_fatal_without_retry() {
        let auth = MockAuthApi::new();
        auth.fail_next_auth(AuthError::InvalidCredentials);
        let h = Harness::start_with(auth.clone(), None);
        settle().await;

        let result = h.task.await.unwrap();
        assert!(matches!(result, Err(ClientError::Auth(AuthError::InvalidCredentials))));
        assert_eq!(auth.auth_calls().len(), 1);
        assert_eq!(h.transport.connect_calls(), 0);
    }

    #[tokio::test]
    async fn persisted_tokens_skip_authentication() {
        let h = Harness::start_with(MockAuthApi::new(), Some(resumed_session()));
        settle().await;

        assert!(h.auth.auth_calls().is_empty());
        assert!(h.transport.is_connected());

        h.stop().await.unwrap();
    }

    // ===========================================
    // Queue establishment
    // ===========================================

    #[tokio::test]
    async fn first_run_publishes_create_with_queried_cursor() {
        let auth = MockAuthApi::new();
        auth.set_seq_id("112233");
        let h = Harness::start_with(auth, None);
        settle().await;

        let (topic, payload) = h.transport.last_published().expect("queue publish");
        assert_eq!(topic, QUEUE_CREATE_TOPIC);

        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["initial_titan_sequence_id"], "112233");
        assert_eq!(json["entity_fbid"], "100000000000001");

        let session = h.store.load().await.unwrap().unwrap();
        assert_eq!(json["device_id"], session.device_id.as_str());

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn persisted_sync_token_publishes_resume() {
        let auth = MockAuthApi::new();
        auth.set_seq_id("445566");
        let h = Harness::start_with(auth, Some(resumed_session()));
        settle().await;

        let (topic, payload) = h.transport.last_published().expect("queue publish");
        assert_eq!(topic, QUEUE_RESUME_TOPIC);

        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["last_seq_id"], "445566");
        assert_eq!(json["sync_token"], "T1");

        h.stop().await.unwrap();
    }

    // ===========================================
    // Frame handling
    // ===========================================

    #[tokio::test]
    async fn message_frames_reach_the_bus() {
        let h = Harness::start();
        let received = Arc::new(Mutex::new(Vec::<Message>::new()));
        {
            let received = Arc::clone(&received);
            h.bus
                .subscribe_messages(move |m| received.lock().unwrap().push(m.clone()));
        }
        settle().await;

        h.transport.queue_frame(SYNC_TOPIC, MESSAGE_FRAME);
        settle().await;

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        let msg = &received[0];
        assert_eq!(msg.id, "m1");
        assert!(msg.is_group);
        assert_eq!(msg.thread_id, "42");
        assert_eq!(msg.author_id, "7");
        assert_eq!(msg.timestamp, 1000);
        assert_eq!(msg.body, "hi");
        assert!(msg.attachments.is_empty());

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn cursor_update_persists_and_emits_no_message() {
        let h = Harness::start();
        let messages = Arc::new(Mutex::new(Vec::<Message>::new()));
        {
            let messages = Arc::clone(&messages);
            h.bus
                .subscribe_messages(move |m| messages.lock().unwrap().push(m.clone()));
        }
        settle().await;

        h.transport.queue_frame(SYNC_TOPIC, br#"{"syncToken":"T9"}"#);
        settle().await;

        assert!(messages.lock().unwrap().is_empty());
        let session = h.store.load().await.unwrap().unwrap();
        assert_eq!(
            session.tokens.unwrap().sync_token.as_deref(),
            Some("T9"),
            "received token must equal the persisted one"
        );

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn non_sync_topics_are_ignored() {
        let h = Harness::start();
        let messages = Arc::new(Mutex::new(0usize));
        let ignored = Arc::new(Mutex::new(Vec::<String>::new()));
        {
            let messages = Arc::clone(&messages);
            h.bus.subscribe_messages(move |_| *messages.lock().unwrap() += 1);
        }
        {
            let ignored = Arc::clone(&ignored);
            h.bus.subscribe_events(move |e| {
                if let Diagnostic::IgnoredFrame { topic } = e {
                    ignored.lock().unwrap().push(topic.clone());
                }
            });
        }
        settle().await;

        h.transport.queue_frame("/orca_presence", MESSAGE_FRAME);
        settle().await;

        assert_eq!(*messages.lock().unwrap(), 0);
        assert_eq!(*ignored.lock().unwrap(), vec!["/orca_presence".to_string()]);

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn bad_frame_does_not_stop_the_stream() {
        let h = Harness::start();
        let messages = Arc::new(Mutex::new(0usize));
        {
            let messages = Arc::clone(&messages);
            h.bus.subscribe_messages(move |_| *messages.lock().unwrap() += 1);
        }
        settle().await;

        h.transport.queue_frame(SYNC_TOPIC, b"garbage");
        h.transport.queue_frame(SYNC_TOPIC, MESSAGE_FRAME);
        settle().await;

        assert_eq!(*messages.lock().unwrap(), 1);

        h.stop().await.unwrap();
    }

    // ===========================================
    // Reconnection
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn connect_failure_retries_with_backoff() {
        let dir = tempdir().unwrap();
        let transport = MockTransport::new();
        transport.fail_next_connect("network unreachable");
        let mut controller = SyncController::new(
            Credentials::new("a@b.com", "p"),
            SessionStore::new(dir.path().join("session.json")),
            MockAuthApi::new(),
            transport.clone(),
        );
        let shutdown = controller.shutdown_handle();
        let task = tokio::spawn(async move { controller.run().await });

        advance_past_backoff().await;

        assert!(transport.connect_calls() >= 2);
        assert!(transport.is_connected());

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_reconnects_in_resume_mode_after_cursor_update() {
        let dir = tempdir().unwrap();
        let auth = MockAuthApi::new();
        auth.set_seq_id("7000");
        let transport = MockTransport::new();
        let mut controller = SyncController::new(
            Credentials::new("a@b.com", "p"),
            SessionStore::new(dir.path().join("session.json")),
            auth.clone(),
            transport.clone(),
        );
        let shutdown = controller.shutdown_handle();
        let task = tokio::spawn(async move { controller.run().await });
        settle().await;

        // First cycle establishes in Create mode.
        let (topic, _) = transport.last_published().unwrap();
        assert_eq!(topic, QUEUE_CREATE_TOPIC);

        // A cursor update arrives, then the connection drops.
        transport.queue_frame(SYNC_TOPIC, br#"{"syncToken":"T1"}"#);
        settle().await;
        transport.queue_disconnect("connection reset");
        advance_past_backoff().await;

        // The reconnect cycle must resume with the persisted token.
        assert!(transport.connect_calls() >= 2);
        assert_eq!(auth.seq_id_queries(), 2);
        let (topic, payload) = transport.last_published().unwrap();
        assert_eq!(topic, QUEUE_RESUME_TOPIC);
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["sync_token"], "T1");
        assert_eq!(json["last_seq_id"], "7000");

        // Tokens were acquired once; never re-authenticated.
        assert_eq!(auth.auth_calls().len(), 1);

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_retries_via_reconnect() {
        let dir = tempdir().unwrap();
        let transport = MockTransport::new();
        transport.fail_next_publish("broken pipe");
        let mut controller = SyncController::new(
            Credentials::new("a@b.com", "p"),
            SessionStore::new(dir.path().join("session.json")),
            MockAuthApi::new(),
            transport.clone(),
        );
        let shutdown = controller.shutdown_handle();
        let task = tokio::spawn(async move { controller.run().await });

        advance_past_backoff().await;

        assert!(transport.connect_calls() >= 2);
        let (topic, _) = transport.last_published().expect("publish retried");
        assert_eq!(topic, QUEUE_CREATE_TOPIC);

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    // ===========================================
    // Shutdown
    // ===========================================

    #[tokio::test]
    async fn shutdown_closes_transport_and_bus() {
        let h = Harness::start();
        settle().await;
        assert!(h.transport.is_connected());

        let bus = h.bus.clone();
        let transport = h.transport.clone();
        h.stop().await.unwrap();

        assert!(!transport.is_connected());

        // The bus is closed: nothing is dispatched anymore.
        let count = Arc::new(Mutex::new(0usize));
        {
            let count = Arc::clone(&count);
            bus.subscribe_messages(move |_| *count.lock().unwrap() += 1);
        }
        bus.publish_message(&Message::new(
            "m1",
            msgr_types::ThreadKey::Group("1".into()),
            "7",
            0,
            "",
        ));
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn credentials_debug_redacts_password() {
        let creds = Credentials::new("a@b.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("a@b.com"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
