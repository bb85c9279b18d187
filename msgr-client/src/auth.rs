//! The authenticated request layer (external collaborator).
//!
//! The login exchange and the out-of-band cursor query live behind the
//! [`AuthApi`] trait; the real HTTP implementation is supplied by the
//! host. [`MockAuthApi`] records calls and replays canned responses for
//! tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use msgr_types::Tokens;

/// Errors from the login exchange or out-of-band queries.
///
/// All variants are fatal to the current login attempt; credentials are
/// never automatically resubmitted.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The service rejected the credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The service demands an interactive verification step this
    /// client cannot complete.
    #[error("additional verification required")]
    ChallengeRequired,

    /// The exchange failed at the network level.
    #[error("network failure during login: {0}")]
    Network(String),
}

/// The authenticated request layer.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange user credentials for access tokens.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Tokens, AuthError>;

    /// Query the current sequence cursor for the account.
    ///
    /// Issued once per transport connection, after the connected event.
    async fn query_sequence_id(&self) -> Result<String, AuthError>;
}

/// Mock auth layer for testing.
///
/// Records authenticate/query calls and replays configured responses.
#[derive(Debug, Default)]
pub struct MockAuthApi {
    inner: Arc<Mutex<MockAuthInner>>,
}

#[derive(Debug)]
struct MockAuthInner {
    tokens: Tokens,
    seq_id: String,
    auth_calls: Vec<(String, String)>,
    seq_id_queries: u32,
    fail_next_auth: Option<AuthError>,
    fail_next_query: bool,
}

impl Default for MockAuthInner {
    fn default() -> Self {
        Self {
            tokens: Tokens {
                access_token: "mock-access-token".into(),
                user_id: "100000000000001".into(),
                sync_token: None,
            },
            seq_id: "1".into(),
            auth_calls: Vec::new(),
            seq_id_queries: 0,
            fail_next_auth: None,
            fail_next_query: false,
        }
    }
}

impl MockAuthApi {
    /// Create a mock with default canned responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tokens returned by `authenticate`.
    pub fn set_tokens(&self, tokens: Tokens) {
        self.inner.lock().unwrap().tokens = tokens;
    }

    /// Set the sequence id returned by `query_sequence_id`.
    pub fn set_seq_id(&self, seq_id: &str) {
        self.inner.lock().unwrap().seq_id = seq_id.to_string();
    }

    /// Cause the next `authenticate` call to fail with the given error.
    pub fn fail_next_auth(&self, error: AuthError) {
        self.inner.lock().unwrap().fail_next_auth = Some(error);
    }

    /// Cause the next `query_sequence_id` call to fail.
    pub fn fail_next_query(&self) {
        self.inner.lock().unwrap().fail_next_query = true;
    }

    /// Credentials passed to `authenticate`, in call order.
    pub fn auth_calls(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().auth_calls.clone()
    }

    /// How many times `query_sequence_id` was called.
    pub fn seq_id_queries(&self) -> u32 {
        self.inner.lock().unwrap().seq_id_queries
    }
}

impl Clone for MockAuthApi {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Tokens, AuthError> {
        let mut inner = self.inner.lock().unwrap();
        inner.auth_calls.push((email.to_string(), password.to_string()));

        if let Some(error) = inner.fail_next_auth.take() {
            return Err(error);
        }

        Ok(inner.tokens.clone())
    }

    async fn query_sequence_id(&self) -> Result<String, AuthError> {
        let mut inner = self.inner.lock().unwrap();
        inner.seq_id_queries += 1;

        if inner.fail_next_query {
            inner.fail_next_query = false;
            return Err(AuthError::Network("mock query failure".into()));
        }

        Ok(inner.seq_id.clone())
    }
}
