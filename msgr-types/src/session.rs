//! The persisted session record.

use serde::{Deserialize, Serialize};

/// Credential tokens acquired through the login exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token used by the authenticated request layer.
    pub access_token: String,
    /// The account identifier the tokens belong to.
    pub user_id: String,
    /// Queue resumption token. Absent until the first cursor-update
    /// frame arrives; monotonically replaced afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
}

/// The session record: device identity plus optional credentials.
///
/// The device identifier is generated at most once per installation and
/// persisted before any authentication attempt, so a crash between
/// generation and login never loses the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable opaque device identifier.
    pub device_id: String,
    /// Credentials, once acquired. `None` before the first login.
    pub tokens: Option<Tokens>,
}

impl Session {
    /// Create a fresh session around a newly generated device identity.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            tokens: None,
        }
    }

    /// Whether a resumption token is currently held.
    pub fn has_sync_token(&self) -> bool {
        self.tokens
            .as_ref()
            .map(|t| t.sync_token.is_some())
            .unwrap_or(false)
    }

    /// Replace the resumption token.
    ///
    /// Returns `false` (without storing anything) when no tokens are
    /// held yet; cursor updates are only meaningful post-login.
    pub fn set_sync_token(&mut self, token: String) -> bool {
        match self.tokens.as_mut() {
            Some(tokens) => {
                tokens.sync_token = Some(token);
                true
            }
            None => false,
        }
    }
}
