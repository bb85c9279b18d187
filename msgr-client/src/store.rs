//! Persistent session storage.
//!
//! One JSON file holding the [`Session`] record. Writes go through a
//! temporary file followed by an atomic rename so a failed write never
//! truncates an existing record; losing the device identity or the
//! resumption token would corrupt queue resumption.

use std::path::{Path, PathBuf};

use thiserror::Error;

use msgr_types::Session;

/// Errors raised by the session store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record exists but could not be read.
    #[error("failed to read session record: {0}")]
    Read(#[source] std::io::Error),

    /// The record could not be written.
    #[error("failed to write session record: {0}")]
    Write(#[source] std::io::Error),

    /// The record exists but is not a valid session. Deliberately not
    /// treated as absence: silently discarding a corrupt record would
    /// regenerate the device identity.
    #[error("session record is malformed: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The in-memory session failed to serialize.
    #[error("failed to encode session record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// File-backed store for the persisted [`Session`] record.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session. A missing file is `Ok(None)`;
    /// unreadable or malformed data is an error.
    pub async fn load(&self) -> Result<Option<Session>, StorageError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Read(err)),
        };
        let session = serde_json::from_slice(&contents).map_err(StorageError::Malformed)?;
        Ok(Some(session))
    }

    /// Persist the session with write-then-rename semantics.
    pub async fn save(&self, session: &Session) -> Result<(), StorageError> {
        let contents =
            serde_json::to_vec_pretty(session).map_err(StorageError::Encode)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &contents)
            .await
            .map_err(StorageError::Write)?;
        set_file_permissions_0600(&tmp).await?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(StorageError::Write)?;
        Ok(())
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(StorageError::Write)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
