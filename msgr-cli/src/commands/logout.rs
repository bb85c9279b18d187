//! Discard the persisted session.

use anyhow::{Context, Result};
use std::path::Path;

/// Run the logout command.
///
/// Removes the session record; the next run generates a fresh device
/// identity and logs in again.
pub async fn run(data_dir: &Path) -> Result<()> {
    let path = data_dir.join("session.json");
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            println!("Session removed.");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            println!("No session to remove.");
            Ok(())
        }
        Err(err) => Err(err).context("Failed to remove session record"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn logout_without_session_succeeds() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn logout_removes_the_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{}").await.unwrap();

        run(dir.path()).await.unwrap();
        assert!(!path.exists());
    }
}
