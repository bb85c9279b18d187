//! Configuration management for msgr.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Login configuration stored locally.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl AppConfig {
    /// Load the configuration from a file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.with_context(|| {
            format!(
                "No configuration at {}. Create it with {{\"email\": \"...\", \"password\": \"...\"}}",
                path.display()
            )
        })?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid configuration at {}", path.display()))
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_a_valid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, br#"{"email": "a@b.com", "password": "secret"}"#)
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.email, "a@b.com");
        assert_eq!(config.password, "secret");
    }

    #[tokio::test]
    async fn missing_config_mentions_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let err = AppConfig::load(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("config.json"));
    }

    #[tokio::test]
    async fn malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        assert!(AppConfig::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn debug_output_redacts_password() {
        let config = AppConfig {
            email: "a@b.com".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
