//! Show session status.

use anyhow::Result;
use std::path::Path;

use msgr_client::SessionStore;

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== msgr status ===");
    println!();

    let store = SessionStore::new(data_dir.join("session.json"));
    let session = match store.load().await? {
        Some(session) => session,
        None => {
            println!("Session: NONE");
            println!();
            println!("Run 'msgr run' to log in and start syncing.");
            return Ok(());
        }
    };

    println!("Device:");
    println!("  ID: {}", session.device_id);
    println!();

    match &session.tokens {
        Some(tokens) => {
            println!("Account:");
            println!("  User:       {}", tokens.user_id);
            println!(
                "  Sync token: {}",
                if tokens.sync_token.is_some() {
                    "held (next connection resumes the queue)"
                } else {
                    "none (next connection creates a queue)"
                }
            );
        }
        None => {
            println!("Account: NOT LOGGED IN");
        }
    }

    Ok(())
}
