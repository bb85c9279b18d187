//! Run the sync controller and print the live feed.

use anyhow::{Context, Result};
use std::path::Path;

use msgr_client::{Credentials, MockAuthApi, MockTransport, SessionStore, SyncController};

use crate::config::AppConfig;

/// Run the sync loop until interrupted.
pub async fn run(data_dir: &Path, config_path: &Path, mock: bool) -> Result<()> {
    let config = AppConfig::load(config_path).await?;

    if !mock {
        anyhow::bail!(
            "no production transport is wired up yet; pass --mock to run against the in-process mocks"
        );
    }

    let store = SessionStore::new(data_dir.join("session.json"));
    let mut controller = SyncController::new(
        Credentials::new(config.email, config.password),
        store,
        MockAuthApi::new(),
        MockTransport::new(),
    );

    let bus = controller.bus();
    bus.subscribe_messages(|msg| {
        let kind = if msg.is_group { "group" } else { "direct" };
        println!(
            "[{}] ({kind} {}) {}: {}",
            msg.timestamp, msg.thread_id, msg.author_id, msg.body
        );
    });
    bus.subscribe_events(|event| {
        tracing::info!(?event, "sync event");
    });

    let shutdown = controller.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    controller.run().await.context("sync controller failed")?;
    Ok(())
}
