//! # msgr
//!
//! CLI for running the msgr delta-sync client.
//!
//! ## Commands
//!
//! - `run`: Log in and stream the live message feed
//! - `status`: Show the persisted session state
//! - `logout`: Discard the persisted session
//!
//! ## Example
//!
//! ```bash
//! # Create the login config
//! echo '{"email": "a@b.com", "password": "secret"}' > config.json
//!
//! # Stream messages (mock transport for now)
//! msgr --config config.json --mock run
//!
//! # Inspect the session
//! msgr status
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{logout, run, status};

/// CLI for the msgr delta-sync client.
#[derive(Parser, Debug)]
#[command(name = "msgr")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the persisted session
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Login configuration file (defaults to config.json in the data
    /// directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-process mock transport instead of a real connection
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and stream the live message feed
    Run,

    /// Show the persisted session state
    Status,

    /// Discard the persisted session
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config_path = cli
        .config
        .unwrap_or_else(|| data_dir.join("config.json"));

    match cli.command {
        Commands::Run => {
            run::run(&data_dir, &config_path, cli.mock).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
        Commands::Logout => {
            logout::run(&data_dir).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for msgr.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("rs", "msgr", "msgr")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
