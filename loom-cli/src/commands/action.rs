//! Action command for submitting an `Action` to a session's Processor over
//! the HTTP ingress route.

use std::io::Read;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use loom_core::Action;

/// Action management commands
#[derive(Debug, Args)]
pub struct ActionArgs {
    #[command(subcommand)]
    pub command: ActionCommand,
}

/// Action subcommands
#[derive(Debug, Subcommand)]
pub enum ActionCommand {
    /// Send an action to a session
    Send(SendArgs),
}

/// Arguments for the `action send` command
#[derive(Debug, Args)]
pub struct SendArgs {
    /// Session to enqueue the action onto
    pub session_id: String,

    /// Action payload as JSON, e.g. `{"type":"prompt","text":"..."}`
    /// (reads from stdin if omitted)
    #[arg(short, long)]
    pub data: Option<String>,

    /// Base URL of a running loom server
    #[arg(long, default_value = "http://127.0.0.1:7432")]
    pub server: String,
}

/// Run the action command
pub async fn run(args: ActionArgs) -> Result<()> {
    match args.command {
        ActionCommand::Send(send_args) => execute_send(send_args).await,
    }
}

/// Execute the send subcommand
async fn execute_send(args: SendArgs) -> Result<()> {
    let payload = match args.data {
        Some(data) => data,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };

    let action: Action =
        serde_json::from_str(&payload).context("Failed to parse action JSON")?;

    let client = reqwest::Client::new();
    let url = format!("{}/api/sessions/{}/actions", args.server, args.session_id);
    let response = client
        .post(&url)
        .json(&action)
        .send()
        .await
        .context("Failed to reach loom server")?;

    if !response.status().is_success() {
        anyhow::bail!("server rejected action: {}", response.status());
    }

    Ok(())
}
