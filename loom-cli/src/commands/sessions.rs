//! Sessions inspection commands: reporting on a running loom server over
//! HTTP and tailing a session's replay-then-live stream over the
//! Subscription Composer's websocket.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

/// Sessions management arguments
#[derive(Args, Debug)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommand,
}

/// Sessions subcommands
#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// Report how many sessions are active on a running server
    List {
        /// Base URL of a running loom server
        #[arg(long, default_value = "http://127.0.0.1:7432")]
        server: String,
    },
    /// Stream a session's events to stdout as newline-delimited JSON
    Tail {
        /// Session to tail
        session_id: String,

        /// Resume from this offset, exclusive; -1 replays from the beginning
        #[arg(long, default_value_t = -1)]
        from_offset_exclusive: i64,

        /// Base websocket URL of a running loom server
        #[arg(long, default_value = "ws://127.0.0.1:7432")]
        server: String,
    },
}

/// Run sessions command
pub async fn run(args: SessionsArgs) -> Result<()> {
    match args.command {
        SessionsCommand::List { server } => list_sessions(&server).await,
        SessionsCommand::Tail {
            session_id,
            from_offset_exclusive,
            server,
        } => tail_session(&server, &session_id, from_offset_exclusive).await,
    }
}

/// Report the active session count via `/api/health`.
///
/// The Registry only tracks a count, not per-session identities (spec §4.6),
/// so this is the extent of what a server can report without subscribing to
/// a specific session.
async fn list_sessions(server: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .get(format!("{server}/api/health"))
        .send()
        .await
        .context("failed to reach loom server")?
        .json()
        .await
        .context("failed to parse health response")?;

    println!("Active sessions: {}", resp["active_sessions"]);
    Ok(())
}

/// Connect to the Subscription Composer and print each event as it arrives.
async fn tail_session(server: &str, session_id: &str, from_offset_exclusive: i64) -> Result<()> {
    let url = format!(
        "{server}/api/sessions/{session_id}/subscribe?from_offset_exclusive={from_offset_exclusive}"
    );
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .context("failed to connect to subscription endpoint")?;
    let (_sink, mut stream) = ws.split();

    while let Some(msg) = stream.next().await {
        match msg.context("websocket error while tailing session")? {
            Message::Text(text) => println!("{text}"),
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        sessions: SessionsArgs,
    }

    #[test]
    fn list_defaults_to_localhost() {
        let cli = TestCli::parse_from(["test", "list"]);
        match cli.sessions.command {
            SessionsCommand::List { server } => assert_eq!(server, "http://127.0.0.1:7432"),
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn tail_defaults_from_offset_to_minus_one() {
        let cli = TestCli::parse_from(["test", "tail", "s1"]);
        match cli.sessions.command {
            SessionsCommand::Tail {
                session_id,
                from_offset_exclusive,
                ..
            } => {
                assert_eq!(session_id, "s1");
                assert_eq!(from_offset_exclusive, -1);
            }
            _ => panic!("expected tail command"),
        }
    }

    #[test]
    fn tail_accepts_explicit_offset() {
        let cli = TestCli::parse_from(["test", "tail", "s1", "--from-offset-exclusive", "7"]);
        match cli.sessions.command {
            SessionsCommand::Tail {
                from_offset_exclusive,
                ..
            } => assert_eq!(from_offset_exclusive, 7),
            _ => panic!("expected tail command"),
        }
    }
}
