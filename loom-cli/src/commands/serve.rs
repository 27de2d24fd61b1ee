//! `loom serve`: runs the HTTP/WS adapter, wiring a generator and an event
//! log chosen from CLI flags around a fresh `AppState`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use loom_core::{Generator, LoomConfig, MockGenerator, SlowMockGenerator, StreamEvent};
use loom_log::{EventLog, InMemoryEventLog, SqliteEventLog};
use loom_server::{AppState, LoomServer, ServerConfig};
use tracing::info;

use crate::config::ConfigLoader;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Use an in-memory event log; nothing survives a restart
    #[arg(long)]
    pub ephemeral: bool,

    /// Path to the SQLite event log (defaults under the XDG data directory)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// No real generator backend ships with loom; this delays the demo
    /// generator's response by the given number of milliseconds, useful for
    /// exercising reconnect and timeout behavior
    #[arg(long)]
    pub generator_delay_ms: Option<u64>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let file_config = ConfigLoader::load().unwrap_or_default();
    let host = args.host.unwrap_or(file_config.server.host);
    let port = args.port.unwrap_or(file_config.server.port);

    let generator: Arc<dyn Generator> = match args.generator_delay_ms {
        Some(ms) => Arc::new(SlowMockGenerator::new(Duration::from_millis(ms))),
        None => Arc::new(MockGenerator::new()),
    };

    let event_log: Arc<dyn EventLog<StreamEvent>> = if args.ephemeral {
        Arc::new(InMemoryEventLog::new())
    } else {
        let path = args
            .db_path
            .unwrap_or_else(|| loom_paths::data_dir().join("events.db"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Arc::new(SqliteEventLog::open(&path)?)
    };

    let state = Arc::new(AppState::new(generator, event_log, LoomConfig::default()));
    let config = ServerConfig::new(host.clone(), port);

    info!("starting loom server on {}:{}", host, port);
    let server = LoomServer::new(config, state);
    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn serve_args_defaults_are_none() {
        let cli = TestCli::parse_from(["test"]);
        assert!(cli.serve.port.is_none());
        assert!(cli.serve.host.is_none());
        assert!(!cli.serve.ephemeral);
        assert!(cli.serve.db_path.is_none());
    }

    #[test]
    fn serve_args_custom_port_and_ephemeral() {
        let cli = TestCli::parse_from(["test", "--port", "8080", "--ephemeral"]);
        assert_eq!(cli.serve.port, Some(8080));
        assert!(cli.serve.ephemeral);
    }

    #[test]
    fn serve_args_generator_delay() {
        let cli = TestCli::parse_from(["test", "--generator-delay-ms", "250"]);
        assert_eq!(cli.serve.generator_delay_ms, Some(250));
    }
}
