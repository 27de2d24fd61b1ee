use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "loom", about = "Reconnectable streaming backend for generative UI")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an action to a session
    Action(commands::action::ActionArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Run the loom server
    Serve(commands::serve::ServeArgs),
    /// Inspect and stream active sessions
    Sessions(commands::sessions::SessionsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Action(args) => commands::action::run(args).await,
        Commands::Config(args) => commands::config::run(args),
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Sessions(args) => commands::sessions::run(args).await,
    }
}
