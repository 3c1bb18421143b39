//! Morris CLI - Command-line interface
//!
//! Commands:
//! - play: Play in the terminal against a person or the computer
//! - match: Computer-vs-computer series
//! - host: Open a room on a relay and play as Player A
//! - join: Join a room on a relay and play as Player B
//! - relay: Run a relay for networked games

mod console;
mod match_cmd;
mod net_cmd;
mod play_cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use morris_core::GameSettings;
use morris_net::{CancelToken, NetConfig};

#[derive(Parser)]
#[command(name = "morris")]
#[command(about = "Nine Men's Morris: local, computer and networked play")]
struct Cli {
    /// Random seed for reproducibility
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Settings JSON file (variant, difficulty, AI tuning, rules)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Connection tuning JSON file (keepalive, reconnect)
    #[arg(long, global = true, value_name = "FILE")]
    net_config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game in the terminal
    Play(play_cmd::PlayArgs),
    /// Play a series of computer-vs-computer games
    Match(match_cmd::MatchArgs),
    /// Host a networked game
    Host(net_cmd::HostArgs),
    /// Join a networked game
    Join(net_cmd::JoinArgs),
    /// Run a relay server
    Relay(net_cmd::RelayArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        settings.ai.seed = Some(seed);
    }

    let shutdown = CancelToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Play(args) => play_cmd::run(args, settings, shutdown).await,
        Commands::Match(args) => match_cmd::run(args, settings, cli.seed),
        Commands::Host(args) => {
            let net = load_net_config(cli.net_config.as_deref())?;
            net_cmd::run_host(args, settings, net, shutdown).await
        }
        Commands::Join(args) => {
            let net = load_net_config(cli.net_config.as_deref())?;
            net_cmd::run_join(args, settings, net, shutdown).await
        }
        Commands::Relay(args) => net_cmd::run_relay(args, shutdown).await,
    }
}

fn load_settings(path: Option<&Path>) -> Result<GameSettings> {
    match path {
        Some(path) => GameSettings::load(path)
            .with_context(|| format!("Failed to load settings: {}", path.display())),
        None => Ok(GameSettings::default()),
    }
}

fn load_net_config(path: Option<&Path>) -> Result<NetConfig> {
    match path {
        Some(path) => NetConfig::load(path)
            .with_context(|| format!("Failed to load network settings: {}", path.display())),
        None => Ok(NetConfig::default()),
    }
}
