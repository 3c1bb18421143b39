//! Host, join and relay commands - networked play
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run_host(), run_join(), run_relay() - orchestration
//! - Level 2: session_loop()
//! - Level 3: handle_event(), handle_line()
//! - Level 4: printing utilities

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

use morris_core::{Controller, GameMode, GameSettings, Player};
use morris_net::{CancelToken, Endpoint, LocalRelay, NetClient, NetConfig, SessionEvent};

use crate::console::{self, Command};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct HostArgs {
    /// Relay address (host:port)
    #[arg(long, default_value = "127.0.0.1:7878")]
    pub relay: String,

    /// Name shown to the opponent
    #[arg(long, default_value = "Host")]
    pub name: String,
}

#[derive(Args)]
pub struct JoinArgs {
    /// Relay address (host:port)
    #[arg(long, default_value = "127.0.0.1:7878")]
    pub relay: String,

    /// Room code given by the host
    #[arg(long)]
    pub room: String,

    /// Name shown to the opponent
    #[arg(long, default_value = "Guest")]
    pub name: String,
}

#[derive(Args)]
pub struct RelayArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:7878")]
    pub listen: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Host a room; this peer plays Player A and moves first
pub async fn run_host(args: HostArgs, settings: GameSettings, net: NetConfig, shutdown: CancelToken) -> Result<()> {
    let endpoint = Endpoint::Tcp(args.relay.clone());
    let client = NetClient::connect_as_host(endpoint, &args.name, net)
        .await
        .with_context(|| format!("Failed to reach relay at {}", args.relay))?;
    let controller = Controller::new(GameMode::Networked { local: Player::A }, &settings);

    println!("Waiting for the relay to open a room...");
    session_loop(client, controller, &shutdown).await
}

/// Join a room by code; this peer plays Player B
pub async fn run_join(args: JoinArgs, settings: GameSettings, net: NetConfig, shutdown: CancelToken) -> Result<()> {
    let endpoint = Endpoint::Tcp(args.relay.clone());
    let client = NetClient::connect_as_client(endpoint, &args.room, &args.name, net)
        .await
        .with_context(|| format!("Failed to reach relay at {}", args.relay))?;
    let controller = Controller::new(GameMode::Networked { local: Player::B }, &settings);

    println!("Joining room {}...", args.room.to_uppercase());
    session_loop(client, controller, &shutdown).await
}

/// Serve a relay for other peers
pub async fn run_relay(args: RelayArgs, shutdown: CancelToken) -> Result<()> {
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", args.listen))?;
    let relay = LocalRelay::new();

    tokio::select! {
        served = relay.serve(listener) => served.context("Relay stopped")?,
        _ = shutdown.cancelled() => tracing::info!("Relay shutting down"),
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

async fn session_loop(mut client: NetClient, mut controller: Controller, shutdown: &CancelToken) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = client.next_event(&mut controller) => {
                match event {
                    Ok(event) => handle_event(&client, &controller, event),
                    Err(e) => {
                        client.disconnect();
                        return Err(e).context("Network session ended");
                    }
                }
            }
            line = lines.next_line() => {
                let flow = match line? {
                    Some(line) => handle_line(&mut client, &mut controller, &line),
                    None => Flow::Quit,
                };
                if flow == Flow::Quit {
                    client.disconnect();
                    return Ok(());
                }
            }
            _ = shutdown.cancelled() => {
                client.disconnect();
                return Ok(());
            }
        }
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn handle_event(client: &NetClient, controller: &Controller, event: SessionEvent) {
    match event {
        SessionEvent::HostAccepted { room_code } => {
            println!("Room code: {}  (share it with your opponent)", room_code);
        }
        SessionEvent::OpponentJoined { name } => {
            println!("{} joined. You are {}.", name, client.session().local_player());
            print_turn(client, controller);
        }
        SessionEvent::RemoteAction(_) => print_turn(client, controller),
        SessionEvent::MatchReset => {
            println!("The host started a new game");
            print_turn(client, controller);
        }
        SessionEvent::OpponentLeft => println!("Opponent disconnected, waiting for them to return"),
        SessionEvent::Latency { round_trip_ms } => tracing::debug!("Round trip {} ms", round_trip_ms),
        SessionEvent::Reply(_) | SessionEvent::Ignored => {}
    }
}

fn handle_line(client: &mut NetClient, controller: &mut Controller, line: &str) -> Flow {
    let command = match console::parse_command(line) {
        Ok(command) => command,
        Err(e) => {
            println!("{}", e);
            return Flow::Continue;
        }
    };

    match command {
        Command::Act(action) => match client.send_local_action(controller, action) {
            Ok(_) => print_turn(client, controller),
            Err(e) => println!("{}", e),
        },
        Command::Help => println!("{}", console::help_text()),
        Command::Board => print_turn(client, controller),
        Command::Moves => println!("{}", console::moves_hint(controller.state())),
        Command::Reset => match client.request_reset(controller) {
            Ok(()) => {
                println!("New game");
                print_turn(client, controller);
            }
            Err(e) => println!("{}", e),
        },
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn print_turn(client: &NetClient, controller: &Controller) {
    print!("{}", console::render_state(controller.state()));
    if !controller.state().is_over() {
        if client.session().is_local_turn() {
            println!("Your turn");
        } else {
            println!("Waiting for opponent");
        }
    }
    if let Some(rtt) = client.session().round_trip_ms() {
        println!("Connection: {} ms", rtt);
    }
}
