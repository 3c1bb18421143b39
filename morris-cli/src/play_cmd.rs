//! Play command - interactive game in the terminal
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: game_loop()
//! - Level 3: computer_turn(), read_line(), handle_line()

use anyhow::Result;
use clap::{Args, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use morris_core::{Action, ComputerTurn, Controller, Difficulty, GameMode, GameSettings, Variant};
use morris_net::{CancelToken, ThinkingDelay};

use crate::console::{self, Command};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Opponent {
    Human,
    Computer,
}

#[derive(Args)]
pub struct PlayArgs {
    /// Rule set: classic or simple (overrides the settings file)
    #[arg(long)]
    pub variant: Option<Variant>,

    /// Who plays Player B
    #[arg(long, value_enum, default_value = "computer")]
    pub opponent: Opponent,

    /// Computer strength: easy, medium or hard (overrides the settings file)
    #[arg(long)]
    pub difficulty: Option<Difficulty>,

    /// Skip the computer's thinking delay
    #[arg(long)]
    pub no_delay: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run play command
///
/// 1. Resolve settings and opponent
/// 2. Run the input loop until quit or end of input
pub async fn run(args: PlayArgs, mut settings: GameSettings, shutdown: CancelToken) -> Result<()> {
    if let Some(variant) = args.variant {
        settings.variant = variant;
    }
    if let Some(difficulty) = args.difficulty {
        settings.difficulty = difficulty;
    }

    let mode = match args.opponent {
        Opponent::Human => GameMode::HumanVsHuman,
        Opponent::Computer => GameMode::VsComputer {
            difficulty: settings.difficulty,
        },
    };
    let delay = if args.no_delay {
        ThinkingDelay::none()
    } else {
        ThinkingDelay::from_config(&settings.ai)
    };

    tracing::info!("Starting {} game ({:?})", settings.variant, mode);
    println!("{}", console::help_text());

    let mut controller = Controller::new(mode, &settings);
    game_loop(&mut controller, delay, &shutdown).await
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

async fn game_loop(controller: &mut Controller, mut delay: ThinkingDelay, shutdown: &CancelToken) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("{}", console::render_state(controller.state()));

    loop {
        if controller.computer_to_move() {
            // Input typed while the computer thinks is still handled; a reset drops the pending move
            tokio::select! {
                finished = delay.wait(shutdown) => {
                    if !finished {
                        return Ok(());
                    }
                    computer_turn(controller)?;
                }
                line = lines.next_line() => {
                    if read_line(controller, line?)? == Flow::Quit {
                        return Ok(());
                    }
                }
            }
            continue;
        }

        tokio::select! {
            line = lines.next_line() => {
                if read_line(controller, line?)? == Flow::Quit {
                    return Ok(());
                }
            }
            _ = shutdown.cancelled() => return Ok(()),
        }
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn computer_turn(controller: &mut Controller) -> Result<()> {
    match controller.play_computer_turn()? {
        ComputerTurn::Moved(mv, _) => println!("Computer plays {}", mv),
        ComputerTurn::Captured(report) => {
            if let Action::Capture(target) = report.action {
                println!("Computer captures {}", target);
            }
        }
        ComputerTurn::NoMove => println!("Computer has no move"),
    }
    print!("{}", console::render_state(controller.state()));
    Ok(())
}

/// End of input quits
fn read_line(controller: &mut Controller, line: Option<String>) -> Result<Flow> {
    match line {
        Some(line) => Ok(handle_line(controller, &line)),
        None => Ok(Flow::Quit),
    }
}

fn handle_line(controller: &mut Controller, line: &str) -> Flow {
    let command = match console::parse_command(line) {
        Ok(command) => command,
        Err(e) => {
            println!("{}", e);
            return Flow::Continue;
        }
    };

    match command {
        Command::Act(action) => match controller.act_local(action) {
            Ok(_) => print!("{}", console::render_state(controller.state())),
            Err(e) => println!("{}", e),
        },
        Command::Help => println!("{}", console::help_text()),
        Command::Board => print!("{}", console::render_state(controller.state())),
        Command::Moves => println!("{}", console::moves_hint(controller.state())),
        Command::Reset => {
            controller.reset();
            println!("New game");
            print!("{}", console::render_state(controller.state()));
        }
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}
