//! Match command - computer-vs-computer series between two difficulties
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: play_match(), report_results()
//! - Level 3: play_single_game(), compute_match_statistics()
//! - Level 4: formatting utilities

use anyhow::{Context, Result};
use clap::Args;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use morris_core::{AiConfig, AiEngine, Difficulty, GameSettings, MatchState, Move, Outcome, Player, Variant};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct MatchArgs {
    /// Number of games to play (sides alternate)
    #[arg(long, default_value = "10")]
    pub games: usize,

    /// Rule set: classic or simple (overrides the settings file)
    #[arg(long)]
    pub variant: Option<Variant>,

    /// Strength of the first engine
    #[arg(long, default_value = "medium")]
    pub difficulty_a: Difficulty,

    /// Strength of the second engine
    #[arg(long, default_value = "hard")]
    pub difficulty_b: Difficulty,

    /// Stop a game after this many plies and score it a draw
    #[arg(long, default_value = "400")]
    pub max_plies: u32,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Result of a single game
#[derive(Clone, Debug)]
struct GameRecord {
    game_number: usize,
    /// Winning engine: 0 = difficulty-a, 1 = difficulty-b
    winner: Option<usize>,
    plies: u32,
    /// True if the difficulty-a engine played Player A
    first_engine_opened: bool,
    moves: Vec<Move>,
}

/// Aggregated match results
#[derive(Clone, Debug)]
struct MatchResults {
    games: Vec<GameRecord>,
    first_wins: usize,
    second_wins: usize,
    draws: usize,
    avg_plies: f32,
}

/// Per-game setup, fixed before the parallel run
#[derive(Clone, Copy, Debug)]
struct GameConfig {
    game_number: usize,
    first_engine_opened: bool,
    seed: u64,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run match command
///
/// 1. Resolve the variant
/// 2. Play the match (games in parallel)
/// 3. Report results
pub fn run(args: MatchArgs, mut settings: GameSettings, seed: Option<u64>) -> Result<()> {
    if let Some(variant) = args.variant {
        settings.variant = variant;
    }

    tracing::info!(
        "Starting match: {:?} vs {:?} ({} games, {})",
        args.difficulty_a,
        args.difficulty_b,
        args.games,
        settings.variant
    );

    let results = play_match(&settings, &args, seed)?;

    report_results(&results, &args);

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Play all games in the match
fn play_match(settings: &GameSettings, args: &MatchArgs, seed: Option<u64>) -> Result<MatchResults> {
    let mut rng = create_rng(seed);
    let configs: Vec<GameConfig> = (0..args.games)
        .map(|i| GameConfig {
            game_number: i + 1,
            // Alternate sides for fairness
            first_engine_opened: i % 2 == 0,
            seed: rng.gen(),
        })
        .collect();

    let games = configs
        .par_iter()
        .map(|gc| {
            play_single_game(settings, args, gc)
                .with_context(|| format!("Game {} failed", gc.game_number))
        })
        .collect::<Result<Vec<_>>>()?;

    for record in &games {
        tracing::info!(
            "Game {}: {} ({} plies)",
            record.game_number,
            describe_winner(record.winner),
            record.plies
        );
    }

    Ok(compute_match_statistics(games))
}

/// Report match results
fn report_results(results: &MatchResults, args: &MatchArgs) {
    if args.json {
        print_json_results(results, args);
    } else {
        print_text_results(results, args);
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Play one game between the two engines
fn play_single_game(settings: &GameSettings, args: &MatchArgs, gc: &GameConfig) -> Result<GameRecord> {
    let (opener, responder) = if gc.first_engine_opened {
        (args.difficulty_a, args.difficulty_b)
    } else {
        (args.difficulty_b, args.difficulty_a)
    };

    let config_a = AiConfig { seed: Some(gc.seed), ..settings.ai.clone() };
    let config_b = AiConfig { seed: Some(gc.seed.wrapping_add(1)), ..settings.ai.clone() };
    let mut engines = [
        AiEngine::new(Player::A, settings.variant, opener, &config_a),
        AiEngine::new(Player::B, settings.variant, responder, &config_b),
    ];

    let mut state = MatchState::with_rules(settings.variant, settings.rules.clone());
    let mut moves = Vec::new();

    while !state.is_over() && moves.len() < args.max_plies as usize {
        let player = state.active_player();
        let engine = match player {
            Player::A => &mut engines[0],
            Player::B => &mut engines[1],
        };
        match engine.select_move(&state) {
            Some(mv) => {
                state
                    .apply_move(mv)
                    .with_context(|| format!("{} chose illegal move {}", player, mv))?;
                moves.push(mv);
            }
            None => state.declare_no_move(player),
        }
    }

    let winner = match state.outcome() {
        Outcome::Won(Player::A) => Some(if gc.first_engine_opened { 0 } else { 1 }),
        Outcome::Won(Player::B) => Some(if gc.first_engine_opened { 1 } else { 0 }),
        Outcome::Draw | Outcome::Ongoing => None,
    };

    Ok(GameRecord {
        game_number: gc.game_number,
        winner,
        plies: moves.len() as u32,
        first_engine_opened: gc.first_engine_opened,
        moves,
    })
}

/// Compute aggregate statistics from game records
fn compute_match_statistics(games: Vec<GameRecord>) -> MatchResults {
    let first_wins = games.iter().filter(|g| g.winner == Some(0)).count();
    let second_wins = games.iter().filter(|g| g.winner == Some(1)).count();
    let draws = games.iter().filter(|g| g.winner.is_none()).count();

    let total_plies: u32 = games.iter().map(|g| g.plies).sum();
    let avg_plies = if games.is_empty() {
        0.0
    } else {
        total_plies as f32 / games.len() as f32
    };

    MatchResults {
        games,
        first_wins,
        second_wins,
        draws,
        avg_plies,
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

/// Create RNG from seed or random
fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn describe_winner(winner: Option<usize>) -> &'static str {
    match winner {
        Some(0) => "difficulty-a wins",
        Some(_) => "difficulty-b wins",
        None => "draw",
    }
}

fn percent(count: usize, total: usize) -> f32 {
    if total > 0 {
        count as f32 / total as f32 * 100.0
    } else {
        0.0
    }
}

/// Print results as JSON
fn print_json_results(results: &MatchResults, args: &MatchArgs) {
    #[derive(serde::Serialize)]
    struct JsonGame {
        game_number: usize,
        result: String,
        plies: u32,
        first_engine_opened: bool,
        moves: Vec<String>,
    }

    #[derive(serde::Serialize)]
    struct JsonOutput {
        total_games: usize,
        difficulty_a: Difficulty,
        difficulty_b: Difficulty,
        first_wins: usize,
        second_wins: usize,
        draws: usize,
        avg_plies: f32,
        first_win_rate: f32,
        games: Vec<JsonGame>,
    }

    let total = results.games.len();
    let output = JsonOutput {
        total_games: total,
        difficulty_a: args.difficulty_a,
        difficulty_b: args.difficulty_b,
        first_wins: results.first_wins,
        second_wins: results.second_wins,
        draws: results.draws,
        avg_plies: results.avg_plies,
        first_win_rate: percent(results.first_wins, total) / 100.0,
        games: results
            .games
            .iter()
            .map(|g| JsonGame {
                game_number: g.game_number,
                result: describe_winner(g.winner).to_string(),
                plies: g.plies,
                first_engine_opened: g.first_engine_opened,
                moves: g.moves.iter().map(ToString::to_string).collect(),
            })
            .collect(),
    };

    if let Ok(json) = serde_json::to_string_pretty(&output) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(results: &MatchResults, args: &MatchArgs) {
    let total = results.games.len();

    println!("\n=== Match Results ===");
    println!("Total games: {}", total);
    println!(
        "{:?} (a) wins: {} ({:.1}%)",
        args.difficulty_a,
        results.first_wins,
        percent(results.first_wins, total)
    );
    println!(
        "{:?} (b) wins: {} ({:.1}%)",
        args.difficulty_b,
        results.second_wins,
        percent(results.second_wins, total)
    );
    println!("Draws:       {} ({:.1}%)", results.draws, percent(results.draws, total));
    println!("Avg plies:   {:.1}", results.avg_plies);

    println!("\nGame details:");
    for game in &results.games {
        println!(
            "  Game {}: {} in {} plies ({} opened)",
            game.game_number,
            describe_winner(game.winner),
            game.plies,
            if game.first_engine_opened { "a" } else { "b" }
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
