//! Morris Core - Game engine and AI
//!
//! This crate provides the core game logic for Nine Men's Morris:
//! - Board topology (three rings of eight points, adjacency, mills)
//! - Match state, turn flow and win detection for both variants
//! - Settings and AI tuning
//! - Computer opponents (alpha-beta search and priority heuristic)
//! - Match controller shared by local, computer and networked play

pub mod board;
pub mod game;
pub mod config;
pub mod eval;
pub mod ai;
pub mod controller;

// Re-exports for convenient access
pub use board::{Board, Position, Symmetry, MILL_PATTERNS, removable_pieces};
pub use game::{
    Action, GameError, MatchState, Move, Outcome, Phase, Player, TurnReport, Variant,
    MIN_PIECES, PIECES_PER_PLAYER,
};
pub use config::{AiConfig, ConfigError, Difficulty, GameSettings, HeuristicRule, RulesConfig};
pub use ai::{AiEngine, Strategy};
pub use controller::{ComputerTurn, Controller, GameMode, Seat};
