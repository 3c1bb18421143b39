//! Match controller: owns the match state and decides who may act
//!
//! Human input, the computer opponent and the remote peer all go through
//! the same turn-owner check before reaching the rules engine.

use crate::ai::AiEngine;
use crate::config::{Difficulty, GameSettings};
use crate::game::{Action, GameError, MatchState, Move, Player, TurnReport};

/// Who controls one side of the board
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seat {
    Human,
    Computer,
    Remote,
}

/// Opponent setup for a match
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameMode {
    /// Two people sharing one board
    HumanVsHuman,
    /// Human plays A, the computer plays B
    VsComputer { difficulty: Difficulty },
    /// `local` is this peer's side; the other side is remote
    Networked { local: Player },
}

/// Result of asking the computer to play
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputerTurn {
    Moved(Move, TurnReport),
    Captured(TurnReport),
    /// No legal move; the rules engine has settled the game
    NoMove,
}

pub struct Controller {
    state: MatchState,
    mode: GameMode,
    seats: [Seat; 2],
    ai: Option<AiEngine>,
}

impl Controller {
    pub fn new(mode: GameMode, settings: &GameSettings) -> Self {
        let state = MatchState::with_rules(settings.variant, settings.rules.clone());
        let (seats, ai) = match mode {
            GameMode::HumanVsHuman => ([Seat::Human, Seat::Human], None),
            GameMode::VsComputer { difficulty } => (
                [Seat::Human, Seat::Computer],
                Some(AiEngine::new(Player::B, settings.variant, difficulty, &settings.ai)),
            ),
            GameMode::Networked { local: Player::A } => ([Seat::Human, Seat::Remote], None),
            GameMode::Networked { local: Player::B } => ([Seat::Remote, Seat::Human], None),
        };

        Self {
            state,
            mode,
            seats,
            ai,
        }
    }

    /// Read-only view of the match
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn seat(&self, player: Player) -> Seat {
        match player {
            Player::A => self.seats[0],
            Player::B => self.seats[1],
        }
    }

    pub fn active_seat(&self) -> Seat {
        self.seat(self.state.active_player())
    }

    /// Apply an action on behalf of `player`
    pub fn act(&mut self, player: Player, action: Action) -> Result<TurnReport, GameError> {
        self.state.play(player, action)
    }

    /// Apply an action typed in by the local human
    pub fn act_local(&mut self, action: Action) -> Result<TurnReport, GameError> {
        self.check_local_turn()?;
        let player = self.state.active_player();
        self.act(player, action)
    }

    /// Apply a complete move (with optional capture) from the local human
    pub fn apply_local_move(&mut self, mv: Move) -> Result<TurnReport, GameError> {
        self.check_local_turn()?;
        self.state.apply_move(mv)
    }

    pub fn computer_to_move(&self) -> bool {
        !self.state.is_over() && self.active_seat() == Seat::Computer
    }

    /// Let the computer play its whole turn
    pub fn play_computer_turn(&mut self) -> Result<ComputerTurn, GameError> {
        if self.state.is_over() {
            return Err(GameError::GameOver);
        }
        if self.active_seat() != Seat::Computer {
            return Err(GameError::OutOfTurn);
        }
        let ai = self.ai.as_mut().ok_or(GameError::OutOfTurn)?;

        if self.state.pending_capture() {
            let target = ai
                .choose_capture(&self.state)
                .ok_or_else(|| GameError::IllegalMove("nothing to capture".to_string()))?;
            let report = self.state.apply_capture(target)?;
            return Ok(ComputerTurn::Captured(report));
        }

        match ai.select_move(&self.state) {
            Some(mv) => {
                let report = self.state.apply_move(mv)?;
                tracing::debug!("computer played {}", mv);
                Ok(ComputerTurn::Moved(mv, report))
            }
            None => {
                let player = self.state.active_player();
                self.state.declare_no_move(player);
                Ok(ComputerTurn::NoMove)
            }
        }
    }

    /// Put back a snapshot taken with `state().clone()`
    pub fn restore(&mut self, state: MatchState) {
        self.state = state;
    }

    /// Start over with the same mode and settings
    pub fn reset(&mut self) {
        self.state.reset();
    }

    fn check_local_turn(&self) -> Result<(), GameError> {
        if self.state.is_over() {
            return Err(GameError::GameOver);
        }
        if self.active_seat() != Seat::Human {
            return Err(GameError::OutOfTurn);
        }
        Ok(())
    }
}
