//! Match state and rules engine

use crate::board::{removable_pieces, Board, Position};
use crate::config::RulesConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Pieces each player starts with in hand
pub const PIECES_PER_PLAYER: u8 = 9;

/// Below this many pieces (once the hand is empty) a player has lost
pub const MIN_PIECES: u8 = 3;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Player identity. `A` moves first and is the host in networked games.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    A = 1,
    B = 2,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::A => Player::B,
            Player::B => Player::A,
        }
    }

    /// Numeric identity used on the wire (1 or 2)
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Player::A),
            2 => Some(Player::B),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Player::A => 'A',
            Player::B => 'B',
        }
    }

    fn idx(self) -> usize {
        self as usize - 1
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.symbol())
    }
}

/// Rule set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Full game: placing, moving, flying, captures
    Classic,
    /// Reduced game: placing only, first mill wins
    Simple,
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(Variant::Classic),
            "simple" => Ok(Variant::Simple),
            other => Err(format!("unknown variant '{}'", other)),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Classic => write!(f, "classic"),
            Variant::Simple => write!(f, "simple"),
        }
    }
}

/// Derived game phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Placing,
    Moving,
}

/// Game outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Ongoing,
    Won(Player),
    Draw,
}

/// A single rules-engine action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Place(Position),
    Slide { from: Position, to: Position },
    Capture(Position),
}

/// A full move: placement (`from == None`) or slide, plus an optional capture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Option<Position>,
    pub to: Position,
    pub capture: Option<Position>,
}

impl Move {
    pub fn place(to: Position) -> Self {
        Self { from: None, to, capture: None }
    }

    pub fn slide(from: Position, to: Position) -> Self {
        Self { from: Some(from), to, capture: None }
    }

    pub fn with_capture(mut self, capture: Position) -> Self {
        self.capture = Some(capture);
        self
    }

    /// The placement/slide part as an action
    pub fn action(&self) -> Action {
        match self.from {
            None => Action::Place(self.to),
            Some(from) => Action::Slide { from, to: self.to },
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            None => write!(f, "@{}", self.to)?,
            Some(from) => write!(f, "{}-{}", from, self.to)?,
        }
        if let Some(c) = self.capture {
            write!(f, " x{}", c)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("not your turn")]
    OutOfTurn,
    #[error("piece at {0} cannot be captured")]
    IllegalCapture(Position),
    #[error("game already over")]
    GameOver,
}

/// What happened as a result of one action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub player: Player,
    pub action: Action,
    /// Mill formed by this action, if any
    pub mill: Option<[Position; 3]>,
    /// True if the same player must now capture
    pub pending_capture: bool,
    pub outcome: Outcome,
}

// ============================================================================
// MATCH STATE
// ============================================================================

/// Complete state of one match; the single source of truth for both peers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    variant: Variant,
    rules: RulesConfig,
    board: Board,
    active: Player,
    in_hand: [u8; 2],
    on_board: [u8; 2],
    pending_capture: bool,
    outcome: Outcome,
    last_mill: Option<[Position; 3]>,
    move_count: u32,
    plies_without_capture: u32,
}

impl MatchState {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    pub fn new(variant: Variant) -> Self {
        Self::with_rules(variant, RulesConfig::default())
    }

    pub fn with_rules(variant: Variant, rules: RulesConfig) -> Self {
        Self {
            variant,
            rules,
            board: Board::empty(),
            active: Player::A,
            in_hand: [PIECES_PER_PLAYER; 2],
            on_board: [0; 2],
            pending_capture: false,
            outcome: Outcome::Ongoing,
            last_mill: None,
            move_count: 0,
            plies_without_capture: 0,
        }
    }

    /// Build a mid-game position. Board counts are derived from `board`.
    pub fn from_position(
        variant: Variant,
        board: Board,
        active: Player,
        in_hand: [u8; 2],
    ) -> Result<Self, GameError> {
        let mut state = Self::new(variant);
        state.board = board;
        state.active = active;
        state.in_hand = in_hand;
        for player in [Player::A, Player::B] {
            let count = board.count(player) as u8;
            if u16::from(count) + u16::from(in_hand[player.idx()]) > u16::from(PIECES_PER_PLAYER) {
                return Err(GameError::IllegalMove(format!(
                    "{} would have more than {} pieces",
                    player, PIECES_PER_PLAYER
                )));
            }
            state.on_board[player.idx()] = count;
        }
        Ok(state)
    }

    /// Back to the opening position, keeping variant and rules
    pub fn reset(&mut self) {
        *self = Self::with_rules(self.variant, self.rules.clone());
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn active_player(&self) -> Player {
        self.active
    }

    pub fn pieces_in_hand(&self, player: Player) -> u8 {
        self.in_hand[player.idx()]
    }

    pub fn pieces_on_board(&self, player: Player) -> u8 {
        self.on_board[player.idx()]
    }

    pub fn pending_capture(&self) -> bool {
        self.pending_capture
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome != Outcome::Ongoing
    }

    pub fn last_mill(&self) -> Option<[Position; 3]> {
        self.last_mill
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Placing while anyone still holds pieces, moving afterwards
    pub fn phase(&self) -> Phase {
        if self.in_hand.iter().any(|&n| n > 0) {
            Phase::Placing
        } else {
            Phase::Moving
        }
    }

    /// A player reduced to three pieces may jump anywhere (classic only)
    pub fn can_fly(&self, player: Player) -> bool {
        self.variant == Variant::Classic
            && self.phase() == Phase::Moving
            && self.on_board[player.idx()] == MIN_PIECES
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Capture eligibility; see [`removable_pieces`]
    pub fn is_capture_legal(&self, target: Position, capturing: Player) -> bool {
        is_capture_legal(target, capturing, &self.board)
    }

    /// Targets available to the active player while a capture is pending
    pub fn capturable_pieces(&self) -> Vec<Position> {
        if self.pending_capture {
            removable_pieces(&self.board, self.active.opponent())
        } else {
            Vec::new()
        }
    }

    pub fn has_any_legal_move(&self, player: Player) -> bool {
        if self.phase() == Phase::Placing || self.can_fly(player) {
            return self.board.empty_positions().next().is_some();
        }
        self.board
            .pieces_of(player)
            .any(|from| from.neighbors().iter().any(|&to| self.board.is_empty(to)))
    }

    /// Placements, slides or flights available to `player` (captures excluded)
    pub fn legal_moves(&self, player: Player) -> Vec<Move> {
        if self.is_over() {
            return Vec::new();
        }

        if self.in_hand[player.idx()] > 0 {
            return self.board.empty_positions().map(Move::place).collect();
        }
        if self.variant == Variant::Simple {
            return Vec::new();
        }

        let flying = self.can_fly(player);
        let mut moves = Vec::new();
        for from in self.board.pieces_of(player) {
            if flying {
                moves.extend(self.board.empty_positions().map(|to| Move::slide(from, to)));
            } else {
                moves.extend(
                    from.neighbors()
                        .iter()
                        .filter(|&&to| self.board.is_empty(to))
                        .map(|&to| Move::slide(from, to)),
                );
            }
        }
        moves
    }

    // ========================================================================
    // APPLY ACTIONS
    // ========================================================================

    /// Turn-checked entry point shared by local, computer and remote play
    pub fn play(&mut self, player: Player, action: Action) -> Result<TurnReport, GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if player != self.active {
            return Err(GameError::OutOfTurn);
        }
        match action {
            Action::Place(pos) => self.apply_placement(pos),
            Action::Slide { from, to } => self.apply_slide(from, to),
            Action::Capture(pos) => self.apply_capture(pos),
        }
    }

    /// Apply a full move for the active player, all or nothing
    pub fn apply_move(&mut self, mv: Move) -> Result<TurnReport, GameError> {
        let mut next = self.clone();
        let mut report = match mv.from {
            None => next.apply_placement(mv.to)?,
            Some(from) => next.apply_slide(from, mv.to)?,
        };

        if let Some(target) = mv.capture {
            if !report.pending_capture {
                return Err(GameError::IllegalMove(format!(
                    "{} does not form a mill, nothing to capture",
                    mv
                )));
            }
            let capture = next.apply_capture(target)?;
            report.pending_capture = false;
            report.outcome = capture.outcome;
        }

        *self = next;
        Ok(report)
    }

    pub fn apply_placement(&mut self, pos: Position) -> Result<TurnReport, GameError> {
        self.check_can_act()?;
        let player = self.active;

        if self.phase() != Phase::Placing || self.in_hand[player.idx()] == 0 {
            return Err(GameError::IllegalMove(format!("{} has no pieces left to place", player)));
        }
        if !self.board.is_empty(pos) {
            return Err(GameError::IllegalMove(format!("position {} is occupied", pos)));
        }

        self.board.set(pos, Some(player));
        self.in_hand[player.idx()] -= 1;
        self.on_board[player.idx()] += 1;

        Ok(self.finish_move(player, Action::Place(pos), pos))
    }

    pub fn apply_slide(&mut self, from: Position, to: Position) -> Result<TurnReport, GameError> {
        self.check_can_act()?;
        let player = self.active;

        if self.variant == Variant::Simple || self.phase() != Phase::Moving {
            return Err(GameError::IllegalMove("pieces cannot move yet".to_string()));
        }
        if self.board.get(from) != Some(player) {
            return Err(GameError::IllegalMove(format!("no piece of {} at {}", player, from)));
        }
        if !self.board.is_empty(to) {
            return Err(GameError::IllegalMove(format!("position {} is occupied", to)));
        }
        if !from.is_adjacent(to) && !self.can_fly(player) {
            return Err(GameError::IllegalMove(format!("{} is not adjacent to {}", to, from)));
        }

        self.board.set(from, None);
        self.board.set(to, Some(player));

        Ok(self.finish_move(player, Action::Slide { from, to }, to))
    }

    pub fn apply_capture(&mut self, target: Position) -> Result<TurnReport, GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if !self.pending_capture {
            return Err(GameError::IllegalMove("no capture pending".to_string()));
        }
        let player = self.active;
        if !self.is_capture_legal(target, player) {
            return Err(GameError::IllegalCapture(target));
        }

        let victim = player.opponent();
        self.board.set(target, None);
        self.on_board[victim.idx()] -= 1;
        self.pending_capture = false;
        self.plies_without_capture = 0;
        tracing::debug!("{} captured {} at {}", player, victim, target);

        if self.in_hand[victim.idx()] == 0 && self.on_board[victim.idx()] < MIN_PIECES {
            self.finish_game(Outcome::Won(player));
        } else {
            self.pass_turn();
        }

        Ok(TurnReport {
            player,
            action: Action::Capture(target),
            mill: None,
            pending_capture: false,
            outcome: self.outcome,
        })
    }

    /// The side to move has nothing to play: a loss in the classic game,
    /// a draw in the simple one.
    pub fn declare_no_move(&mut self, player: Player) {
        if self.is_over() {
            return;
        }
        let outcome = match self.variant {
            Variant::Classic => Outcome::Won(player.opponent()),
            Variant::Simple => Outcome::Draw,
        };
        tracing::debug!("{} has no move", player);
        self.finish_game(outcome);
    }

    // ========================================================================
    // TURN FLOW
    // ========================================================================

    fn check_can_act(&self) -> Result<(), GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if self.pending_capture {
            return Err(GameError::IllegalMove("a capture must be made first".to_string()));
        }
        Ok(())
    }

    fn finish_move(&mut self, player: Player, action: Action, anchor: Position) -> TurnReport {
        self.move_count += 1;
        let was_slide = matches!(action, Action::Slide { .. });

        let mill = self.board.mill_at(anchor, player);
        if let Some(m) = mill {
            self.last_mill = Some(m);
            tracing::debug!("{} formed mill {:?}", player, m);

            match self.variant {
                Variant::Simple => self.finish_game(Outcome::Won(player)),
                Variant::Classic => {
                    if self.board.count(player.opponent()) > 0 {
                        self.pending_capture = true;
                    } else {
                        self.pass_turn();
                    }
                }
            }
        } else {
            if was_slide {
                self.plies_without_capture += 1;
            }
            match self.variant {
                Variant::Simple if self.phase() == Phase::Moving || self.board.is_full() => {
                    self.finish_game(Outcome::Draw)
                }
                _ => self.pass_turn(),
            }
        }

        TurnReport {
            player,
            action,
            mill,
            pending_capture: self.pending_capture,
            outcome: self.outcome,
        }
    }

    fn pass_turn(&mut self) {
        let mover = self.active;
        self.active = mover.opponent();

        if self.variant != Variant::Classic || self.phase() != Phase::Moving {
            return;
        }
        if !self.has_any_legal_move(self.active) {
            tracing::debug!("{} is blocked", self.active);
            self.finish_game(Outcome::Won(mover));
        } else if let Some(limit) = self.rules.no_capture_draw_limit {
            if self.plies_without_capture >= limit {
                self.finish_game(Outcome::Draw);
            }
        }
    }

    fn finish_game(&mut self, outcome: Outcome) {
        self.outcome = outcome;
        self.pending_capture = false;
        tracing::debug!("game over: {:?}", outcome);
    }
}

/// May `capturing` remove the piece at `target`?
pub fn is_capture_legal(target: Position, capturing: Player, board: &Board) -> bool {
    board.get(target) == Some(capturing.opponent())
        && removable_pieces(board, capturing.opponent()).contains(&target)
}

// ============================================================================
// TESTS
// ============================================================================
