//! Computer opponent
//!
//! Two families of play, chosen by variant:
//! - simple variant: random, one-ply "win or block", or depth-limited
//!   minimax with alpha-beta pruning over empty points
//! - classic variant: a priority list of mill heuristics over every legal
//!   placement, slide or flight, with a random fallback

use crate::board::{removable_pieces, Board, Position};
use crate::config::{AiConfig, Difficulty, HeuristicRule};
use crate::eval::{creates_setup, evaluate_simple, winning_cells};
use crate::game::{MatchState, Move, Player, Variant};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// STRATEGY
// ============================================================================

/// How the engine picks a move; fixed at construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Uniform choice among legal moves
    Random,
    /// Complete a mill, else block the opponent's, else random
    OneShotHeuristic,
    /// Ordered mill heuristics with a random fallback (classic)
    PriorityHeuristic { rules: Vec<HeuristicRule> },
    /// Minimax with alpha-beta pruning over placements (simple)
    AlphaBetaSearch { depth: u32 },
}

impl Strategy {
    pub fn for_game(variant: Variant, difficulty: Difficulty, config: &AiConfig) -> Self {
        match (variant, difficulty) {
            (_, Difficulty::Easy) => Strategy::Random,
            (Variant::Simple, Difficulty::Medium) => Strategy::OneShotHeuristic,
            (Variant::Simple, Difficulty::Hard) => Strategy::AlphaBetaSearch {
                depth: config.search_depth,
            },
            (Variant::Classic, _) => Strategy::PriorityHeuristic {
                rules: config.priorities.clone(),
            },
        }
    }
}

// ============================================================================
// AI ENGINE
// ============================================================================

/// Computer player bound to one side of the board
pub struct AiEngine {
    player: Player,
    strategy: Strategy,
    win_score: i32,
    fallback_rules: Vec<HeuristicRule>,
    rng: ChaCha8Rng,
}

impl AiEngine {
    pub fn new(player: Player, variant: Variant, difficulty: Difficulty, config: &AiConfig) -> Self {
        Self::with_strategy(player, Strategy::for_game(variant, difficulty, config), config)
    }

    pub fn with_strategy(player: Player, strategy: Strategy, config: &AiConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            player,
            strategy,
            win_score: config.win_score,
            fallback_rules: config.priorities.clone(),
            rng,
        }
    }

    pub fn player(&self) -> Player {
        self.player
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Pick a move for the engine's player, or `None` if it has no legal move.
    ///
    /// The state is only read; nothing from it is kept between calls.
    pub fn select_move(&mut self, state: &MatchState) -> Option<Move> {
        if state.is_over() {
            return None;
        }

        let strategy = self.strategy.clone();
        match (&strategy, state.variant()) {
            (Strategy::Random, _) => self.random_move(state),
            (Strategy::OneShotHeuristic, Variant::Simple) => self.one_shot_move(state),
            (Strategy::AlphaBetaSearch { depth }, Variant::Simple) => {
                self.search_move(state, *depth)
            }
            (Strategy::PriorityHeuristic { rules }, _) => self.priority_move(state, rules),
            // Placement-only strategies cannot play the classic game
            (_, Variant::Classic) => {
                let rules = self.fallback_rules.clone();
                self.priority_move(state, &rules)
            }
        }
    }

    /// Target for a pending capture, preferring pieces outside mills
    pub fn choose_capture(&self, state: &MatchState) -> Option<Position> {
        if !state.pending_capture() || state.active_player() != self.player {
            return None;
        }
        choose_piece_to_remove(state.board(), self.player.opponent())
    }

    // ========================================================================
    // SIMPLE VARIANT
    // ========================================================================

    fn random_move(&mut self, state: &MatchState) -> Option<Move> {
        let candidates = candidates(state, self.player);
        candidates
            .choose(&mut self.rng)
            .map(|c| with_capture(c, self.player))
    }

    fn one_shot_move(&mut self, state: &MatchState) -> Option<Move> {
        let board = state.board();
        let target = winning_cells(board, self.player)
            .into_iter()
            .next()
            .or_else(|| winning_cells(board, self.player.opponent()).into_iter().next());

        match target {
            Some(cell) => Some(Move::place(cell)),
            None => self.random_move(state),
        }
    }

    fn search_move(&mut self, state: &MatchState, depth: u32) -> Option<Move> {
        let mut board = *state.board();
        let (best, score) = alpha_beta(
            &mut board,
            depth,
            i32::MIN,
            i32::MAX,
            true,
            self.player,
            self.win_score,
        );
        tracing::debug!("search depth {} picked {:?} (score {})", depth, best, score);

        match best {
            Some(pos) => Some(Move::place(pos)),
            None => self.random_move(state),
        }
    }

    // ========================================================================
    // CLASSIC VARIANT
    // ========================================================================

    fn priority_move(&mut self, state: &MatchState, rules: &[HeuristicRule]) -> Option<Move> {
        let me = self.player;
        let opponent = me.opponent();
        let mine = candidates(state, me);
        if mine.is_empty() {
            return None;
        }

        for rule in rules {
            let pick = match rule {
                HeuristicRule::FormMill => mine.iter().find(|c| c.forms_mill),
                HeuristicRule::BlockMill => winning_cells(state.board(), opponent)
                    .into_iter()
                    .find_map(|cell| mine.iter().find(|c| c.mv.to == cell)),
                HeuristicRule::Setup => {
                    let setups: Vec<&Candidate> = mine
                        .iter()
                        .filter(|c| creates_setup(&c.board, c.mv.to, me))
                        .collect();
                    setups.choose(&mut self.rng).copied()
                }
                HeuristicRule::BlockSetup => candidates(state, opponent)
                    .iter()
                    .filter(|theirs| creates_setup(&theirs.board, theirs.mv.to, opponent))
                    .find_map(|theirs| mine.iter().find(|c| c.mv.to == theirs.mv.to)),
            };

            if let Some(c) = pick {
                tracing::debug!("{:?} chose {}", rule, c.mv);
                return Some(with_capture(c, me));
            }
        }

        mine.choose(&mut self.rng).map(|c| with_capture(c, me))
    }
}

// ============================================================================
// CANDIDATE MOVES
// ============================================================================

/// A legal move annotated with the board it leaves behind
struct Candidate {
    mv: Move,
    board: Board,
    forms_mill: bool,
}

fn candidates(state: &MatchState, player: Player) -> Vec<Candidate> {
    state
        .legal_moves(player)
        .into_iter()
        .map(|mv| {
            let mut board = *state.board();
            if let Some(from) = mv.from {
                board.set(from, None);
            }
            board.set(mv.to, Some(player));
            Candidate {
                mv,
                forms_mill: board.detect_mill(mv.to, player),
                board,
            }
        })
        .collect()
}

/// Attach a capture target to mill-forming classic moves
fn with_capture(c: &Candidate, player: Player) -> Move {
    if !c.forms_mill {
        return c.mv;
    }
    match choose_piece_to_remove(&c.board, player.opponent()) {
        Some(target) => c.mv.with_capture(target),
        None => c.mv,
    }
}

/// First removable piece of `owner`; same eligibility as the rules engine
fn choose_piece_to_remove(board: &Board, owner: Player) -> Option<Position> {
    removable_pieces(board, owner).first().copied()
}

// ============================================================================
// MINIMAX WITH ALPHA-BETA
// ============================================================================

/// Returns the best empty point for the side to move and its score from
/// `me`'s point of view. Ties keep the first point found.
fn alpha_beta(
    board: &mut Board,
    depth: u32,
    mut alpha: i32,
    mut beta: i32,
    maximizing: bool,
    me: Player,
    win_score: i32,
) -> (Option<Position>, i32) {
    if let Some(score) = evaluate_simple(board, me, win_score) {
        return (None, score);
    }
    if depth == 0 {
        return (None, 0);
    }

    let empty: Vec<Position> = board.empty_positions().collect();
    if empty.is_empty() {
        return (None, 0);
    }

    let mover = if maximizing { me } else { me.opponent() };
    let mut best_move = None;
    let mut best = if maximizing { i32::MIN } else { i32::MAX };

    for pos in empty {
        board.set(pos, Some(mover));
        let (_, score) = alpha_beta(board, depth - 1, alpha, beta, !maximizing, me, win_score);
        board.set(pos, None);

        if maximizing {
            if score > best {
                best = score;
                best_move = Some(pos);
            }
            alpha = alpha.max(score);
        } else {
            if score < best {
                best = score;
                best_move = Some(pos);
            }
            beta = beta.min(score);
        }

        if beta <= alpha {
            break;
        }
    }

    (best_move, best)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(i: u8) -> Position {
        Position::new(i).unwrap()
    }

    fn board_with(a: &[u8], b: &[u8]) -> Board {
        let mut board = Board::empty();
        for &i in a {
            board.set(pos(i), Some(Player::A));
        }
        for &i in b {
            board.set(pos(i), Some(Player::B));
        }
        board
    }

    fn seeded() -> AiConfig {
        AiConfig::default().with_seed(42)
    }

    fn engine(player: Player, strategy: Strategy) -> AiEngine {
        AiEngine::with_strategy(player, strategy, &seeded())
    }

    #[test]
    fn test_strategy_selection() {
        let config = AiConfig::default();
        assert_eq!(
            Strategy::for_game(Variant::Simple, Difficulty::Easy, &config),
            Strategy::Random
        );
        assert_eq!(
            Strategy::for_game(Variant::Simple, Difficulty::Medium, &config),
            Strategy::OneShotHeuristic
        );
        assert_eq!(
            Strategy::for_game(Variant::Simple, Difficulty::Hard, &config),
            Strategy::AlphaBetaSearch { depth: 4 }
        );
        assert!(matches!(
            Strategy::for_game(Variant::Classic, Difficulty::Hard, &config),
            Strategy::PriorityHeuristic { .. }
        ));
    }

    #[test]
    fn test_search_completes_own_mill() {
        let board = board_with(&[0, 1], &[]);
        let state = MatchState::from_position(Variant::Simple, board, Player::A, [7, 9]).unwrap();
        let mut ai = engine(Player::A, Strategy::AlphaBetaSearch { depth: 4 });
        assert_eq!(ai.select_move(&state), Some(Move::place(pos(2))));
    }

    #[test]
    fn test_search_is_deterministic() {
        let board = board_with(&[0, 1], &[]);
        let state = MatchState::from_position(Variant::Simple, board, Player::A, [7, 9]).unwrap();
        for seed in 0..5 {
            let config = AiConfig::default().with_seed(seed);
            let mut ai =
                AiEngine::with_strategy(Player::A, Strategy::AlphaBetaSearch { depth: 4 }, &config);
            assert_eq!(ai.select_move(&state), Some(Move::place(pos(2))));
        }
    }

    #[test]
    fn test_search_blocks_opponent() {
        let board = board_with(&[], &[8, 9]);
        let state = MatchState::from_position(Variant::Simple, board, Player::A, [9, 7]).unwrap();
        let mut ai = engine(Player::A, Strategy::AlphaBetaSearch { depth: 4 });
        assert_eq!(ai.select_move(&state), Some(Move::place(pos(10))));
    }

    #[test]
    fn test_alpha_beta_scores() {
        let mut board = board_with(&[0, 1], &[]);
        assert_eq!(alpha_beta(&mut board, 1, i32::MIN, i32::MAX, true, Player::A, 100).1, 100);
        assert_eq!(alpha_beta(&mut board, 0, i32::MIN, i32::MAX, true, Player::A, 100).1, 0);
        // Search restores the board
        assert_eq!(board, board_with(&[0, 1], &[]));
    }

    #[test]
    fn test_one_shot_wins_then_blocks() {
        let board = board_with(&[0, 1], &[8, 9]);
        let state = MatchState::from_position(Variant::Simple, board, Player::A, [7, 7]).unwrap();
        let mut ai = engine(Player::A, Strategy::OneShotHeuristic);
        assert_eq!(ai.select_move(&state), Some(Move::place(pos(2))));

        let board = board_with(&[20], &[8, 9]);
        let state = MatchState::from_position(Variant::Simple, board, Player::A, [8, 7]).unwrap();
        assert_eq!(ai.select_move(&state), Some(Move::place(pos(10))));
    }

    #[test]
    fn test_random_move_is_legal() {
        let state = MatchState::new(Variant::Simple);
        let mut ai = engine(Player::A, Strategy::Random);
        for _ in 0..20 {
            let mv = ai.select_move(&state).unwrap();
            assert!(mv.from.is_none());
            assert!(state.board().is_empty(mv.to));
        }
    }

    #[test]
    fn test_priority_forms_mill_and_captures_outside_mill() {
        let board = board_with(&[0, 1], &[8, 16, 17, 18]);
        let state = MatchState::from_position(Variant::Classic, board, Player::A, [7, 5]).unwrap();
        let mut ai = AiEngine::new(Player::A, Variant::Classic, Difficulty::Hard, &seeded());
        let mv = ai.select_move(&state).unwrap();
        assert_eq!(mv, Move::place(pos(2)).with_capture(pos(8)));

        let mut applied = state.clone();
        applied.apply_move(mv).unwrap();
        assert_eq!(applied.active_player(), Player::B);
    }

    #[test]
    fn test_priority_blocks_opponent_mill() {
        let board = board_with(&[0], &[8, 9]);
        let state = MatchState::from_position(Variant::Classic, board, Player::A, [8, 7]).unwrap();
        let mut ai = engine(Player::A, Strategy::PriorityHeuristic { rules: AiConfig::default().priorities });
        assert_eq!(ai.select_move(&state), Some(Move::place(pos(10))));
    }

    #[test]
    fn test_priority_prefers_setup() {
        let board = board_with(&[0], &[20]);
        let state = MatchState::from_position(Variant::Classic, board, Player::A, [8, 8]).unwrap();
        let mut ai = engine(Player::A, Strategy::PriorityHeuristic { rules: AiConfig::default().priorities });
        for _ in 0..10 {
            let mv = ai.select_move(&state).unwrap();
            assert!([1, 2, 6, 7].contains(&u8::from(mv.to)), "unexpected {}", mv);
        }
    }

    #[test]
    fn test_priority_slides_into_mill() {
        let board = board_with(&[0, 1, 3, 12], &[4, 14, 20, 22]);
        let state = MatchState::from_position(Variant::Classic, board, Player::A, [0, 0]).unwrap();
        let mut ai = AiEngine::new(Player::A, Variant::Classic, Difficulty::Medium, &seeded());
        assert_eq!(
            ai.select_move(&state),
            Some(Move::slide(pos(3), pos(2)).with_capture(pos(4)))
        );
    }

    #[test]
    fn test_no_move_when_blocked() {
        let board = board_with(&[1, 3, 5, 7, 11, 13], &[0, 2, 4, 12]);
        let state = MatchState::from_position(Variant::Classic, board, Player::B, [0, 0]).unwrap();
        let mut ai = AiEngine::new(Player::B, Variant::Classic, Difficulty::Hard, &seeded());
        assert_eq!(ai.select_move(&state), None);
    }

    #[test]
    fn test_choose_capture_matches_rules() {
        let board = board_with(&[20, 21], &[0, 1, 2, 9]);
        let mut state = MatchState::from_position(Variant::Classic, board, Player::A, [2, 5]).unwrap();
        state.apply_placement(pos(22)).unwrap();

        let ai = engine(Player::A, Strategy::Random);
        let target = ai.choose_capture(&state).unwrap();
        assert_eq!(target, pos(9));
        assert!(state.capturable_pieces().contains(&target));
    }
}
