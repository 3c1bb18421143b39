//! Position evaluation and mill-pattern queries used by the AI

use crate::board::{Board, Position, MILL_PATTERNS};
use crate::game::Player;

/// Terminal score for the simple variant from `player`'s point of view:
/// `+win_score` if `player` owns a completed mill, `-win_score` if the
/// opponent does, `None` while no mill exists.
pub fn evaluate_simple(board: &Board, player: Player, win_score: i32) -> Option<i32> {
    board
        .any_mill()
        .map(|(owner, _)| if owner == player { win_score } else { -win_score })
}

/// Empty points that would complete a mill for `player`, in pattern order
pub fn winning_cells(board: &Board, player: Player) -> Vec<Position> {
    let mut cells = Vec::new();
    for pattern in MILL_PATTERNS.iter() {
        let (mine, empty) = count_line(board, pattern, player);
        if mine == 2 && empty == 1 {
            if let Some(&cell) = pattern.iter().find(|&&p| board.is_empty(p)) {
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
        }
    }
    cells
}

/// Does a pattern through `to` hold exactly two of `player` and one empty point?
pub fn creates_setup(board: &Board, to: Position, player: Player) -> bool {
    to.mills().any(|pattern| count_line(board, pattern, player) == (2, 1))
}

/// (pieces of `player`, empty points) in one pattern
fn count_line(board: &Board, pattern: &[Position; 3], player: Player) -> (usize, usize) {
    pattern.iter().fold((0, 0), |(mine, empty), &p| match board.get(p) {
        Some(owner) if owner == player => (mine + 1, empty),
        None => (mine, empty + 1),
        Some(_) => (mine, empty),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(i: u8) -> Position {
        Position::new(i).unwrap()
    }

    #[test]
    fn test_evaluate_simple() {
        let mut board = Board::empty();
        assert_eq!(evaluate_simple(&board, Player::A, 100), None);

        for i in [8, 9, 10] {
            board.set(pos(i), Some(Player::B));
        }
        assert_eq!(evaluate_simple(&board, Player::A, 100), Some(-100));
        assert_eq!(evaluate_simple(&board, Player::B, 100), Some(100));
    }

    #[test]
    fn test_winning_cells() {
        let mut board = Board::empty();
        board.set(pos(0), Some(Player::A));
        board.set(pos(1), Some(Player::A));
        assert_eq!(winning_cells(&board, Player::A), vec![pos(2)]);
        assert!(winning_cells(&board, Player::B).is_empty());

        board.set(pos(2), Some(Player::B));
        assert!(winning_cells(&board, Player::A).is_empty());
    }

    #[test]
    fn test_creates_setup() {
        let mut board = Board::empty();
        board.set(pos(0), Some(Player::A));
        board.set(pos(1), Some(Player::A));
        assert!(creates_setup(&board, pos(1), Player::A));
        assert!(!creates_setup(&board, pos(5), Player::A));

        board.set(pos(9), Some(Player::B));
        board.set(pos(17), Some(Player::B));
        // 1 sits in 1-9-17 too, but that line is the opponent's
        assert!(creates_setup(&board, pos(1), Player::A));
    }
}
