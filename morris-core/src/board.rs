//! Board geometry: positions, adjacency graph and mill patterns
//!
//! The board is three concentric squares ("rings") of eight points each.
//! Point `8 * ring + i` sits on ring 0 (outer) .. 2 (inner), with `i`
//! counting clockwise from the top-left corner. Even `i` are corners, odd
//! `i` are mid-side points that also link to the neighbouring rings.
//!
//! ```text
//!  0-----------1-----------2
//!  |           |           |
//!  |   8-------9------10   |
//!  |   |       |       |   |
//!  |   |  16--17--18   |   |
//!  7--15--23      19--11---3
//!  |   |  22--21--20   |   |
//!  |   |       |       |   |
//!  |  14------13------12   |
//!  |           |           |
//!  6-----------5-----------4
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::Player;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Number of points on the board
pub const NUM_POSITIONS: usize = 24;

/// Points per ring
const RING_SIZE: u8 = 8;

/// Number of concentric rings
const NUM_RINGS: u8 = 3;

/// The 16 three-in-a-row patterns
pub const MILL_PATTERNS: [[Position; 3]; 16] = [
    mill(0, 1, 2),
    mill(2, 3, 4),
    mill(4, 5, 6),
    mill(6, 7, 0),
    mill(8, 9, 10),
    mill(10, 11, 12),
    mill(12, 13, 14),
    mill(14, 15, 8),
    mill(16, 17, 18),
    mill(18, 19, 20),
    mill(20, 21, 22),
    mill(22, 23, 16),
    mill(1, 9, 17),
    mill(3, 11, 19),
    mill(5, 13, 21),
    mill(7, 15, 23),
];

const fn mill(a: u8, b: u8, c: u8) -> [Position; 3] {
    [Position(a), Position(b), Position(c)]
}

/// Adjacency graph, built once at compile time
const ADJACENCY: [&[Position]; NUM_POSITIONS] = [
    &[Position(1), Position(7)],
    &[Position(0), Position(2), Position(9)],
    &[Position(1), Position(3)],
    &[Position(2), Position(4), Position(11)],
    &[Position(3), Position(5)],
    &[Position(4), Position(6), Position(13)],
    &[Position(5), Position(7)],
    &[Position(6), Position(0), Position(15)],
    &[Position(9), Position(15)],
    &[Position(8), Position(10), Position(1), Position(17)],
    &[Position(9), Position(11)],
    &[Position(10), Position(12), Position(3), Position(19)],
    &[Position(11), Position(13)],
    &[Position(12), Position(14), Position(5), Position(21)],
    &[Position(13), Position(15)],
    &[Position(14), Position(8), Position(7), Position(23)],
    &[Position(17), Position(23)],
    &[Position(16), Position(18), Position(9)],
    &[Position(17), Position(19)],
    &[Position(18), Position(20), Position(11)],
    &[Position(19), Position(21)],
    &[Position(20), Position(22), Position(13)],
    &[Position(21), Position(23)],
    &[Position(22), Position(16), Position(15)],
];

// ============================================================================
// POSITION
// ============================================================================

/// A point on the board (0-23)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Position(u8);

impl Position {
    /// Checked constructor
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < NUM_POSITIONS).then_some(Position(index))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn ring(self) -> u8 {
        self.0 / RING_SIZE
    }

    /// Index within the ring, clockwise from the top-left corner
    pub fn offset(self) -> u8 {
        self.0 % RING_SIZE
    }

    /// All 24 points in index order
    pub fn all() -> impl Iterator<Item = Position> {
        (0..NUM_POSITIONS as u8).map(Position)
    }

    /// Points reachable by a single slide
    pub fn neighbors(self) -> &'static [Position] {
        ADJACENCY[self.index()]
    }

    pub fn is_adjacent(self, other: Position) -> bool {
        self.neighbors().contains(&other)
    }

    /// Mill patterns that pass through this point (always exactly two)
    pub fn mills(self) -> impl Iterator<Item = &'static [Position; 3]> {
        MILL_PATTERNS.iter().filter(move |m| m.contains(&self))
    }
}

impl TryFrom<u8> for Position {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Position::new(value).ok_or_else(|| format!("position {} is off the board", value))
    }
}

impl From<Position> for u8 {
    fn from(pos: Position) -> u8 {
        pos.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SYMMETRY
// ============================================================================

/// One of the 16 geometric symmetries of the board:
/// a quarter-turn rotation, an optional mirror, and an optional swap of
/// the outer and inner rings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Symmetry {
    pub quarter_turns: u8,
    pub mirrored: bool,
    pub rings_swapped: bool,
}

impl Symmetry {
    pub fn all() -> impl Iterator<Item = Symmetry> {
        (0..4u8).flat_map(|quarter_turns| {
            [(false, false), (true, false), (false, true), (true, true)]
                .into_iter()
                .map(move |(mirrored, rings_swapped)| Symmetry {
                    quarter_turns,
                    mirrored,
                    rings_swapped,
                })
        })
    }

    pub fn apply(self, pos: Position) -> Position {
        let mut offset = pos.offset();
        if self.mirrored {
            offset = (RING_SIZE - offset) % RING_SIZE;
        }
        offset = (offset + 2 * self.quarter_turns) % RING_SIZE;

        let ring = if self.rings_swapped {
            NUM_RINGS - 1 - pos.ring()
        } else {
            pos.ring()
        };

        Position(ring * RING_SIZE + offset)
    }

    /// Map a whole board through this symmetry
    pub fn apply_board(self, board: &Board) -> Board {
        let mut out = Board::empty();
        for pos in Position::all() {
            out.set(self.apply(pos), board.get(pos));
        }
        out
    }
}

// ============================================================================
// BOARD
// ============================================================================

/// Ring layout drawn with one letter per point, in index order
const BOARD_LAYOUT: [&str; 13] = [
    "a-----------b-----------c",
    "|           |           |",
    "|   i-------j-------k   |",
    "|   |       |       |   |",
    "|   |   q---r---s   |   |",
    "|   |   |       |   |   |",
    "h---p---x       t---l---d",
    "|   |   |       |   |   |",
    "|   |   w---v---u   |   |",
    "|   |       |       |   |",
    "|   o-------n-------m   |",
    "|           |           |",
    "g-----------f-----------e",
];

/// Occupancy of every point (`None` = empty)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Option<Player>; NUM_POSITIONS],
}

impl Board {
    pub const fn empty() -> Self {
        Self {
            cells: [None; NUM_POSITIONS],
        }
    }

    pub fn get(&self, pos: Position) -> Option<Player> {
        self.cells[pos.index()]
    }

    pub fn set(&mut self, pos: Position, cell: Option<Player>) {
        self.cells[pos.index()] = cell;
    }

    pub fn is_empty(&self, pos: Position) -> bool {
        self.cells[pos.index()].is_none()
    }

    pub fn empty_positions(&self) -> impl Iterator<Item = Position> + '_ {
        Position::all().filter(|&p| self.is_empty(p))
    }

    pub fn pieces_of(&self, player: Player) -> impl Iterator<Item = Position> + '_ {
        Position::all().filter(move |&p| self.get(p) == Some(player))
    }

    pub fn count(&self, player: Player) -> usize {
        self.pieces_of(player).count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// True iff a mill pattern through `pos` is entirely `player`
    pub fn detect_mill(&self, pos: Position, player: Player) -> bool {
        self.mill_at(pos, player).is_some()
    }

    /// The first completed pattern through `pos`, if any
    pub fn mill_at(&self, pos: Position, player: Player) -> Option<[Position; 3]> {
        pos.mills()
            .find(|m| m.iter().all(|&p| self.get(p) == Some(player)))
            .copied()
    }

    /// Any completed mill on the board, regardless of anchor
    pub fn any_mill(&self) -> Option<(Player, [Position; 3])> {
        MILL_PATTERNS.iter().find_map(|m| {
            let owner = self.get(m[0])?;
            (self.get(m[1]) == Some(owner) && self.get(m[2]) == Some(owner)).then_some((owner, *m))
        })
    }

    /// Plain text diagram, one char per point (`.`, `A`, `B`)
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in BOARD_LAYOUT {
            for ch in line.chars() {
                if ch.is_ascii_lowercase() {
                    let pos = Position(ch as u8 - b'a');
                    out.push(match self.get(pos) {
                        None => '.',
                        Some(player) => player.symbol(),
                    });
                } else {
                    out.push(ch);
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Point names used by `Board::render`: `a` is point 0, `x` is point 23
pub fn legend() -> String {
    BOARD_LAYOUT.iter().map(|line| format!("{}\n", line)).collect()
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// CAPTURE ELIGIBILITY
// ============================================================================

/// Pieces of `owner` that may be captured on `board`.
///
/// Pieces standing in a completed mill are protected unless every piece of
/// `owner` is in a mill, in which case all of them are fair game. Both the
/// rules engine and the computer opponent go through this function.
pub fn removable_pieces(board: &Board, owner: Player) -> Vec<Position> {
    let all: Vec<Position> = board.pieces_of(owner).collect();
    let outside: Vec<Position> = all
        .iter()
        .copied()
        .filter(|&p| !board.detect_mill(p, owner))
        .collect();

    if outside.is_empty() {
        all
    } else {
        outside
    }
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

    #[test]
    fn test_position_bounds() {
        assert!(Position::new(0).is_some());
        assert!(Position::new(23).is_some());
        assert!(Position::new(24).is_none());
        assert!(Position::try_from(30u8).is_err());
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        for a in Position::all() {
            for &b in a.neighbors() {
                assert!(b.is_adjacent(a), "{} -> {} is one-way", a, b);
            }
        }
    }

    #[test]
    fn test_adjacency_degrees() {
        assert_eq!(pos(0).neighbors().len(), 2);
        assert_eq!(pos(1).neighbors().len(), 3);
        assert_eq!(pos(9).neighbors().len(), 4);
        assert_eq!(pos(17).neighbors().len(), 3);
        let edges: usize = Position::all().map(|p| p.neighbors().len()).sum();
        assert_eq!(edges / 2, 32);
    }

    #[test]
    fn test_every_point_in_two_mills() {
        for p in Position::all() {
            assert_eq!(p.mills().count(), 2, "point {}", p);
        }
    }

    #[test]
    fn test_mill_patterns_are_lines() {
        // Consecutive points of a mill are adjacent
        for m in MILL_PATTERNS.iter() {
            assert!(m[0].is_adjacent(m[1]));
            assert!(m[1].is_adjacent(m[2]));
        }
    }

    #[test]
    fn test_symmetries_preserve_mills_and_adjacency() {
        let mut mills: Vec<[Position; 3]> = MILL_PATTERNS
            .iter()
            .map(|m| {
                let mut m = *m;
                m.sort();
                m
            })
            .collect();
        mills.sort();

        for sym in Symmetry::all() {
            let mut mapped: Vec<[Position; 3]> = MILL_PATTERNS
                .iter()
                .map(|m| {
                    let mut t = [sym.apply(m[0]), sym.apply(m[1]), sym.apply(m[2])];
                    t.sort();
                    t
                })
                .collect();
            mapped.sort();
            assert_eq!(mapped, mills, "{:?}", sym);

            for a in Position::all() {
                for &b in a.neighbors() {
                    assert!(sym.apply(a).is_adjacent(sym.apply(b)));
                }
            }
        }
        assert_eq!(Symmetry::all().count(), 16);
    }

    #[test]
    fn test_detect_mill_invariant_under_symmetry() {
        let mut board = Board::empty();
        board.set(pos(8), Some(Player::A));
        board.set(pos(9), Some(Player::A));
        board.set(pos(10), Some(Player::A));
        board.set(pos(3), Some(Player::B));

        for sym in Symmetry::all() {
            let mapped = sym.apply_board(&board);
            for p in Position::all() {
                for player in [Player::A, Player::B] {
                    assert_eq!(
                        board.detect_mill(p, player),
                        mapped.detect_mill(sym.apply(p), player)
                    );
                }
            }
        }
    }

    #[test]
    fn test_removable_prefers_pieces_outside_mills() {
        let mut board = Board::empty();
        for i in [0, 1, 2, 20] {
            board.set(pos(i), Some(Player::B));
        }
        assert_eq!(removable_pieces(&board, Player::B), vec![pos(20)]);
    }

    #[test]
    fn test_removable_all_when_everything_in_mills() {
        let mut board = Board::empty();
        for i in [0, 1, 2] {
            board.set(pos(i), Some(Player::B));
        }
        assert_eq!(removable_pieces(&board, Player::B), vec![pos(0), pos(1), pos(2)]);
    }

    #[test]
    fn test_render_shows_pieces() {
        let mut board = Board::empty();
        board.set(pos(0), Some(Player::A));
        board.set(pos(23), Some(Player::B));
        let text = board.render();
        assert!(text.starts_with("A-----"));
        assert!(text.contains(".---B       .---"));
    }
}
