//! Terminal input parsing and status display shared by the interactive commands
//!
//! Points are typed as numbers (`0`-`23`) or as the letters of the board
//! legend (`a`-`x`).

use anyhow::{anyhow, bail, Result};
use morris_core::{board, Action, MatchState, Outcome, Phase, Player, Position};

/// One line of user input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Act(Action),
    Help,
    Board,
    Moves,
    Reset,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim().to_lowercase();
    match line.as_str() {
        "" => bail!("type a move, or 'help'"),
        "help" | "?" => return Ok(Command::Help),
        "board" => return Ok(Command::Board),
        "moves" => return Ok(Command::Moves),
        "reset" => return Ok(Command::Reset),
        "quit" | "exit" => return Ok(Command::Quit),
        _ => {}
    }

    if let Some((from, to)) = line.split_once('-') {
        return Ok(Command::Act(Action::Slide {
            from: parse_position(from)?,
            to: parse_position(to)?,
        }));
    }

    // `x 7` captures; a lone `x` is point 23
    if let Some(target) = line.strip_prefix('x') {
        let target = target.trim();
        if !target.is_empty() {
            return Ok(Command::Act(Action::Capture(parse_position(target)?)));
        }
    }

    Ok(Command::Act(Action::Place(parse_position(&line)?)))
}

pub fn parse_position(token: &str) -> Result<Position> {
    let token = token.trim();
    if let Ok(index) = token.parse::<u8>() {
        return Position::new(index).ok_or_else(|| anyhow!("{} is off the board (0-23)", index));
    }
    match token.as_bytes() {
        [ch @ b'a'..=b'x'] => Position::new(ch - b'a').ok_or_else(|| anyhow!("bad point '{}'", token)),
        _ => bail!("'{}' is not a point", token),
    }
}

// ============================================================================
// DISPLAY
// ============================================================================

pub fn help_text() -> String {
    format!(
        "Points:\n{}\n\
         Place:    5 or f\n\
         Slide:    3-4 or d-e\n\
         Capture:  x 7\n\
         Other:    board, moves, reset, quit\n",
        board::legend()
    )
}

/// Board diagram plus a one-line summary
pub fn render_state(state: &MatchState) -> String {
    let mut out = state.board().render();
    for player in [Player::A, Player::B] {
        out.push_str(&format!(
            "{}: {} in hand, {} on board\n",
            player,
            state.pieces_in_hand(player),
            state.pieces_on_board(player)
        ));
    }
    out.push_str(&status_line(state));
    out.push('\n');
    out
}

pub fn status_line(state: &MatchState) -> String {
    let active = state.active_player();
    match state.outcome() {
        Outcome::Won(player) => format!("{} wins", player),
        Outcome::Draw => "Draw".to_string(),
        Outcome::Ongoing if state.pending_capture() => {
            format!("{} formed a mill: capture one of {}", active, list(&state.capturable_pieces()))
        }
        Outcome::Ongoing => match state.phase() {
            Phase::Placing => format!("{} to place", active),
            Phase::Moving if state.can_fly(active) => format!("{} to fly", active),
            Phase::Moving => format!("{} to move", active),
        },
    }
}

/// Legal moves for the side to act, as typed input
pub fn moves_hint(state: &MatchState) -> String {
    if state.pending_capture() {
        return state
            .capturable_pieces()
            .iter()
            .map(|p| format!("x {}", p))
            .collect::<Vec<_>>()
            .join(", ");
    }
    state
        .legal_moves(state.active_player())
        .iter()
        .map(|mv| match mv.from {
            Some(from) => format!("{}-{}", from, mv.to),
            None => mv.to.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn list(positions: &[Position]) -> String {
    positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
