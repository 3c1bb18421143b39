//! Network error taxonomy

use morris_core::GameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    /// The peers' boards have diverged; the session cannot continue
    #[error("network desync: {0}")]
    Desync(String),
    #[error("connection lost")]
    ConnectionLost,
    #[error("only the host can reset a networked match")]
    ResetNotAllowed,
    #[error("not your turn")]
    OutOfTurn,
    #[error("not connected to an opponent")]
    NotConnected,
    #[error("malformed relay message: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failure reported by the relay itself (unknown room, room full)
    #[error("relay error: {0}")]
    Relay(String),
    #[error(transparent)]
    Game(GameError),
}

impl From<GameError> for NetError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::OutOfTurn => NetError::OutOfTurn,
            other => NetError::Game(other),
        }
    }
}
