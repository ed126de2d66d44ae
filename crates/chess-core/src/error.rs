//! Game model error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Game is over: {0}")]
    GameOver(&'static str),

    #[error("Invalid move notation: {0}")]
    InvalidNotation(String),

    /// An evaluation arrived for a ply that is no longer pending in the current line.
    #[error("Stale evaluation for ply {ply}")]
    StaleResult { ply: usize },
}
