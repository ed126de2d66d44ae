pub mod classify;
pub mod error;
pub mod game;
pub mod history;
pub mod moves;
pub mod notation;
pub mod position;
pub mod snapshot;

pub use chess;
