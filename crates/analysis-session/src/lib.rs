//! Interactive chess analysis: a game session whose positions are
//! evaluated in the background by a UCI engine.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod stockfish;
mod worker;

pub use chess_core;

pub use client::{AnalysisRequest, AnalysisResponse, EvaluationClient};
pub use config::{AnalysisSettings, SessionConfig};
pub use coordinator::{AnalysisSession, CoordinatorState};
pub use error::AnalysisError;
