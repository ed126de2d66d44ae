//! Session error types

use std::time::Duration;

use chess_core::error::GameError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),

    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Analysis worker did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("Analysis worker stopped unexpectedly")]
    WorkerGone,

    #[error(transparent)]
    Game(#[from] GameError),
}
