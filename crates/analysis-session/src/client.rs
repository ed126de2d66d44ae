//! Request/response contract with a position-evaluation engine.

use std::future::Future;

use chess::{Board, ChessMove};

use crate::error::AnalysisError;

/// One evaluation request. Immutable once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub position: Board,
    pub depth: u8,
    /// Lines to search, at least 1
    pub variation_count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResponse {
    /// Centipawns from White's perspective, mate encoded near `MATE_SCORE`
    pub score: i32,
    /// Best line, first move is the engine's recommendation
    pub principal_variation: Vec<ChessMove>,
    /// First move of the second-best line, when more than one line was requested
    pub secondary_variation: Option<ChessMove>,
}

impl AnalysisResponse {
    pub fn best_move(&self) -> Option<ChessMove> {
        self.principal_variation.first().copied()
    }
}

/// An evaluation engine. The worker task owns the client and awaits one
/// call at a time; an implementation may take seconds per request.
pub trait EvaluationClient: Send + 'static {
    fn analyze(
        &mut self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisResponse, AnalysisError>> + Send;

    /// Best-effort graceful stop. Idempotent; failures are logged, not returned.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}
