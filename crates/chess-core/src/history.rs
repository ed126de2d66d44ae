//! Evaluation-over-time series, one point per ply boundary.

use chess::ChessMove;
use serde::{Serialize, Serializer};

use crate::moves::move_to_uci;

/// Clamp range for charting, in centipawns.
pub const DISPLAY_LIMIT: i32 = 1000;

/// Settled evaluation of one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationPoint {
    /// Centipawns from White's perspective, mate encoded near `MATE_SCORE`.
    pub score: i32,
    /// Top move of the principal variation, if the position has moves.
    #[serde(serialize_with = "serialize_move")]
    pub best_move: Option<ChessMove>,
    /// First move of the second-best line when multi-line analysis ran.
    #[serde(serialize_with = "serialize_move")]
    pub alternative_move: Option<ChessMove>,
}

impl EvaluationPoint {
    /// A point with no move suggestions (terminal positions).
    pub fn score_only(score: i32) -> Self {
        Self {
            score,
            best_move: None,
            alternative_move: None,
        }
    }
}

fn serialize_move<S: Serializer>(m: &Option<ChessMove>, s: S) -> Result<S::Ok, S::Error> {
    match m {
        Some(m) => s.serialize_some(&move_to_uci(*m)),
        None => s.serialize_none(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationHistory {
    points: Vec<EvaluationPoint>,
}

impl EvaluationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: EvaluationPoint) {
        self.points.push(point);
    }

    /// Drop points beyond `len`. Used when moves are taken back.
    pub fn truncate(&mut self, len: usize) {
        self.points.truncate(len);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn get(&self, ply: usize) -> Option<&EvaluationPoint> {
        self.points.get(ply)
    }

    pub fn last(&self) -> Option<&EvaluationPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw scores, as used for classification.
    pub fn scores(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.score).collect()
    }

    /// Scores clamped to ±`DISPLAY_LIMIT` for the evaluation graph.
    pub fn display_series(&self) -> Vec<i32> {
        self.points
            .iter()
            .map(|p| p.score.clamp(-DISPLAY_LIMIT, DISPLAY_LIMIT))
            .collect()
    }
}
