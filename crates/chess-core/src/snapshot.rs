//! Read-only view of a game handed to the display layer.

use chess::Color;
use serde::Serialize;

use crate::classify::{Accuracy, Classification};
use crate::game::GameState;
use crate::history::DISPLAY_LIMIT;
use crate::moves::move_to_uci;
use crate::notation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub fen: String,
    pub side_to_move: &'static str,
    /// UCI notation
    pub move_history: Vec<String>,
    pub move_history_san: Vec<String>,
    pub classifications: Vec<Classification>,
    pub accuracies: Vec<Accuracy>,
    /// Clamped for charting
    pub evaluation_history: Vec<i32>,
    /// Evaluation bar value for the current position, clamped like the graph
    pub current_score: Option<i32>,
    pub recommended_move: Option<String>,
    pub recommended_move_uci: Option<String>,
    pub outcome: Option<&'static str>,
    pub draw_claim: Option<&'static str>,
    pub white_accuracy: Option<f64>,
    pub black_accuracy: Option<f64>,
    pub status_message: String,
}

impl GameState {
    pub fn snapshot(&self, status_message: impl Into<String>) -> Snapshot {
        let position = self.current_position();
        let move_history = self.move_history_uci();
        let move_history_san = notation::san_line(&move_history);

        let current = self.current_evaluation();
        let recommended_move_uci = current.and_then(|p| p.best_move).map(move_to_uci);
        let recommended_move = recommended_move_uci
            .as_deref()
            .and_then(|uci| notation::uci_to_san(&move_history, uci));

        let summary = self.accuracy_summary();

        Snapshot {
            fen: position.fen(),
            side_to_move: match position.side_to_move() {
                Color::White => "white",
                Color::Black => "black",
            },
            move_history,
            move_history_san,
            classifications: self.classifications(),
            accuracies: self.accuracies(),
            evaluation_history: self.evaluations().display_series(),
            current_score: current.map(|p| p.score.clamp(-DISPLAY_LIMIT, DISPLAY_LIMIT)),
            recommended_move,
            recommended_move_uci,
            outcome: self.outcome().map(|o| o.describe()),
            draw_claim: self.claimable_draw().map(|d| d.describe()),
            white_accuracy: summary.white,
            black_accuracy: summary.black,
            status_message: status_message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::EvaluationPoint;
    use crate::moves::parse_uci_move;

    #[test]
    fn test_snapshot_reports_recommendation_in_san() {
        let mut game = GameState::new();
        let key = game.position_key(0).unwrap();
        let point = EvaluationPoint {
            score: 25,
            best_move: parse_uci_move("g1f3"),
            alternative_move: parse_uci_move("e2e4"),
        };
        game.apply_result(key, None, point).unwrap();

        let snapshot = game.snapshot("Ready");
        assert_eq!(snapshot.side_to_move, "white");
        assert_eq!(snapshot.recommended_move.as_deref(), Some("Nf3"));
        assert_eq!(snapshot.recommended_move_uci.as_deref(), Some("g1f3"));
        assert_eq!(snapshot.evaluation_history, vec![25]);
        assert_eq!(snapshot.status_message, "Ready");
    }

    #[test]
    fn test_snapshot_serializes_classifications() {
        let mut game = GameState::new();
        let key = game.position_key(0).unwrap();
        game.apply_result(key, None, EvaluationPoint::score_only(0))
            .unwrap();
        game.make_move_uci("f2f3").unwrap();
        let key = game.position_key(1).unwrap();
        game.apply_result(key, None, EvaluationPoint::score_only(-80))
            .unwrap();

        let json = serde_json::to_value(game.snapshot("")).unwrap();
        assert_eq!(json["classifications"][0], "inaccuracy");
        assert_eq!(json["accuracies"][0], 80);
        assert_eq!(json["move_history_san"][0], "f3");
        assert!(json["recommended_move"].is_null());
    }
}
