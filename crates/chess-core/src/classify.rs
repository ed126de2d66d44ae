/// Move classification: pure functions only
/// (no position, engine or session dependencies)

use std::fmt;

use chess::Color;
use serde::{Deserialize, Serialize};

/// Classification thresholds (centipawn loss, inclusive upper bounds)
const THRESHOLD_BEST: i32 = 0;
const THRESHOLD_EXCELLENT: i32 = 10;
const THRESHOLD_GOOD: i32 = 50;
const THRESHOLD_INACCURACY: i32 = 100;
const THRESHOLD_MISTAKE: i32 = 300;

/// Centipawn equivalent of an immediate mate. Mate in N scores `MATE_SCORE - N`.
pub const MATE_SCORE: i32 = 10000;

/// Accuracy percentage, 0..=100.
pub type Accuracy = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Classification {
    pub fn from_cp_loss(cp_loss: i32) -> Self {
        if cp_loss <= THRESHOLD_BEST {
            Classification::Best
        } else if cp_loss <= THRESHOLD_EXCELLENT {
            Classification::Excellent
        } else if cp_loss <= THRESHOLD_GOOD {
            Classification::Good
        } else if cp_loss <= THRESHOLD_INACCURACY {
            Classification::Inaccuracy
        } else if cp_loss <= THRESHOLD_MISTAKE {
            Classification::Mistake
        } else {
            Classification::Blunder
        }
    }

    pub fn accuracy(&self) -> Accuracy {
        match self {
            Classification::Best => 100,
            Classification::Excellent => 98,
            Classification::Good => 95,
            Classification::Inaccuracy => 80,
            Classification::Mistake => 60,
            Classification::Blunder => 40,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Classification::Best => "Best",
            Classification::Excellent => "Excellent",
            Classification::Good => "Good",
            Classification::Inaccuracy => "Inaccuracy",
            Classification::Mistake => "Mistake",
            Classification::Blunder => "Blunder",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of classifying one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub classification: Classification,
    pub accuracy: Accuracy,
    pub cp_loss: i32,
}

impl Verdict {
    /// The played move was the engine's own top choice.
    pub fn engine_best() -> Self {
        Self {
            classification: Classification::Best,
            accuracy: Classification::Best.accuracy(),
            cp_loss: 0,
        }
    }
}

/// Centipawns the mover gave away. Scores are from White's perspective.
/// A move that beats the engine's expectation is clamped to zero.
pub fn cp_loss(before: i32, after: i32, mover: Color) -> i32 {
    let loss = match mover {
        Color::White => before - after,
        Color::Black => after - before,
    };
    loss.max(0)
}

pub fn classify(before: i32, after: i32, mover: Color) -> Verdict {
    let cp_loss = cp_loss(before, after, mover);
    let classification = Classification::from_cp_loss(cp_loss);
    Verdict {
        classification,
        accuracy: classification.accuracy(),
        cp_loss,
    }
}

/// Convert a UCI score (side-to-move perspective) to centipawns from White's perspective.
pub fn white_score(cp: Option<i32>, mate: Option<i32>, white_to_move: bool) -> i32 {
    let score = if let Some(m) = mate {
        if m > 0 {
            MATE_SCORE - m
        } else {
            // `mate 0` and `mate -N`: the side to move is getting mated
            -MATE_SCORE - m
        }
    } else {
        cp.unwrap_or(0)
    };

    if white_to_move {
        score
    } else {
        -score
    }
}

/// Mean of per-move accuracies, `None` without moves.
pub fn mean_accuracy(accuracies: &[Accuracy]) -> Option<f64> {
    if accuracies.is_empty() {
        return None;
    }
    let total: u32 = accuracies.iter().map(|&a| a as u32).sum();
    Some(total as f64 / accuracies.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(Classification::from_cp_loss(0), Classification::Best);
        assert_eq!(Classification::from_cp_loss(1), Classification::Excellent);
        assert_eq!(Classification::from_cp_loss(10), Classification::Excellent);
        assert_eq!(Classification::from_cp_loss(11), Classification::Good);
        assert_eq!(Classification::from_cp_loss(50), Classification::Good);
        assert_eq!(Classification::from_cp_loss(100), Classification::Inaccuracy);
        assert_eq!(Classification::from_cp_loss(300), Classification::Mistake);
        assert_eq!(Classification::from_cp_loss(301), Classification::Blunder);
    }

    #[test]
    fn test_white_blunder() {
        let verdict = classify(0, -400, Color::White);
        assert_eq!(verdict.cp_loss, 400);
        assert_eq!(verdict.classification, Classification::Blunder);
        assert_eq!(verdict.accuracy, 40);
    }

    #[test]
    fn test_white_excellent() {
        let verdict = classify(50, 40, Color::White);
        assert_eq!(verdict.cp_loss, 10);
        assert_eq!(verdict.classification, Classification::Excellent);
        assert_eq!(verdict.accuracy, 98);
    }

    #[test]
    fn test_cp_loss_perspective_and_clamp() {
        assert_eq!(cp_loss(100, 80, Color::White), 20);
        assert_eq!(cp_loss(100, 120, Color::Black), 20);
        assert_eq!(cp_loss(100, 180, Color::White), 0);
        assert_eq!(cp_loss(100, 20, Color::Black), 0);
    }

    #[test]
    fn test_accuracy_monotonic_in_cp_loss() {
        let mut previous = Classification::from_cp_loss(-50).accuracy();
        for loss in -50..=1200 {
            let accuracy = Classification::from_cp_loss(loss).accuracy();
            assert!(accuracy <= previous, "accuracy rose at cp_loss {loss}");
            previous = accuracy;
        }
    }

    #[test]
    fn test_white_score_conversion() {
        assert_eq!(white_score(Some(35), None, true), 35);
        assert_eq!(white_score(Some(35), None, false), -35);
        assert_eq!(white_score(None, Some(3), true), 9997);
        assert_eq!(white_score(None, Some(3), false), -9997);
        assert_eq!(white_score(None, Some(-2), true), -9998);
        assert_eq!(white_score(None, Some(0), false), 10000);
        assert_eq!(white_score(None, None, true), 0);
    }

    #[test]
    fn test_mean_accuracy() {
        assert_eq!(mean_accuracy(&[]), None);
        assert_eq!(mean_accuracy(&[100, 40]), Some(70.0));
    }
}
