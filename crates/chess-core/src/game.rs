//! Game state: position, linear move history, redo buffer and the
//! analysis data derived per move.
//!
//! Derived lists (classifications, evaluation points) may lag behind the
//! move history while an evaluation is pending, never run ahead of it.
//! Every ply carries a token so that evaluations can be matched to the
//! exact line they were requested for, not to an equal-looking board.

use chess::{Board, ChessMove, Color};

use crate::classify::{self, Accuracy, Classification, Verdict};
use crate::error::GameError;
use crate::history::{EvaluationHistory, EvaluationPoint};
use crate::moves::{move_to_uci, MoveSpec};
use crate::position::{DrawClaim, Outcome, Position};

/// Identity of a position within one line of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub ply: usize,
    pub token: u64,
}

/// A played move with its settled quality label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedMove {
    pub mv: ChessMove,
    pub classification: Classification,
    pub accuracy: Accuracy,
    pub cp_loss: i32,
}

/// What the coordinator needs to know to classify the move leading to `ply`.
#[derive(Debug, Clone, Copy)]
pub struct MoveContext {
    pub mv: ChessMove,
    pub mover: Color,
    pub before: EvaluationPoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RedoEntry {
    mv: ChessMove,
    analysis: Option<(ClassifiedMove, EvaluationPoint)>,
}

/// Mean accuracy per side over classified moves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccuracySummary {
    pub white: Option<f64>,
    pub black: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct GameState {
    position: Position,
    moves: Vec<ChessMove>,
    /// One token per ply boundary; `tokens[0]` is the initial position.
    tokens: Vec<u64>,
    classified: Vec<ClassifiedMove>,
    evaluations: EvaluationHistory,
    redo: Vec<RedoEntry>,
    next_token: u64,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            position: Position::new(),
            moves: Vec::new(),
            tokens: vec![0],
            classified: Vec::new(),
            evaluations: EvaluationHistory::new(),
            redo: Vec::new(),
            next_token: 1,
        }
    }

    fn issue_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    fn push_move(&mut self, m: ChessMove) {
        self.position.push(m);
        self.moves.push(m);
        let token = self.issue_token();
        self.tokens.push(token);
    }

    /// Play a legal move. Clears the redo buffer.
    pub fn make_move(&mut self, spec: MoveSpec) -> Result<ChessMove, GameError> {
        if let Some(outcome) = self.position.outcome() {
            return Err(GameError::GameOver(outcome.describe()));
        }
        let board = self.position.board();
        let m = spec.resolve(&board).ok_or_else(|| {
            GameError::IllegalMove(move_to_uci(ChessMove::new(
                spec.from,
                spec.to,
                spec.promotion,
            )))
        })?;

        self.push_move(m);
        self.redo.clear();
        Ok(m)
    }

    pub fn make_move_uci(&mut self, uci: &str) -> Result<ChessMove, GameError> {
        let spec = MoveSpec::parse_uci(uci)?;
        self.make_move(spec)
    }

    /// Take back the last move. No-op on an empty history.
    pub fn undo(&mut self) -> Option<ChessMove> {
        let m = self.moves.pop()?;
        self.position.pop();
        self.tokens.pop();

        let ply = self.moves.len() + 1;
        let analysis = if self.classified.len() == ply {
            let classified = self.classified.pop();
            let point = self.evaluations.get(ply).copied();
            classified.zip(point)
        } else {
            None
        };

        self.classified.truncate(self.moves.len());
        self.evaluations.truncate(self.moves.len() + 1);
        self.redo.push(RedoEntry { mv: m, analysis });
        Some(m)
    }

    /// Replay the most recently undone move. No-op when nothing was undone.
    pub fn redo(&mut self) -> Option<ChessMove> {
        let entry = self.redo.pop()?;
        if !self.position.is_legal(entry.mv) {
            // The buffer always replays onto the position it was taken from.
            self.redo.clear();
            return None;
        }

        let caught_up = self.classified.len() == self.moves.len()
            && self.evaluations.len() == self.moves.len() + 1;
        self.push_move(entry.mv);

        if let (true, Some((classified, point))) = (caught_up, entry.analysis) {
            self.classified.push(classified);
            self.evaluations.push(point);
        }
        Some(entry.mv)
    }

    /// Back to the initial position with empty history.
    pub fn reset(&mut self) {
        self.position = Position::new();
        self.moves.clear();
        self.classified.clear();
        self.evaluations.clear();
        self.redo.clear();
        let root = self.issue_token();
        self.tokens = vec![root];
    }

    pub fn current_position(&self) -> &Position {
        &self.position
    }

    pub fn board_at(&self, ply: usize) -> Option<Board> {
        self.position.board_at(ply)
    }

    pub fn last_move(&self) -> Option<ChessMove> {
        self.moves.last().copied()
    }

    pub fn ply(&self) -> usize {
        self.moves.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.position.is_terminal()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.position.outcome()
    }

    /// Threefold repetition or fifty-move draw available in the current
    /// position. Moves are still accepted.
    pub fn claimable_draw(&self) -> Option<DrawClaim> {
        self.position.claimable_draw()
    }

    pub fn terminal_status_at(&self, ply: usize) -> Option<Outcome> {
        self.position.outcome_at(ply)
    }

    pub fn position_key(&self, ply: usize) -> Option<PositionKey> {
        self.tokens
            .get(ply)
            .map(|&token| PositionKey { ply, token })
    }

    /// First ply whose position has no settled evaluation.
    pub fn pending_ply(&self) -> Option<usize> {
        let next = self.evaluations.len();
        (next <= self.moves.len()).then_some(next)
    }

    pub fn is_settled(&self) -> bool {
        self.pending_ply().is_none()
    }

    /// Move, mover and pre-move evaluation for the move that produced `ply`.
    pub fn move_context(&self, ply: usize) -> Option<MoveContext> {
        if ply == 0 {
            return None;
        }
        let mv = *self.moves.get(ply - 1)?;
        let mover = self.position.board_at(ply - 1)?.side_to_move();
        let before = *self.evaluations.get(ply - 1)?;
        Some(MoveContext { mv, mover, before })
    }

    /// Record the settled evaluation of the pending ply.
    ///
    /// For a ply after a move, `verdict` labels that move; without one the
    /// move is classified from the score difference alone. Ply 0 ignores it.
    pub fn apply_result(
        &mut self,
        key: PositionKey,
        verdict: Option<Verdict>,
        point: EvaluationPoint,
    ) -> Result<Option<ClassifiedMove>, GameError> {
        if self.pending_ply() != Some(key.ply) || self.position_key(key.ply) != Some(key) {
            return Err(GameError::StaleResult { ply: key.ply });
        }

        let classified = match self.move_context(key.ply) {
            Some(ctx) => {
                let verdict = verdict
                    .unwrap_or_else(|| classify::classify(ctx.before.score, point.score, ctx.mover));
                let classified = ClassifiedMove {
                    mv: ctx.mv,
                    classification: verdict.classification,
                    accuracy: verdict.accuracy,
                    cp_loss: verdict.cp_loss,
                };
                self.classified.push(classified);
                Some(classified)
            }
            None => None,
        };

        self.evaluations.push(point);
        Ok(classified)
    }

    pub fn move_history(&self) -> &[ChessMove] {
        &self.moves
    }

    pub fn move_history_uci(&self) -> Vec<String> {
        self.moves.iter().map(|&m| move_to_uci(m)).collect()
    }

    pub fn classified_moves(&self) -> &[ClassifiedMove] {
        &self.classified
    }

    pub fn classifications(&self) -> Vec<Classification> {
        self.classified.iter().map(|c| c.classification).collect()
    }

    pub fn accuracies(&self) -> Vec<Accuracy> {
        self.classified.iter().map(|c| c.accuracy).collect()
    }

    pub fn evaluations(&self) -> &EvaluationHistory {
        &self.evaluations
    }

    /// Evaluation of the current position, once settled.
    pub fn current_evaluation(&self) -> Option<&EvaluationPoint> {
        self.evaluations.get(self.moves.len())
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// White moves sit at even indices of the history.
    pub fn accuracy_summary(&self) -> AccuracySummary {
        let mut white = Vec::new();
        let mut black = Vec::new();
        for (i, c) in self.classified.iter().enumerate() {
            if i % 2 == 0 {
                white.push(c.accuracy);
            } else {
                black.push(c.accuracy);
            }
        }

        AccuracySummary {
            white: classify::mean_accuracy(&white),
            black: classify::mean_accuracy(&black),
        }
    }
}
