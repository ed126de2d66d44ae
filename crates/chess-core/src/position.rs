//! Position stack on top of `chess::Board`.
//!
//! `chess::Board` is an immutable value without move history, so the
//! position keeps one board per ply together with the halfmove clock.
//! That is enough for push/pop and for the draw rules the `chess` crate
//! does not implement (repetition, fifty moves, insufficient material).
//! Threefold repetition and the fifty-move rule only make a draw claimable;
//! the game ends on its own at fivefold repetition or after 75 moves.

use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece};

/// Halfmove clock value from which a draw can be claimed.
const FIFTY_MOVE_PLIES: u32 = 100;

/// Halfmove clock value that ends the game without a claim.
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    FivefoldRepetition,
    SeventyFiveMoveRule,
}

/// A draw either player may claim. Play continues until one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawClaim {
    ThreefoldRepetition,
    FiftyMoveRule,
}

impl DrawClaim {
    pub fn describe(&self) -> &'static str {
        match self {
            DrawClaim::ThreefoldRepetition => "Draw can be claimed by threefold repetition",
            DrawClaim::FiftyMoveRule => "Draw can be claimed under the fifty-move rule",
        }
    }
}

impl Outcome {
    /// Score of the final position from White's perspective.
    pub fn white_score(&self, mate_score: i32) -> i32 {
        match self {
            Outcome::Checkmate {
                winner: Color::White,
            } => mate_score,
            Outcome::Checkmate {
                winner: Color::Black,
            } => -mate_score,
            _ => 0,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Outcome::Checkmate {
                winner: Color::White,
            } => "Checkmate! White wins",
            Outcome::Checkmate {
                winner: Color::Black,
            } => "Checkmate! Black wins",
            Outcome::Stalemate => "Draw by stalemate",
            Outcome::InsufficientMaterial => "Draw by insufficient material",
            Outcome::FivefoldRepetition => "Draw by fivefold repetition",
            Outcome::SeventyFiveMoveRule => "Draw by the seventy-five-move rule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlyState {
    board: Board,
    halfmove_clock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    stack: Vec<PlyState>,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    /// Standard initial position.
    pub fn new() -> Self {
        Self {
            stack: vec![PlyState {
                board: Board::default(),
                halfmove_clock: 0,
            }],
        }
    }

    fn top(&self) -> &PlyState {
        // The stack always holds the initial position.
        &self.stack[self.stack.len() - 1]
    }

    pub fn board(&self) -> Board {
        self.top().board
    }

    /// Board after `ply` half-moves, if that ply exists.
    pub fn board_at(&self, ply: usize) -> Option<Board> {
        self.stack.get(ply).map(|s| s.board)
    }

    /// Number of half-moves played.
    pub fn ply(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn side_to_move(&self) -> Color {
        self.board().side_to_move()
    }

    pub fn fullmove_number(&self) -> usize {
        self.ply() / 2 + 1
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.top().halfmove_clock
    }

    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board()).collect()
    }

    pub fn is_legal(&self, m: ChessMove) -> bool {
        self.board().legal(m)
    }

    /// FEN with real halfmove clock and fullmove number.
    pub fn fen(&self) -> String {
        let board_fen = self.board().to_string();
        let fields: Vec<&str> = board_fen.split_whitespace().collect();
        if fields.len() < 4 {
            return board_fen;
        }
        format!(
            "{} {} {} {} {} {}",
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            self.halfmove_clock(),
            self.fullmove_number()
        )
    }

    /// Play a move the caller has already checked for legality.
    pub fn push(&mut self, m: ChessMove) {
        let board = self.board();
        let resets_clock = board.piece_on(m.get_source()) == Some(Piece::Pawn)
            || board.piece_on(m.get_dest()).is_some();
        let halfmove_clock = if resets_clock {
            0
        } else {
            self.halfmove_clock() + 1
        };
        self.stack.push(PlyState {
            board: board.make_move_new(m),
            halfmove_clock,
        });
    }

    /// Take back the last move. Returns false at the initial position.
    pub fn pop(&mut self) -> bool {
        if self.stack.len() <= 1 {
            return false;
        }
        self.stack.pop();
        true
    }

    /// Terminal status of the position after `ply` half-moves.
    pub fn outcome_at(&self, ply: usize) -> Option<Outcome> {
        let state = self.stack.get(ply)?;
        let board = state.board;

        match board.status() {
            BoardStatus::Checkmate => {
                return Some(Outcome::Checkmate {
                    winner: !board.side_to_move(),
                })
            }
            BoardStatus::Stalemate => return Some(Outcome::Stalemate),
            BoardStatus::Ongoing => {}
        }

        if insufficient_material(&board) {
            return Some(Outcome::InsufficientMaterial);
        }
        if state.halfmove_clock >= SEVENTY_FIVE_MOVE_PLIES {
            return Some(Outcome::SeventyFiveMoveRule);
        }
        if self.repetitions_at(ply) >= 5 {
            return Some(Outcome::FivefoldRepetition);
        }

        None
    }

    /// Draw claimable in the position after `ply` half-moves. `None` once
    /// the game is over.
    pub fn claimable_draw_at(&self, ply: usize) -> Option<DrawClaim> {
        let state = self.stack.get(ply)?;
        if self.outcome_at(ply).is_some() {
            return None;
        }
        if self.repetitions_at(ply) >= 3 {
            return Some(DrawClaim::ThreefoldRepetition);
        }
        if state.halfmove_clock >= FIFTY_MOVE_PLIES {
            return Some(DrawClaim::FiftyMoveRule);
        }
        None
    }

    pub fn claimable_draw(&self) -> Option<DrawClaim> {
        self.claimable_draw_at(self.ply())
    }

    /// Occurrences of the position at `ply` since the last irreversible move.
    fn repetitions_at(&self, ply: usize) -> usize {
        let Some(state) = self.stack.get(ply) else {
            return 0;
        };
        let window = (state.halfmove_clock as usize).min(ply);
        let hash = state.board.get_hash();
        self.stack[ply - window..=ply]
            .iter()
            .filter(|s| s.board.get_hash() == hash)
            .count()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome_at(self.ply())
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }
}

/// Bare kings, or kings plus a single minor piece.
fn insufficient_material(board: &Board) -> bool {
    let heavy = board.pieces(Piece::Pawn).popcnt()
        + board.pieces(Piece::Rook).popcnt()
        + board.pieces(Piece::Queen).popcnt();
    if heavy > 0 {
        return false;
    }
    let minors = board.pieces(Piece::Knight).popcnt() + board.pieces(Piece::Bishop).popcnt();
    minors <= 1
}
