/// UCI move parsing and resolution of partial move specifications
/// against the legal move set.

use chess::{Board, ChessMove, File, MoveGen, Piece, Rank, Square};

use crate::error::GameError;

/// A move as the user describes it: from-square, to-square and an
/// optional promotion piece. A missing promotion is filled in from the
/// legal set when the move turns out to be a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSpec {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
}

impl MoveSpec {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: Piece) -> Self {
        self.promotion = Some(piece);
        self
    }

    /// Parse UCI text such as `e2e4` or `e7e8q`.
    pub fn parse_uci(uci: &str) -> Result<Self, GameError> {
        let uci = uci.trim();
        let bytes = uci.as_bytes();
        if bytes.len() != 4 && bytes.len() != 5 {
            return Err(GameError::InvalidNotation(uci.to_string()));
        }

        let from = parse_square(bytes[0], bytes[1])
            .ok_or_else(|| GameError::InvalidNotation(uci.to_string()))?;
        let to = parse_square(bytes[2], bytes[3])
            .ok_or_else(|| GameError::InvalidNotation(uci.to_string()))?;

        let promotion = match bytes.get(4) {
            None => None,
            Some(b'q') | Some(b'Q') => Some(Piece::Queen),
            Some(b'r') | Some(b'R') => Some(Piece::Rook),
            Some(b'b') | Some(b'B') => Some(Piece::Bishop),
            Some(b'n') | Some(b'N') => Some(Piece::Knight),
            Some(_) => return Err(GameError::InvalidNotation(uci.to_string())),
        };

        Ok(Self {
            from,
            to,
            promotion,
        })
    }

    /// Find the legal move this spec refers to.
    ///
    /// An exact match wins. Without an explicit promotion, a promoting pawn
    /// move resolves to the queen promotion, else to the first legal move
    /// with the same squares.
    pub fn resolve(&self, board: &Board) -> Option<ChessMove> {
        let exact = ChessMove::new(self.from, self.to, self.promotion);
        if board.legal(exact) {
            return Some(exact);
        }
        if self.promotion.is_some() {
            return None;
        }

        let candidates: Vec<ChessMove> = MoveGen::new_legal(board)
            .filter(|m| m.get_source() == self.from && m.get_dest() == self.to)
            .collect();

        candidates
            .iter()
            .find(|m| m.get_promotion() == Some(Piece::Queen))
            .or_else(|| candidates.first())
            .copied()
    }
}

impl From<ChessMove> for MoveSpec {
    fn from(m: ChessMove) -> Self {
        Self {
            from: m.get_source(),
            to: m.get_dest(),
            promotion: m.get_promotion(),
        }
    }
}

fn parse_square(file: u8, rank: u8) -> Option<Square> {
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    ))
}

/// Parse a UCI move string; the result is not checked for legality.
pub fn parse_uci_move(uci: &str) -> Option<ChessMove> {
    let spec = MoveSpec::parse_uci(uci).ok()?;
    Some(ChessMove::new(spec.from, spec.to, spec.promotion))
}

/// Format a move in UCI notation (`e2e4`, `e7e8q`).
pub fn move_to_uci(m: ChessMove) -> String {
    format!(
        "{}{}{}",
        m.get_source(),
        m.get_dest(),
        m.get_promotion()
            .map(|p| match p {
                Piece::Queen => "q",
                Piece::Rook => "r",
                Piece::Bishop => "b",
                Piece::Knight => "n",
                _ => "",
            })
            .unwrap_or("")
    )
}
