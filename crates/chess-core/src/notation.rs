//! SAN rendering of UCI move lists using shakmaty.

use shakmaty::{san::San, uci::UciMove, CastlingMode, Chess, Move, Position};

/// The legal move `uci` denotes in `pos`, if any.
fn parse_legal(pos: &Chess, uci: &str) -> Option<Move> {
    uci.parse::<UciMove>().ok()?.to_move(pos).ok()
}

/// Replay UCI moves from the start position, calling `on_move` before each
/// move is played. Stops at the first move shakmaty rejects and returns the
/// position reached and the number of moves played.
fn replay_with<F>(uci_moves: &[String], mut on_move: F) -> (Chess, usize)
where
    F: FnMut(&Chess, &Move),
{
    let mut pos = Chess::default();
    for (i, uci_str) in uci_moves.iter().enumerate() {
        let Some(legal_move) = parse_legal(&pos, uci_str) else {
            return (pos, i);
        };
        on_move(&pos, &legal_move);
        pos.play_unchecked(legal_move);
    }
    (pos, uci_moves.len())
}

fn replay(uci_moves: &[String]) -> (Chess, usize) {
    replay_with(uci_moves, |_, _| {})
}

/// SAN for every move of a line. From the first move that cannot be
/// converted onward, the UCI text is kept as is.
pub fn san_line(uci_moves: &[String]) -> Vec<String> {
    let mut sans = Vec::with_capacity(uci_moves.len());
    let (_, replayed) = replay_with(uci_moves, |pos, m| {
        sans.push(San::from_move(pos, m.clone()).to_string());
    });
    sans.extend(uci_moves[replayed..].iter().cloned());
    sans
}

/// SAN of `uci` played after `history`.
pub fn uci_to_san(history: &[String], uci: &str) -> Option<String> {
    let (pos, replayed) = replay(history);
    if replayed != history.len() {
        return None;
    }
    let legal_move = parse_legal(&pos, uci)?;
    Some(San::from_move(&pos, legal_move).to_string())
}

/// UCI text of a SAN move played after `history`.
pub fn san_to_uci(history: &[String], san: &str) -> Option<String> {
    let (pos, replayed) = replay(history);
    if replayed != history.len() {
        return None;
    }
    let san: San = san
        .trim_end_matches(|c: char| c == '+' || c == '#' || c == '!' || c == '?')
        .parse()
        .ok()?;
    let legal_move = san.to_move(&pos).ok()?;
    Some(legal_move.to_uci(CastlingMode::Standard).to_string())
}

/// Format SAN moves as a numbered line, e.g. `1. e4 e5 2. Nf3`.
pub fn format_move_list(sans: &[String]) -> String {
    let mut formatted = String::new();
    for (i, san) in sans.iter().enumerate() {
        if i % 2 == 0 {
            if !formatted.is_empty() {
                formatted.push(' ');
            }
            formatted.push_str(&format!("{}. {}", i / 2 + 1, san));
        } else {
            formatted.push_str(&format!(" {}", san));
        }
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(moves: &str) -> Vec<String> {
        moves.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_san_line() {
        let sans = san_line(&line("e2e4 e7e5 g1f3 b8c6 f1b5"));
        assert_eq!(sans, vec!["e4", "e5", "Nf3", "Nc6", "Bb5"]);
    }

    #[test]
    fn test_san_line_falls_back_to_uci() {
        let sans = san_line(&line("e2e4 e2e4 g1f3"));
        assert_eq!(sans, vec!["e4", "e2e4", "g1f3"]);
    }

    #[test]
    fn test_uci_to_san_after_history() {
        assert_eq!(uci_to_san(&line("e2e4 e7e5"), "g1f3").as_deref(), Some("Nf3"));
        assert_eq!(uci_to_san(&[], "e2e5"), None);
    }

    #[test]
    fn test_san_to_uci() {
        assert_eq!(san_to_uci(&line("e2e4 e7e5"), "Nf3").as_deref(), Some("g1f3"));
        assert_eq!(san_to_uci(&[], "e4+").as_deref(), Some("e2e4"));
        assert_eq!(san_to_uci(&[], "Ke2"), None);
    }

    #[test]
    fn test_format_move_list() {
        let sans = line("e4 e5 Nf3");
        assert_eq!(format_move_list(&sans), "1. e4 e5 2. Nf3");
        assert_eq!(format_move_list(&[]), "");
    }
}
