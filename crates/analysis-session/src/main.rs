//! Terminal front end for the analysis session.
//!
//! Reads commands from stdin and prints the board state after every change.
//! Moves are accepted in UCI (`e2e4`) or SAN (`Nf3`).

use analysis_session::chess_core::notation::format_move_list;
use analysis_session::chess_core::snapshot::Snapshot;
use analysis_session::{AnalysisSession, SessionConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const HELP: &str = "commands: <move> | undo | redo | reset | show | json | help | quit";

enum Command<'a> {
    Move(&'a str),
    Undo,
    Redo,
    Reset,
    Show,
    Json,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    let command = match line {
        "" => return None,
        "undo" | "u" => Command::Undo,
        "redo" | "r" => Command::Redo,
        "reset" => Command::Reset,
        "show" | "s" => Command::Show,
        "json" => Command::Json,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        mv => Command::Move(mv),
    };
    Some(command)
}

/// Pawns from White's side; the display series is already clamped.
fn format_score(score: i32) -> String {
    format!("{:+.2}", f64::from(score) / 100.0)
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("{}", snapshot.fen);
    if !snapshot.move_history_san.is_empty() {
        println!("{}", format_move_list(&snapshot.move_history_san));
    }

    let last_classified = snapshot
        .classifications
        .len()
        .checked_sub(1)
        .and_then(|i| snapshot.move_history_san.get(i).zip(snapshot.classifications.get(i)));
    if let Some((san, classification)) = last_classified {
        println!("last classified: {san} ({classification})");
    }

    match snapshot.current_score {
        Some(score) => println!("eval: {}", format_score(score)),
        None => println!("eval: -"),
    }
    if let Some(best) = &snapshot.recommended_move {
        println!("best: {best}");
    }
    if let (Some(white), Some(black)) = (snapshot.white_accuracy, snapshot.black_accuracy) {
        println!("accuracy: white {white:.1}% black {black:.1}%");
    }
    println!("[{}] {}", snapshot.side_to_move, snapshot.status_message);
}

fn print_json(snapshot: &Snapshot) {
    match serde_json::to_string_pretty(snapshot) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = SessionConfig::load()?;
    info!(
        stockfish_path = %config.stockfish_path,
        depth = config.analysis.depth,
        multipv = config.analysis.variation_count,
        "Config loaded"
    );

    let mut session = AnalysisSession::start(&config).await;
    println!("{HELP}");
    print_snapshot(&session.snapshot());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let Some(command) = parse_command(&line) else {
                    continue;
                };
                match command {
                    Command::Move(text) => {
                        if let Err(e) = session.make_move_text(text) {
                            println!("{e}");
                            continue;
                        }
                    }
                    Command::Undo => {
                        if session.undo().is_none() {
                            println!("nothing to undo");
                            continue;
                        }
                    }
                    Command::Redo => {
                        if session.redo().is_none() {
                            println!("nothing to redo");
                            continue;
                        }
                    }
                    Command::Reset => session.reset(),
                    Command::Show => {}
                    Command::Json => {
                        print_json(&session.snapshot());
                        continue;
                    }
                    Command::Help => {
                        println!("{HELP}");
                        continue;
                    }
                    Command::Quit => break,
                }
                print_snapshot(&session.snapshot());
            }
            Some(snapshot) = session.next_update() => {
                print_snapshot(&snapshot);
            }
        }
    }

    if let Err(e) = session.close().await {
        warn!(error = %e, "Shutdown incomplete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(35), "+0.35");
        assert_eq!(format_score(-120), "-1.20");
        assert_eq!(format_score(1000), "+10.00");
    }

    #[test]
    fn test_parse_command() {
        assert!(parse_command("   ").is_none());
        assert!(matches!(parse_command("undo"), Some(Command::Undo)));
        assert!(matches!(parse_command(" e2e4 "), Some(Command::Move("e2e4"))));
    }
}
