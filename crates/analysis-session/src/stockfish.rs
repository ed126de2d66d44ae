//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use chess_core::classify::white_score;
use chess_core::moves::parse_uci_move;
use tracing::{debug, warn};

use crate::client::{AnalysisRequest, AnalysisResponse, EvaluationClient};
use crate::error::AnalysisError;

/// Upper bound for `uci`/`isready` round trips at startup
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the process to exit after `quit`
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

/// A single PV line from multi-PV analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PvLine {
    /// Principal variation moves
    pub pv: Vec<String>,
    /// Centipawn score (side to move)
    pub cp: Option<i32>,
    /// Mate in N (side to move)
    pub mate: Option<i32>,
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    multipv: u8,
    closed: bool,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(path: &str, threads: u32, hash_mb: u32) -> Result<Self, AnalysisError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AnalysisError::EngineUnavailable(format!("Failed to spawn {path}: {e}"))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or(AnalysisError::EngineUnavailable("Stockfish stdin not piped".into()))?;
        let stdout = BufReader::new(
            process
                .stdout
                .take()
                .ok_or(AnalysisError::EngineUnavailable("Stockfish stdout not piped".into()))?,
        );

        let mut engine = Self {
            process,
            stdin,
            stdout,
            multipv: 1,
            closed: false,
        };

        match tokio::time::timeout(HANDSHAKE_TIMEOUT, engine.handshake(threads, hash_mb)).await {
            Ok(Ok(())) => Ok(engine),
            Ok(Err(e)) => Err(AnalysisError::EngineUnavailable(e.to_string())),
            Err(_) => Err(AnalysisError::EngineUnavailable(format!(
                "{path} did not complete the UCI handshake within {HANDSHAKE_TIMEOUT:?}"
            ))),
        }
    }

    async fn handshake(&mut self, threads: u32, hash_mb: u32) -> Result<(), AnalysisError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;

        // Configure for analysis
        self.send(&format!("setoption name Threads value {threads}")).await?;
        self.send(&format!("setoption name Hash value {hash_mb}")).await?;
        self.send("setoption name UCI_AnalyseMode value true").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), AnalysisError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| AnalysisError::Engine(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| AnalysisError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Read one trimmed line; end of output is an error.
    async fn read_line(&mut self, line: &mut String) -> Result<(), AnalysisError> {
        line.clear();
        let read = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| AnalysisError::Engine(format!("Failed to read from Stockfish: {e}")))?;
        if read == 0 {
            return Err(AnalysisError::Engine("Stockfish closed its output".into()));
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), AnalysisError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Search a position to a fixed depth and collect `multipv` lines
    pub async fn evaluate_multipv(
        &mut self,
        fen: &str,
        depth: u8,
        multipv: u8,
    ) -> Result<Vec<PvLine>, AnalysisError> {
        let multipv = multipv.max(1);
        if multipv != self.multipv {
            self.send(&format!("setoption name MultiPV value {multipv}"))
                .await?;
            self.multipv = multipv;
        }
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut lines = vec![PvLine::default(); multipv as usize];
        let mut line = String::new();

        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if is_scored_pv_line(trimmed) {
                // Parse multipv index (1-based)
                let pv_idx = parse_multipv_index(trimmed).unwrap_or(1).saturating_sub(1);
                if let Some(entry) = lines.get_mut(pv_idx as usize) {
                    entry.cp = parse_cp(trimmed);
                    entry.mate = parse_mate(trimmed);
                    entry.pv = parse_pv(trimmed);
                }
            } else if trimmed.starts_with("bestmove") {
                debug!(line = trimmed, "SF >");
                break;
            }
        }

        Ok(lines)
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.send("quit").await {
            warn!(error = %e, "Failed to send quit to Stockfish");
        }
        match tokio::time::timeout(QUIT_TIMEOUT, self.process.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Stockfish exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed to wait for Stockfish"),
            Err(_) => {
                warn!("Stockfish ignored quit, killing it");
                if let Err(e) = self.process.start_kill() {
                    warn!(error = %e, "Failed to kill Stockfish");
                }
            }
        }
    }
}

impl EvaluationClient for StockfishEngine {
    async fn analyze(
        &mut self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, AnalysisError> {
        let fen = request.position.to_string();
        let white_to_move = request.position.side_to_move() == chess::Color::White;
        let lines = self
            .evaluate_multipv(&fen, request.depth, request.variation_count)
            .await?;
        response_from_lines(&lines, white_to_move)
    }

    async fn shutdown(&mut self) {
        self.quit().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Turn raw PV lines into a response from White's perspective.
fn response_from_lines(
    lines: &[PvLine],
    white_to_move: bool,
) -> Result<AnalysisResponse, AnalysisError> {
    let top = lines
        .first()
        .filter(|l| !l.pv.is_empty())
        .ok_or_else(|| AnalysisError::MalformedResponse("no principal variation".into()))?;
    if top.cp.is_none() && top.mate.is_none() {
        return Err(AnalysisError::MalformedResponse("no score in top line".into()));
    }

    let principal_variation = top
        .pv
        .iter()
        .map(|uci| {
            parse_uci_move(uci)
                .ok_or_else(|| AnalysisError::MalformedResponse(format!("bad PV move {uci}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let secondary_variation = lines
        .get(1)
        .and_then(|l| l.pv.first())
        .and_then(|uci| parse_uci_move(uci));

    Ok(AnalysisResponse {
        score: white_score(top.cp, top.mate, white_to_move),
        principal_variation,
        secondary_variation,
    })
}

/// Final (non-bound) info line carrying a PV
fn is_scored_pv_line(line: &str) -> bool {
    line.starts_with("info")
        && line.contains(" pv ")
        && !line.contains(" lowerbound")
        && !line.contains(" upperbound")
        && !line.starts_with("info string")
}

/// Value following `key` in a whitespace-separated info line
fn value_after<T: std::str::FromStr>(line: &str, key: &str) -> Option<T> {
    let mut parts = line.split_whitespace();
    while let Some(part) = parts.next() {
        if part == key {
            return parts.next()?.parse().ok();
        }
        if part == "pv" {
            break;
        }
    }
    None
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    value_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    value_after(line, "mate")
}

/// Parse multipv index from info line
fn parse_multipv_index(line: &str) -> Option<u32> {
    value_after(line, "multipv")
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    line.split_whitespace()
        .skip_while(|part| *part != "pv")
        .skip(1)
        .take_while(|part| !part.starts_with("bmc") && *part != "string")
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
        assert_eq!(parse_mate(line), None);
        assert_eq!(parse_multipv_index(line), Some(1));
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 20 score mate -3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(-3));
        assert_eq!(parse_cp(line), None);
    }

    #[test]
    fn test_parse_pv() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 g1f3";
        let pv = parse_pv(line);
        assert_eq!(pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_bound_lines_are_skipped() {
        assert!(is_scored_pv_line("info depth 12 multipv 1 score cp 20 nodes 5 pv d2d4"));
        assert!(!is_scored_pv_line("info depth 12 score cp 20 lowerbound nodes 5 pv d2d4"));
        assert!(!is_scored_pv_line("info depth 12 currmove e2e4 currmovenumber 1"));
    }

    #[test]
    fn test_response_from_black_perspective() {
        let lines = vec![
            PvLine {
                pv: vec!["e7e5".into(), "g1f3".into()],
                cp: Some(30),
                mate: None,
            },
            PvLine {
                pv: vec!["c7c5".into()],
                cp: Some(20),
                mate: None,
            },
        ];
        let response = response_from_lines(&lines, false).unwrap();
        assert_eq!(response.score, -30);
        assert_eq!(response.principal_variation.len(), 2);
        assert_eq!(response.best_move(), parse_uci_move("e7e5"));
        assert_eq!(response.secondary_variation, parse_uci_move("c7c5"));
    }

    #[test]
    fn test_response_without_pv_is_malformed() {
        let lines = vec![PvLine::default()];
        assert!(matches!(
            response_from_lines(&lines, true),
            Err(AnalysisError::MalformedResponse(_))
        ));
    }
}
