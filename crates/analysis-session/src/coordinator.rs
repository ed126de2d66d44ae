//! Analysis session: game state plus a single-flight evaluation pipeline.
//!
//! All game mutation happens on the task that owns the session. The worker
//! task only answers jobs; its reports are applied here, in request order.
//! Each report is matched to the position it was requested for by
//! `PositionKey`, so results for taken-back or replaced moves are dropped.

use chess::ChessMove;
use chess_core::classify::{self, Verdict, MATE_SCORE};
use chess_core::game::{GameState, PositionKey};
use chess_core::history::EvaluationPoint;
use chess_core::moves::{move_to_uci, MoveSpec};
use chess_core::notation;
use chess_core::position::Outcome;
use chess_core::snapshot::Snapshot;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, error, info, warn};

use crate::client::{AnalysisRequest, EvaluationClient};
use crate::config::{AnalysisSettings, SessionConfig};
use crate::error::AnalysisError;
use crate::stockfish::StockfishEngine;
use crate::worker::{Evaluation, Job, Worker, WorkerReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No request in flight
    Idle,
    /// One request in flight. `superseded` records that the game changed
    /// after it was issued.
    Requesting {
        request_id: u64,
        key: PositionKey,
        superseded: bool,
    },
    /// Shutting down, no new requests
    Closing,
    /// No engine; moves can still be played
    Disabled,
}

pub struct AnalysisSession {
    game: GameState,
    state: CoordinatorState,
    settings: AnalysisSettings,
    worker: Option<Worker>,
    next_request_id: u64,
    requests_issued: u64,
    stale_discards: u64,
    last_error: Option<AnalysisError>,
    disabled_reason: Option<AnalysisError>,
    notice: Option<String>,
}

impl AnalysisSession {
    /// Start Stockfish from `config`. If the engine cannot be started the
    /// session runs without analysis.
    pub async fn start(config: &SessionConfig) -> Self {
        match StockfishEngine::new(
            &config.stockfish_path,
            config.engine_threads,
            config.engine_hash_mb,
        )
        .await
        {
            Ok(engine) => {
                info!(path = %config.stockfish_path, "Stockfish engine ready");
                Self::with_client(engine, config.analysis.clone())
            }
            Err(e) => {
                error!(error = %e, "Engine unavailable, analysis disabled");
                Self::offline(e, config.analysis.clone())
            }
        }
    }

    /// Run analysis through `client`. Must be called within a tokio runtime.
    pub fn with_client<C: EvaluationClient>(client: C, settings: AnalysisSettings) -> Self {
        let mut session = Self::new(settings, Some(Worker::spawn(client)));
        session.pump();
        session
    }

    /// A session without an engine.
    pub fn offline(reason: AnalysisError, settings: AnalysisSettings) -> Self {
        let mut session = Self::new(settings, None);
        session.state = CoordinatorState::Disabled;
        session.disabled_reason = Some(reason);
        session
    }

    fn new(settings: AnalysisSettings, worker: Option<Worker>) -> Self {
        Self {
            game: GameState::new(),
            state: CoordinatorState::Idle,
            settings,
            worker,
            next_request_id: 1,
            requests_issued: 0,
            stale_discards: 0,
            last_error: None,
            disabled_reason: None,
            notice: None,
        }
    }

    // ---- User actions ----

    pub fn make_move(&mut self, spec: MoveSpec) -> Result<ChessMove, AnalysisError> {
        match self.game.make_move(spec) {
            Ok(m) => {
                info!(mv = %move_to_uci(m), ply = self.game.ply(), "Move played");
                self.position_changed();
                Ok(m)
            }
            Err(e) => {
                debug!(error = %e, "Move rejected");
                self.notice = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Play a move given in UCI or SAN.
    pub fn make_move_text(&mut self, text: &str) -> Result<ChessMove, AnalysisError> {
        let spec = match MoveSpec::parse_uci(text) {
            Ok(spec) => spec,
            Err(uci_err) => {
                let history = self.game.move_history_uci();
                match notation::san_to_uci(&history, text) {
                    Some(uci) => MoveSpec::parse_uci(&uci)?,
                    None => {
                        self.notice = Some(uci_err.to_string());
                        return Err(uci_err.into());
                    }
                }
            }
        };
        self.make_move(spec)
    }

    pub fn undo(&mut self) -> Option<ChessMove> {
        let m = self.game.undo()?;
        info!(mv = %move_to_uci(m), ply = self.game.ply(), "Move taken back");
        self.position_changed();
        Some(m)
    }

    pub fn redo(&mut self) -> Option<ChessMove> {
        let m = self.game.redo()?;
        info!(mv = %move_to_uci(m), ply = self.game.ply(), "Move replayed");
        self.position_changed();
        Some(m)
    }

    pub fn reset(&mut self) {
        info!("Game reset");
        self.game.reset();
        self.position_changed();
    }

    // ---- Coordination ----

    fn position_changed(&mut self) {
        self.notice = None;
        match self.state {
            CoordinatorState::Requesting {
                request_id, key, ..
            } => {
                self.state = CoordinatorState::Requesting {
                    request_id,
                    key,
                    superseded: true,
                };
            }
            CoordinatorState::Idle => self.pump(),
            CoordinatorState::Closing | CoordinatorState::Disabled => {}
        }
    }

    /// Settle terminal positions locally and send the next request, if any.
    fn pump(&mut self) {
        while self.state == CoordinatorState::Idle {
            let Some(ply) = self.game.pending_ply() else {
                break;
            };
            let Some(key) = self.game.position_key(ply) else {
                break;
            };

            if let Some(outcome) = self.game.terminal_status_at(ply) {
                if self.settle_terminal(key, outcome) {
                    continue;
                }
                break;
            }

            let Some(position) = self.game.board_at(ply) else {
                break;
            };
            if !self.dispatch(key, position) {
                break;
            }
        }
    }

    /// Send one job to the worker. Returns whether a request is now in flight.
    fn dispatch(&mut self, key: PositionKey, position: chess::Board) -> bool {
        let Some(worker) = &self.worker else {
            return false;
        };

        let request_id = self.next_request_id;
        let job = Job {
            request_id,
            key,
            request: AnalysisRequest {
                position,
                depth: self.settings.depth,
                variation_count: self.settings.variation_count.max(1),
            },
            verify_depth: if key.ply > 0 {
                self.settings.verify_depth
            } else {
                None
            },
        };

        match worker.jobs.try_send(job) {
            Ok(()) => {
                self.next_request_id += 1;
                self.requests_issued += 1;
                self.state = CoordinatorState::Requesting {
                    request_id,
                    key,
                    superseded: false,
                };
                debug!(request_id, ply = key.ply, "Evaluation requested");
                true
            }
            Err(TrySendError::Full(_)) => {
                // Only reachable if a job was sent outside the idle state
                warn!(request_id, "Worker mailbox full, request skipped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.disable(AnalysisError::WorkerGone);
                false
            }
        }
    }

    /// Record the final position locally. Returns whether it was applied.
    fn settle_terminal(&mut self, key: PositionKey, outcome: Outcome) -> bool {
        let point = EvaluationPoint::score_only(outcome.white_score(MATE_SCORE));
        let verdict = self.verdict_for(key.ply, point.score);
        match self.game.apply_result(key, verdict, point) {
            Ok(_) => {
                info!(ply = key.ply, outcome = outcome.describe(), "Game over");
                true
            }
            Err(e) => {
                warn!(error = %e, "Could not record final position");
                false
            }
        }
    }

    /// Classify the move that produced `ply`, given the post-move score.
    fn verdict_for(&self, ply: usize, after: i32) -> Option<Verdict> {
        let ctx = self.game.move_context(ply)?;
        if ctx.before.best_move == Some(ctx.mv) {
            return Some(Verdict::engine_best());
        }
        Some(classify::classify(ctx.before.score, after, ctx.mover))
    }

    fn handle_report(&mut self, report: WorkerReport) {
        let superseded = match self.state {
            CoordinatorState::Requesting {
                request_id,
                superseded,
                ..
            } if request_id == report.request_id => superseded,
            _ => {
                debug!(request_id = report.request_id, "Ignoring unexpected report");
                return;
            }
        };
        self.state = CoordinatorState::Idle;

        match report.outcome {
            Ok(evaluation) => {
                self.apply_evaluation(report.key, evaluation);
                self.pump();
            }
            Err(e) => {
                warn!(error = %e, ply = report.key.ply, "Evaluation failed");
                self.last_error = Some(AnalysisError::EvaluationFailed(e.to_string()));
                // No retry of the same request; a change made meanwhile is a new trigger
                if superseded {
                    self.pump();
                }
            }
        }
    }

    fn apply_evaluation(&mut self, key: PositionKey, evaluation: Evaluation) {
        let response = evaluation.response;
        let after = evaluation.verified_score.unwrap_or(response.score);
        let verdict = self.verdict_for(key.ply, after);
        let point = EvaluationPoint {
            score: after,
            best_move: response.best_move(),
            alternative_move: response.secondary_variation,
        };

        match self.game.apply_result(key, verdict, point) {
            Ok(Some(classified)) => {
                self.last_error = None;
                info!(
                    ply = key.ply,
                    mv = %move_to_uci(classified.mv),
                    classification = %classified.classification,
                    cp_loss = classified.cp_loss,
                    score = after,
                    "Move classified"
                );
            }
            Ok(None) => {
                self.last_error = None;
                info!(score = after, "Initial position evaluated");
            }
            Err(e) => {
                self.stale_discards += 1;
                debug!(error = %e, "Discarding stale evaluation");
            }
        }
    }

    fn disable(&mut self, reason: AnalysisError) {
        error!(error = %reason, "Analysis disabled");
        self.worker = None;
        self.state = CoordinatorState::Disabled;
        self.disabled_reason = Some(reason);
    }

    // ---- Control loop integration ----

    /// Apply a finished evaluation if one is waiting. Never blocks.
    pub fn poll(&mut self) -> Option<Snapshot> {
        let worker = self.worker.as_mut()?;
        match worker.reports.try_recv() {
            Ok(report) => {
                self.handle_report(report);
                Some(self.snapshot())
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.disable(AnalysisError::WorkerGone);
                Some(self.snapshot())
            }
        }
    }

    /// Wait for the in-flight evaluation and apply it. Returns `None` at
    /// once when nothing is in flight. Cancel-safe, usable in `select!`.
    pub async fn next_update(&mut self) -> Option<Snapshot> {
        if !self.is_requesting() {
            return None;
        }
        let worker = self.worker.as_mut()?;
        match worker.reports.recv().await {
            Some(report) => self.handle_report(report),
            None => self.disable(AnalysisError::WorkerGone),
        }
        Some(self.snapshot())
    }

    /// Wait until no evaluation is in flight.
    pub async fn settle(&mut self) -> Snapshot {
        while self.next_update().await.is_some() {}
        self.snapshot()
    }

    /// Stop the worker. The in-flight evaluation gets `shutdown_grace` to
    /// finish; after that the worker and its engine are abandoned.
    pub async fn close(mut self) -> Result<(), AnalysisError> {
        self.state = CoordinatorState::Closing;
        let Some(Worker {
            jobs,
            reports,
            mut task,
        }) = self.worker.take()
        else {
            return Ok(());
        };

        // Closing both channels tells the worker to quit the engine and exit
        drop(jobs);
        drop(reports);

        let grace = self.settings.shutdown_grace;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => {
                info!("Analysis worker stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Analysis worker ended abnormally");
                Ok(())
            }
            Err(_) => {
                task.abort();
                let err = AnalysisError::ShutdownTimeout(grace);
                warn!(error = %err, "Abandoning analysis worker");
                Err(err)
            }
        }
    }

    // ---- Views ----

    pub fn snapshot(&self) -> Snapshot {
        self.game.snapshot(self.status_message())
    }

    pub fn status_message(&self) -> String {
        if let Some(outcome) = self.game.outcome() {
            return outcome.describe().to_string();
        }
        if let Some(reason) = &self.disabled_reason {
            return format!("Analysis disabled: {reason}");
        }
        if let Some(notice) = &self.notice {
            return notice.clone();
        }
        if let Some(e) = &self.last_error {
            return format!("Analysis error: {e}");
        }
        if let Some(claim) = self.game.claimable_draw() {
            return claim.describe().to_string();
        }
        if self.is_requesting() {
            return "Analyzing...".to_string();
        }
        "Ready".to_string()
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn is_requesting(&self) -> bool {
        matches!(self.state, CoordinatorState::Requesting { .. })
    }

    pub fn is_analysis_enabled(&self) -> bool {
        self.worker.is_some()
    }

    pub fn last_error(&self) -> Option<&AnalysisError> {
        self.last_error.as_ref()
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    pub fn stale_discards(&self) -> u64 {
        self.stale_discards
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn filler_job(game: &GameState) -> Job {
        Job {
            request_id: 0,
            key: game.position_key(0).unwrap(),
            request: AnalysisRequest {
                position: chess::Board::default(),
                depth: 1,
                variation_count: 1,
            },
            verify_depth: None,
        }
    }

    #[tokio::test]
    async fn test_pump_returns_when_worker_mailbox_is_full() {
        let (jobs, _jobs_rx) = mpsc::channel(1);
        let (_reports_tx, reports) = mpsc::unbounded_channel();
        let worker = Worker {
            jobs,
            reports,
            task: tokio::spawn(async {}),
        };
        let mut session = AnalysisSession::new(AnalysisSettings::default(), Some(worker));
        let job = filler_job(&session.game);
        assert!(session.worker.as_ref().unwrap().jobs.try_send(job).is_ok());

        session.pump();

        assert_eq!(session.state(), CoordinatorState::Idle);
        assert_eq!(session.requests_issued(), 0);
    }

    #[tokio::test]
    async fn test_pump_disables_when_worker_is_gone() {
        let (jobs, jobs_rx) = mpsc::channel(1);
        let (_reports_tx, reports) = mpsc::unbounded_channel();
        drop(jobs_rx);
        let worker = Worker {
            jobs,
            reports,
            task: tokio::spawn(async {}),
        };
        let mut session = AnalysisSession::new(AnalysisSettings::default(), Some(worker));

        session.pump();

        assert_eq!(session.state(), CoordinatorState::Disabled);
        assert!(!session.is_analysis_enabled());
    }
}
