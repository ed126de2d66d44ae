#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analysis_session::{
    AnalysisError, AnalysisRequest, AnalysisResponse, AnalysisSettings, EvaluationClient,
};
use chess::{Board, ChessMove};
use chess_core::moves::parse_uci_move;
use tokio::sync::mpsc;

/// How long a test waits for the worker before failing.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn settings() -> AnalysisSettings {
    AnalysisSettings {
        depth: 12,
        variation_count: 2,
        verify_depth: None,
        shutdown_grace: Duration::from_millis(200),
    }
}

pub fn mv(uci: &str) -> ChessMove {
    parse_uci_move(uci).expect("valid uci move")
}

pub fn board(fen: &str) -> Board {
    Board::from_str(fen).expect("valid fen")
}

pub fn response(score: i32, best: &str) -> AnalysisResponse {
    AnalysisResponse {
        score,
        principal_variation: vec![mv(best)],
        secondary_variation: None,
    }
}

pub fn response_with_alternative(score: i32, best: &str, second: &str) -> AnalysisResponse {
    AnalysisResponse {
        secondary_variation: Some(mv(second)),
        ..response(score, best)
    }
}

/// What the scripted engine does with the next request.
pub enum Reply {
    Respond(AnalysisResponse),
    Fail(AnalysisError),
    /// Never answer
    Hang,
}

/// Engine whose answers are fed one at a time by the test.
pub struct ScriptedEngine {
    requests: mpsc::UnboundedSender<AnalysisRequest>,
    replies: mpsc::UnboundedReceiver<Reply>,
    shutdowns: Arc<AtomicUsize>,
}

/// Test side of a [`ScriptedEngine`].
pub struct EngineControl {
    requests: mpsc::UnboundedReceiver<AnalysisRequest>,
    replies: mpsc::UnboundedSender<Reply>,
    shutdowns: Arc<AtomicUsize>,
}

pub fn scripted_engine() -> (ScriptedEngine, EngineControl) {
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let (replies_tx, replies_rx) = mpsc::unbounded_channel();
    let shutdowns = Arc::new(AtomicUsize::new(0));
    (
        ScriptedEngine {
            requests: requests_tx,
            replies: replies_rx,
            shutdowns: shutdowns.clone(),
        },
        EngineControl {
            requests: requests_rx,
            replies: replies_tx,
            shutdowns,
        },
    )
}

impl EvaluationClient for ScriptedEngine {
    async fn analyze(
        &mut self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, AnalysisError> {
        let _ = self.requests.send(*request);
        match self.replies.recv().await {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Hang) => std::future::pending::<Result<AnalysisResponse, AnalysisError>>().await,
            None => Err(AnalysisError::Engine("script finished".into())),
        }
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

impl EngineControl {
    /// Wait for the engine to receive its next request.
    pub async fn next_request(&mut self) -> AnalysisRequest {
        tokio::time::timeout(STEP_TIMEOUT, self.requests.recv())
            .await
            .expect("engine request timed out")
            .expect("engine dropped")
    }

    /// Whether a request arrived that has not been taken yet.
    pub fn has_pending_request(&mut self) -> bool {
        self.requests.try_recv().is_ok()
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.send(reply).expect("engine dropped");
    }

    pub fn respond(&self, response: AnalysisResponse) {
        self.reply(Reply::Respond(response));
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// Engine that answers at once from a function of the request.
pub struct FnEngine<F> {
    answer: F,
    pub calls: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
}

pub fn fn_engine<F>(answer: F) -> FnEngine<F>
where
    F: FnMut(&AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> + Send + 'static,
{
    FnEngine {
        answer,
        calls: Arc::new(AtomicUsize::new(0)),
        shutdowns: Arc::new(AtomicUsize::new(0)),
    }
}

impl<F> EvaluationClient for FnEngine<F>
where
    F: FnMut(&AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> + Send + 'static,
{
    async fn analyze(
        &mut self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)(request)
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Level evaluation that always recommends the first legal move.
pub fn first_legal_move(request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
    let best = chess::MoveGen::new_legal(&request.position)
        .next()
        .ok_or_else(|| AnalysisError::Engine("no legal moves".into()))?;
    Ok(AnalysisResponse {
        score: 0,
        principal_variation: vec![best],
        secondary_variation: None,
    })
}
