//! Background task that owns the evaluation client.
//!
//! The session sends at most one job at a time; the worker answers each
//! job with exactly one report. When the job channel closes the worker
//! stops the engine and exits.

use chess_core::game::PositionKey;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{AnalysisRequest, AnalysisResponse, EvaluationClient};
use crate::error::AnalysisError;

pub(crate) struct Job {
    pub request_id: u64,
    pub key: PositionKey,
    pub request: AnalysisRequest,
    /// Deeper single-line search for the post-move score
    pub verify_depth: Option<u8>,
}

#[derive(Debug)]
pub(crate) struct Evaluation {
    pub response: AnalysisResponse,
    pub verified_score: Option<i32>,
}

#[derive(Debug)]
pub(crate) struct WorkerReport {
    pub request_id: u64,
    pub key: PositionKey,
    pub outcome: Result<Evaluation, AnalysisError>,
}

pub(crate) struct Worker {
    pub jobs: mpsc::Sender<Job>,
    pub reports: mpsc::UnboundedReceiver<WorkerReport>,
    pub task: JoinHandle<()>,
}

impl Worker {
    /// Spawn the worker task. Must be called from within a tokio runtime.
    pub fn spawn<C: EvaluationClient>(client: C) -> Self {
        // Capacity 1: the session only sends while idle
        let (jobs_tx, jobs_rx) = mpsc::channel(1);
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(client, jobs_rx, reports_tx));

        Self {
            jobs: jobs_tx,
            reports: reports_rx,
            task,
        }
    }
}

async fn run<C: EvaluationClient>(
    mut client: C,
    mut jobs: mpsc::Receiver<Job>,
    reports: mpsc::UnboundedSender<WorkerReport>,
) {
    while let Some(job) = jobs.recv().await {
        debug!(request_id = job.request_id, ply = job.key.ply, "Evaluating position");
        let outcome = evaluate(&mut client, &job).await;

        let report = WorkerReport {
            request_id: job.request_id,
            key: job.key,
            outcome,
        };
        if reports.send(report).is_err() {
            debug!("Session gone, dropping evaluation");
            break;
        }
    }

    info!("Analysis worker stopping engine");
    client.shutdown().await;
}

async fn evaluate<C: EvaluationClient>(
    client: &mut C,
    job: &Job,
) -> Result<Evaluation, AnalysisError> {
    let response = client.analyze(&job.request).await?;

    let verified_score = match job.verify_depth {
        Some(depth) if depth != job.request.depth => {
            let request = AnalysisRequest {
                depth,
                variation_count: 1,
                ..job.request
            };
            match client.analyze(&request).await {
                Ok(deep) => Some(deep.score),
                Err(e) => {
                    warn!(error = %e, depth, "Verification search failed, keeping multi-line score");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(Evaluation {
        response,
        verified_score,
    })
}
