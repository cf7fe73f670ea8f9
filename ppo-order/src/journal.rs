use chrono::{DateTime, Utc};
use ppo_core::repository::WorkflowRepository;
use ppo_core::{CoreError, CoreResult, WorkflowRun, WorkflowStep};
use uuid::Uuid;
use std::sync::Arc;
use tracing::error;

/// Write side of the workflow run journal as seen by the orchestrator.
///
/// Mid-run write failures become `Internal` so the caller stops before its next
/// external call.
#[derive(Clone)]
pub(crate) struct Journal {
    runs: Arc<dyn WorkflowRepository>,
}

impl Journal {
    pub(crate) fn new(runs: Arc<dyn WorkflowRepository>) -> Self {
        Self { runs }
    }

    /// Errors from the store pass through untouched so a duplicate cancellation
    /// surfaces as `Conflict`.
    pub(crate) async fn open(&self, run: &WorkflowRun) -> CoreResult<()> {
        self.runs.start(run).await
    }

    /// Take ownership of a resumable run. Only one of several concurrent callers gets the
    /// run back; the rest see `Conflict` and must not touch any gateway.
    pub(crate) async fn claim(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<WorkflowRun> {
        self.runs.claim(id, stale_before).await
    }

    pub(crate) async fn save(&self, run: &WorkflowRun) -> CoreResult<()> {
        self.runs
            .save(run)
            .await
            .map_err(|e| CoreError::internal("writing workflow journal", e))
    }

    pub(crate) async fn checkpoint(&self, run: &mut WorkflowRun, step: WorkflowStep) -> CoreResult<()> {
        run.advance(step);
        self.save(run).await
    }

    /// Best effort: the workflow error is what the caller reports.
    pub(crate) async fn record_failure(&self, run: &mut WorkflowRun, err: &CoreError) {
        run.fail(err);
        if let Err(e) = self.runs.save(run).await {
            error!(run_id = %run.id, step = %run.step, error = %e, "Failed to record workflow failure");
        }
    }

    /// Store a terminal state. The work itself is already done, so a write failure is
    /// only logged.
    pub(crate) async fn finish(&self, run: &WorkflowRun) {
        if let Err(e) = self.runs.save(run).await {
            error!(run_id = %run.id, state = %run.state, error = %e, "Failed to close workflow run");
        }
    }
}
