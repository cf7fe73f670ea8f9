use chrono::{DateTime, Utc};
use ppo_core::repository::WorkflowRepository;
use ppo_core::{CoreError, CoreResult, RunState, WorkflowKind, WorkflowRun};
use std::sync::Arc;
use std::time::Duration;

use crate::installments::InstallmentService;
use crate::orders::OrderService;

/// How long a `running` run may go without a checkpoint before it counts as abandoned.
/// Must stay well above the gateway timeout, since one step is one gateway call.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

/// Operator view over the workflow journal. Nothing here runs on its own.
pub struct Reconciler {
    runs: Arc<dyn WorkflowRepository>,
    orders: Arc<OrderService>,
    installments: Arc<InstallmentService>,
    stale_after: Duration,
}

impl Reconciler {
    pub fn new(
        runs: Arc<dyn WorkflowRepository>,
        orders: Arc<OrderService>,
        installments: Arc<InstallmentService>,
        stale_after: Duration,
    ) -> Self {
        Self {
            runs,
            orders,
            installments,
            stale_after,
        }
    }

    pub async fn list_runs(&self, state: RunState) -> CoreResult<Vec<WorkflowRun>> {
        self.runs.list_by_state(state).await
    }

    /// Continue a failed or flagged run, or a `running` one whose worker went away
    /// (request dropped, job deadline hit, process restarted).
    pub async fn resume_run(&self, id: uuid::Uuid) -> CoreResult<WorkflowRun> {
        let stale_before = self.stale_before(Utc::now());
        let run = self.runs.get(id).await?;
        if !run.is_resumable(stale_before) {
            return Err(CoreError::conflict(format!(
                "workflow run {} is {} and cannot be resumed",
                id, run.state
            )));
        }

        match run.kind {
            WorkflowKind::Cancellation => self.orders.resume_cancellation(run, stale_before).await,
            WorkflowKind::InstallmentPayment => self.installments.resume_payment(run, stale_before).await,
        }
    }

    fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
