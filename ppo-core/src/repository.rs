use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{CoreResult, Order, OrderStatus, RunState, WorkflowRun};

/// Durable storage for order aggregates.
///
/// Storage failures surface as `CoreError::Internal`; missing rows as `CoreError::NotFound`.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order and its items as one unit.
    async fn create(&self, order: &Order) -> CoreResult<()>;

    async fn get_by_id(&self, id: Uuid) -> CoreResult<Order>;

    /// Most recent order financed by the given loan.
    async fn find_by_loan_ref(&self, loan_ref: &str) -> CoreResult<Order>;

    /// Unconditional status write. Does not check transition legality.
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> CoreResult<()>;

    /// Write `next` only if the stored status is still `expected`.
    ///
    /// Fails with `Conflict` when the row exists with another status.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> CoreResult<()>;
}

/// Storage for the workflow run journal.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Open a new run. Fails with `Conflict` if a cancellation run for the same order is
    /// still running.
    async fn start(&self, run: &WorkflowRun) -> CoreResult<()>;

    /// Overwrite the mutable fields of an existing run.
    async fn save(&self, run: &WorkflowRun) -> CoreResult<()>;

    /// Atomically move a resumable run (see `WorkflowRun::is_resumable`) back to
    /// `running` and return it as stored.
    ///
    /// Of several concurrent claims on the same run at most one succeeds; the others get
    /// `Conflict`, as does a claim on a run that is completed or still actively running.
    /// An unknown run is `NotFound`.
    async fn claim(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<WorkflowRun>;

    async fn get(&self, id: Uuid) -> CoreResult<WorkflowRun>;

    /// Runs in the given state, oldest first.
    async fn list_by_state(&self, state: RunState) -> CoreResult<Vec<WorkflowRun>>;
}
