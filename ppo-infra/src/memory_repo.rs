//! In-process stores with the same contracts as the Postgres repositories.
//!
//! Used by the test suites and for running the service without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ppo_core::repository::{OrderRepository, WorkflowRepository};
use ppo_core::{CoreError, CoreResult, Order, OrderStatus, RunState, WorkflowKind, WorkflowRun};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create(&self, order: &Order) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(CoreError::internal(
                "creating order",
                format!("duplicate order id {}", order.id),
            ));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> CoreResult<Order> {
        self.orders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("order {} not found", id)))
    }

    async fn find_by_loan_ref(&self, loan_ref: &str) -> CoreResult<Order> {
        self.orders
            .read()
            .await
            .values()
            .filter(|o| o.loan_ref == loan_ref)
            .max_by_key(|o| o.created_at)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("order with loan {} not found", loan_ref)))
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("order {} not found", id)))?;
        order.update_status(status);
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("order {} not found", id)))?;

        if order.status != expected {
            return Err(CoreError::conflict(format!(
                "order {} is {}, expected {}",
                id, order.status, expected
            )));
        }
        order.update_status(next);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryWorkflowRepository {
    runs: RwLock<HashMap<Uuid, WorkflowRun>>,
}

impl MemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_running_cancellation_of(run: &WorkflowRun, order_id: Option<Uuid>) -> bool {
    run.kind == WorkflowKind::Cancellation
        && run.state == RunState::Running
        && order_id.is_some()
        && run.order_id == order_id
}

#[async_trait]
impl WorkflowRepository for MemoryWorkflowRepository {
    async fn start(&self, run: &WorkflowRun) -> CoreResult<()> {
        let mut runs = self.runs.write().await;
        if run.kind == WorkflowKind::Cancellation
            && runs.values().any(|r| is_running_cancellation_of(r, run.order_id))
        {
            return Err(CoreError::conflict(format!(
                "a cancellation for order {} is already in progress",
                run.order_id.map(|id| id.to_string()).unwrap_or_default()
            )));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn save(&self, run: &WorkflowRun) -> CoreResult<()> {
        let mut runs = self.runs.write().await;
        if !runs.contains_key(&run.id) {
            return Err(CoreError::not_found(format!("workflow run {} not found", run.id)));
        }
        if run.kind == WorkflowKind::Cancellation
            && run.state == RunState::Running
            && runs
                .values()
                .any(|r| r.id != run.id && is_running_cancellation_of(r, run.order_id))
        {
            return Err(CoreError::conflict(format!(
                "a cancellation for order {} is already in progress",
                run.order_id.map(|id| id.to_string()).unwrap_or_default()
            )));
        }

        let mut stored = run.clone();
        stored.updated_at = Utc::now();
        runs.insert(run.id, stored);
        Ok(())
    }

    async fn claim(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<WorkflowRun> {
        let mut runs = self.runs.write().await;
        let current = runs
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("workflow run {} not found", id)))?;

        if !current.is_resumable(stale_before) {
            return Err(CoreError::conflict(format!(
                "workflow run {} is {} and cannot be resumed",
                id, current.state
            )));
        }
        if current.kind == WorkflowKind::Cancellation
            && runs
                .values()
                .any(|r| r.id != id && is_running_cancellation_of(r, current.order_id))
        {
            return Err(CoreError::conflict(format!(
                "workflow run {} cannot be claimed, its order already has a running cancellation",
                id
            )));
        }

        let run = runs
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("workflow run {} not found", id)))?;
        run.state = RunState::Running;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn get(&self, id: Uuid) -> CoreResult<WorkflowRun> {
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("workflow run {} not found", id)))
    }

    async fn list_by_state(&self, state: RunState) -> CoreResult<Vec<WorkflowRun>> {
        let mut runs: Vec<WorkflowRun> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.state == state)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.created_at);
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppo_core::{NewOrder, NewOrderItem};
    use ppo_shared::Masked;

    fn order(loan_ref: &str) -> Order {
        Order::new(NewOrder {
            user_id: Uuid::new_v4(),
            loan_ref: loan_ref.to_string(),
            currency: "SAR".to_string(),
            card_token: Masked::from("tok"),
            total_amount: 1000,
            items: vec![NewOrderItem {
                product_ref: "sku".to_string(),
                quantity: 1,
                unit_price: 1000,
            }],
        })
    }

    #[tokio::test]
    async fn lookups_by_id_and_loan_ref() {
        let repo = MemoryOrderRepository::new();
        let o = order("loan-9");
        repo.create(&o).await.unwrap();

        assert_eq!(repo.get_by_id(o.id).await.unwrap().id, o.id);
        assert_eq!(repo.find_by_loan_ref("loan-9").await.unwrap().id, o.id);
        assert!(matches!(
            repo.find_by_loan_ref("loan-x").await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_by_id(Uuid::new_v4()).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_status_on_missing_order_is_not_found() {
        let repo = MemoryOrderRepository::new();
        let result = repo.update_status(Uuid::new_v4(), OrderStatus::Refunded).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn transition_requires_expected_status() {
        let repo = MemoryOrderRepository::new();
        let o = order("loan-1");
        repo.create(&o).await.unwrap();

        repo.transition_status(o.id, OrderStatus::Created, OrderStatus::Refunded)
            .await
            .unwrap();

        let again = repo
            .transition_status(o.id, OrderStatus::Created, OrderStatus::Refunded)
            .await;
        assert!(matches!(again, Err(CoreError::Conflict(_))));
        assert_eq!(repo.get_by_id(o.id).await.unwrap().status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn one_running_cancellation_per_order() {
        let repo = MemoryWorkflowRepository::new();
        let o = order("loan-1");

        let mut first = WorkflowRun::cancellation(&o);
        repo.start(&first).await.unwrap();

        let second = WorkflowRun::cancellation(&o);
        assert!(matches!(repo.start(&second).await, Err(CoreError::Conflict(_))));

        first.complete();
        repo.save(&first).await.unwrap();
        repo.start(&second).await.unwrap();

        assert_eq!(repo.list_by_state(RunState::Running).await.unwrap().len(), 1);
        assert_eq!(repo.list_by_state(RunState::Completed).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_failed_run_is_claimed_once() {
        let repo = MemoryWorkflowRepository::new();
        let mut run = WorkflowRun::cancellation(&order("loan-1"));
        repo.start(&run).await.unwrap();
        run.fail(&CoreError::conflict("refund declined"));
        repo.save(&run).await.unwrap();

        let claimed = repo.claim(run.id, Utc::now()).await.unwrap();
        assert_eq!(claimed.state, RunState::Running);

        // The claimed run now has a fresh checkpoint, so it is not up for grabs.
        let cutoff = claimed.updated_at - chrono::Duration::minutes(5);
        assert!(matches!(repo.claim(run.id, cutoff).await, Err(CoreError::Conflict(_))));
        assert!(matches!(
            repo.claim(Uuid::new_v4(), cutoff).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stale_running_run_can_be_claimed() {
        let repo = MemoryWorkflowRepository::new();
        let run = WorkflowRun::cancellation(&order("loan-1"));
        repo.start(&run).await.unwrap();

        let fresh_cutoff = run.updated_at - chrono::Duration::minutes(5);
        assert!(matches!(repo.claim(run.id, fresh_cutoff).await, Err(CoreError::Conflict(_))));

        let stale_cutoff = Utc::now() + chrono::Duration::seconds(1);
        let claimed = repo.claim(run.id, stale_cutoff).await.unwrap();
        assert_eq!(claimed.id, run.id);
        assert_eq!(claimed.state, RunState::Running);
    }

    #[tokio::test]
    async fn completed_run_is_never_claimed() {
        let repo = MemoryWorkflowRepository::new();
        let mut run = WorkflowRun::cancellation(&order("loan-1"));
        repo.start(&run).await.unwrap();
        run.complete();
        repo.save(&run).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::days(1);
        assert!(matches!(repo.claim(run.id, cutoff).await, Err(CoreError::Conflict(_))));
    }
}
