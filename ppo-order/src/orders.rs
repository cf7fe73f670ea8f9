use chrono::{DateTime, Utc};
use ppo_core::inventory::Inventory;
use ppo_core::ledger::{LoanLedger, LoanStatus};
use ppo_core::payment::{PaymentProcessor, RefundRequest};
use ppo_core::repository::{OrderRepository, WorkflowRepository};
use ppo_core::{CoreError, CoreResult, NewOrder, Order, OrderStatus, WorkflowRun, WorkflowStep};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::journal::Journal;

/// Result of a cancellation that reached the final status write.
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub run_id: Uuid,
    pub order: Order,
    pub refunded_amount: i64,
    pub refund_ref: Option<String>,
    /// Products whose restock was never attempted or failed.
    pub unrestocked: Vec<String>,
}

/// Order lifecycle and the cancel/refund saga.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    journal: Journal,
    ledger: Arc<dyn LoanLedger>,
    payments: Arc<dyn PaymentProcessor>,
    inventory: Arc<dyn Inventory>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        runs: Arc<dyn WorkflowRepository>,
        ledger: Arc<dyn LoanLedger>,
        payments: Arc<dyn PaymentProcessor>,
        inventory: Arc<dyn Inventory>,
    ) -> Self {
        Self {
            orders,
            journal: Journal::new(runs),
            ledger,
            payments,
            inventory,
        }
    }

    pub async fn create_order(&self, input: NewOrder) -> CoreResult<Order> {
        let order = Order::new(input);
        self.orders.create(&order).await?;

        info!(order_id = %order.id, loan_id = %order.loan_ref, items = order.items.len(), "Order created");
        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> CoreResult<Order> {
        self.orders.get_by_id(id).await
    }

    /// Refund what the customer paid, close the loan, restock the items and mark the
    /// order refunded.
    ///
    /// A failed refund leaves everything untouched. A failed ledger update after the refund
    /// leaves the order in its previous status. A failed restock stops further restocks but
    /// the order is still marked refunded; the run is then flagged for an operator.
    pub async fn cancel_order(&self, id: Uuid) -> CoreResult<CancellationOutcome> {
        let order = self.orders.get_by_id(id).await?;
        if order.status.is_terminal() {
            return Err(CoreError::conflict(format!(
                "order {} is already {}",
                id, order.status
            )));
        }

        let mut run = WorkflowRun::cancellation(&order);
        self.journal.open(&run).await?;
        info!(order_id = %order.id, run_id = %run.id, loan_id = %order.loan_ref, "Cancelling order");

        self.run_cancellation(&order, &mut run).await
    }

    /// Continue a failed, flagged or abandoned cancellation from its cursor.
    ///
    /// The run is claimed in the journal before any gateway call, so of two concurrent
    /// resumes only one refunds.
    pub async fn resume_cancellation(
        &self,
        run: WorkflowRun,
        stale_before: DateTime<Utc>,
    ) -> CoreResult<WorkflowRun> {
        let order_id = run.order_id.ok_or_else(|| {
            CoreError::internal("resuming cancellation", format!("run {} has no order", run.id))
        })?;
        let order = self.orders.get_by_id(order_id).await?;

        let before_restock = matches!(
            run.step,
            WorkflowStep::FetchLoan | WorkflowStep::Refund | WorkflowStep::LedgerStatus
        );
        if before_restock && order.status.is_terminal() {
            return Err(CoreError::conflict(format!(
                "order {} is already {}",
                order.id, order.status
            )));
        }

        let mut run = self.journal.claim(run.id, stale_before).await?;
        info!(order_id = %order.id, run_id = %run.id, step = %run.step, "Resuming cancellation");

        self.run_cancellation(&order, &mut run).await?;
        Ok(run)
    }

    async fn run_cancellation(&self, order: &Order, run: &mut WorkflowRun) -> CoreResult<CancellationOutcome> {
        match self.cancellation_steps(order, run).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.journal.record_failure(run, &err).await;
                Err(err)
            }
        }
    }

    async fn cancellation_steps(&self, order: &Order, run: &mut WorkflowRun) -> CoreResult<CancellationOutcome> {
        if matches!(run.step, WorkflowStep::FetchLoan | WorkflowStep::Refund) {
            self.refund_paid_amount(order, run).await?;
            self.journal.checkpoint(run, WorkflowStep::LedgerStatus).await?;
        }

        if run.step == WorkflowStep::LedgerStatus {
            self.ledger
                .set_loan_status(&order.loan_ref, LoanStatus::Refunded)
                .await
                .map_err(|e| {
                    error!(
                        order_id = %order.id,
                        loan_id = %order.loan_ref,
                        refund_id = run.transaction_ref.as_deref().unwrap_or("-"),
                        error = %e,
                        "Refund issued but loan ledger was not updated"
                    );
                    CoreError::upstream("marking loan refunded in ledger", e)
                })?;
            run.advance(WorkflowStep::Restock);
        }

        let unrestocked = if run.step == WorkflowStep::Restock {
            self.restock_items(order, run).await?
        } else {
            Vec::new()
        };

        if unrestocked.is_empty() {
            self.journal.checkpoint(run, WorkflowStep::OrderStatus).await?;
        }

        let mut order = order.clone();
        if !order.status.is_terminal() {
            self.orders
                .transition_status(order.id, order.status, OrderStatus::Refunded)
                .await?;
            order.update_status(OrderStatus::Refunded);
        }

        if unrestocked.is_empty() {
            run.complete();
            info!(order_id = %order.id, run_id = %run.id, "Order refunded");
        } else {
            run.needs_attention(format!("not restocked: {}", unrestocked.join(", ")));
            warn!(
                order_id = %order.id,
                run_id = %run.id,
                unrestocked = unrestocked.len(),
                "Order refunded with items left unrestocked"
            );
        }
        self.journal.finish(run).await;

        Ok(CancellationOutcome {
            run_id: run.id,
            order,
            refunded_amount: run.amount,
            refund_ref: run.transaction_ref.clone(),
            unrestocked,
        })
    }

    /// The ledger is the source of truth for the paid amount; nothing is refunded when the
    /// customer has not paid yet.
    async fn refund_paid_amount(&self, order: &Order, run: &mut WorkflowRun) -> CoreResult<()> {
        self.journal.checkpoint(run, WorkflowStep::FetchLoan).await?;
        let loan = self
            .ledger
            .get_loan(&order.loan_ref)
            .await
            .map_err(|e| CoreError::upstream("fetching loan from ledger", e))?;

        if loan.paid_amount <= 0 {
            info!(order_id = %order.id, loan_id = %loan.id, "Nothing paid on loan, skipping refund");
            run.amount = 0;
            run.transaction_ref = None;
            return Ok(());
        }

        self.journal.checkpoint(run, WorkflowStep::Refund).await?;
        let receipt = self
            .payments
            .refund(&RefundRequest {
                order_id: order.id,
                amount: loan.paid_amount,
                currency: order.currency.clone(),
                card_token: order.card_token.clone(),
            })
            .await
            .map_err(|e| CoreError::upstream("refunding via payment processor", e))?;

        info!(
            order_id = %order.id,
            amount = loan.paid_amount,
            refund_id = %receipt.refund_id,
            "Refund issued"
        );
        run.amount = loan.paid_amount;
        run.transaction_ref = Some(receipt.refund_id);
        Ok(())
    }

    /// Restock from the stored progress counter. Stops at the first failure and returns the
    /// products left over.
    async fn restock_items(&self, order: &Order, run: &mut WorkflowRun) -> CoreResult<Vec<String>> {
        let start = usize::try_from(run.items_done).unwrap_or(0);

        for (idx, item) in order.items.iter().enumerate().skip(start) {
            run.items_done = item_count(idx)?;
            run.touch();
            self.journal.save(run).await?;

            if let Err(e) = self.inventory.restock(&item.product_ref, item.quantity).await {
                error!(
                    order_id = %order.id,
                    product_id = %item.product_ref,
                    quantity = item.quantity,
                    error = %e,
                    "Restock failed, remaining items skipped"
                );
                return Ok(order.items[idx..]
                    .iter()
                    .map(|i| i.product_ref.clone())
                    .collect());
            }
        }

        run.items_done = item_count(order.items.len())?;
        Ok(Vec::new())
    }
}

fn item_count(n: usize) -> CoreResult<i32> {
    i32::try_from(n).map_err(|e| CoreError::internal("counting restocked items", e))
}
