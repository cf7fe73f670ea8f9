use ppo_core::ledger::LoanLedger;
use ppo_core::repository::OrderRepository;
use ppo_core::{CoreError, CoreResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::installments::InstallmentService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderSummary {
    pub reminders: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub charged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Scheduled jobs over the ledger's installment lists.
pub struct CollectionService {
    ledger: Arc<dyn LoanLedger>,
    orders: Arc<dyn OrderRepository>,
    installments: Arc<InstallmentService>,
}

impl CollectionService {
    pub fn new(
        ledger: Arc<dyn LoanLedger>,
        orders: Arc<dyn OrderRepository>,
        installments: Arc<InstallmentService>,
    ) -> Self {
        Self {
            ledger,
            orders,
            installments,
        }
    }

    /// Reminders are log lines only; nothing is sent to customers.
    pub async fn send_reminders(&self) -> CoreResult<ReminderSummary> {
        let upcoming = self
            .ledger
            .list_upcoming_installments()
            .await
            .map_err(|e| CoreError::upstream("listing upcoming installments", e))?;

        for installment in &upcoming {
            info!(
                loan_id = %installment.loan_id,
                installment_id = %installment.id,
                due_date = %installment.due_date,
                amount = installment.amount,
                "Installment reminder"
            );
        }

        Ok(ReminderSummary {
            reminders: upcoming.len(),
        })
    }

    /// Charge every overdue installment with the card of the order financed by its loan.
    ///
    /// Installments are independent: one failure does not stop the rest, and nothing is
    /// retried.
    pub async fn collect_overdue(&self) -> CoreResult<CollectionSummary> {
        let overdue = self
            .ledger
            .list_overdue_installments()
            .await
            .map_err(|e| CoreError::upstream("listing overdue installments", e))?;

        let mut summary = CollectionSummary::default();
        for installment in &overdue {
            let order = match self.orders.find_by_loan_ref(&installment.loan_id).await {
                Ok(order) => order,
                Err(CoreError::NotFound(_)) => {
                    warn!(
                        loan_id = %installment.loan_id,
                        installment_id = %installment.id,
                        "No order for overdue installment, skipping"
                    );
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(loan_id = %installment.loan_id, error = %e, "Order lookup failed");
                    summary.failed += 1;
                    continue;
                }
            };

            match self.installments.pay_for_order(&order, installment).await {
                Ok(confirmation) => {
                    info!(
                        order_id = %order.id,
                        installment_id = %installment.id,
                        transaction_id = %confirmation.transaction_id,
                        "Overdue installment collected"
                    );
                    summary.charged += 1;
                }
                Err(e) => {
                    error!(
                        order_id = %order.id,
                        installment_id = %installment.id,
                        error = %e,
                        "Overdue installment collection failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
