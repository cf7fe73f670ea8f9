use chrono::{DateTime, Utc};
use ppo_core::ledger::{Installment, LoanLedger, PaymentRecord};
use ppo_core::payment::{ChargeRequest, PaymentProcessor};
use ppo_core::repository::{OrderRepository, WorkflowRepository};
use ppo_core::{CoreError, CoreResult, Order, OrderStatus, WorkflowRun, WorkflowStep};
use ppo_shared::Masked;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::journal::Journal;

/// A request to pay one installment with a stored card.
#[derive(Debug, Clone)]
pub struct PayInstallment {
    pub loan_ref: String,
    pub installment_ref: String,
    pub amount: i64,
    pub currency: String,
    pub card_token: Masked<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub transaction_id: String,
    pub status: String,
}

/// Installment queries and the charge-then-record payment workflow.
pub struct InstallmentService {
    orders: Arc<dyn OrderRepository>,
    journal: Journal,
    ledger: Arc<dyn LoanLedger>,
    payments: Arc<dyn PaymentProcessor>,
}

impl InstallmentService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        runs: Arc<dyn WorkflowRepository>,
        ledger: Arc<dyn LoanLedger>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            orders,
            journal: Journal::new(runs),
            ledger,
            payments,
        }
    }

    pub async fn get_installments(&self, user_ref: &str) -> CoreResult<Vec<Installment>> {
        self.ledger
            .list_installments(user_ref)
            .await
            .map_err(|e| CoreError::upstream("listing installments from ledger", e))
    }

    pub async fn pay_installment(&self, request: PayInstallment) -> CoreResult<PaymentConfirmation> {
        self.execute(request, None).await
    }

    /// Charge an installment against the card and currency stored on `order`.
    pub async fn pay_for_order(
        &self,
        order: &Order,
        installment: &Installment,
    ) -> CoreResult<PaymentConfirmation> {
        let request = PayInstallment {
            loan_ref: installment.loan_id.clone(),
            installment_ref: installment.id.clone(),
            amount: installment.amount,
            currency: order.currency.clone(),
            card_token: order.card_token.clone(),
        };
        self.execute(request, Some(order.id)).await
    }

    /// Re-record a payment whose charge already went through. Runs that stopped at the
    /// charge have nothing to resume.
    pub async fn resume_payment(
        &self,
        run: WorkflowRun,
        stale_before: DateTime<Utc>,
    ) -> CoreResult<WorkflowRun> {
        if run.step != WorkflowStep::RecordPayment {
            return Err(CoreError::conflict(format!(
                "payment run {} stopped at {}, submit a new payment instead",
                run.id, run.step
            )));
        }
        let transaction_id = run.transaction_ref.clone().ok_or_else(|| {
            CoreError::internal(
                "resuming payment",
                format!("run {} has no transaction reference", run.id),
            )
        })?;
        let installment_ref = run.installment_ref.clone().unwrap_or_default();

        let mut run = self.journal.claim(run.id, stale_before).await?;
        info!(run_id = %run.id, loan_id = %run.loan_ref, transaction_id = %transaction_id, "Resuming payment record");

        let record = PaymentRecord {
            loan_id: run.loan_ref.clone(),
            installment_id: installment_ref,
            amount: run.amount,
            transaction_id,
        };
        if let Err(err) = self.record(&record).await {
            self.journal.record_failure(&mut run, &err).await;
            return Err(err);
        }

        run.complete();
        self.journal.finish(&run).await;
        self.activate_order(&run.loan_ref).await;
        Ok(run)
    }

    async fn execute(&self, request: PayInstallment, order_id: Option<Uuid>) -> CoreResult<PaymentConfirmation> {
        let mut run = WorkflowRun::installment_payment(
            order_id,
            &request.loan_ref,
            &request.installment_ref,
            request.amount,
        );
        self.journal.open(&run).await?;

        let receipt = match self
            .payments
            .charge(&ChargeRequest {
                amount: request.amount,
                currency: request.currency.clone(),
                card_token: request.card_token.clone(),
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                let err = CoreError::upstream("charging card via payment processor", e);
                self.journal.record_failure(&mut run, &err).await;
                return Err(err);
            }
        };
        info!(
            loan_id = %request.loan_ref,
            installment_id = %request.installment_ref,
            amount = request.amount,
            transaction_id = %receipt.transaction_id,
            "Installment charged"
        );

        run.transaction_ref = Some(receipt.transaction_id.clone());
        if let Err(err) = self.journal.checkpoint(&mut run, WorkflowStep::RecordPayment).await {
            error!(
                loan_id = %request.loan_ref,
                installment_id = %request.installment_ref,
                transaction_id = %receipt.transaction_id,
                "Charge captured but payment run could not be journaled"
            );
            self.journal.record_failure(&mut run, &err).await;
            return Err(err);
        }

        let record = PaymentRecord {
            loan_id: request.loan_ref.clone(),
            installment_id: request.installment_ref.clone(),
            amount: request.amount,
            transaction_id: receipt.transaction_id.clone(),
        };
        if let Err(err) = self.record(&record).await {
            self.journal.record_failure(&mut run, &err).await;
            return Err(err);
        }

        run.complete();
        self.journal.finish(&run).await;
        self.activate_order(&request.loan_ref).await;

        Ok(PaymentConfirmation {
            transaction_id: receipt.transaction_id,
            status: "paid".to_string(),
        })
    }

    /// No compensating refund: an orphaned charge is logged for reconciliation.
    async fn record(&self, record: &PaymentRecord) -> CoreResult<()> {
        self.ledger.record_payment(record).await.map_err(|e| {
            error!(
                loan_id = %record.loan_id,
                installment_id = %record.installment_id,
                transaction_id = %record.transaction_id,
                error = %e,
                "Charge captured but payment not recorded in ledger"
            );
            CoreError::upstream("recording payment in loan ledger", e)
        })
    }

    /// The first settled installment moves a freshly created order to active.
    async fn activate_order(&self, loan_ref: &str) {
        let order = match self.orders.find_by_loan_ref(loan_ref).await {
            Ok(order) => order,
            Err(CoreError::NotFound(_)) => {
                debug!(loan_id = loan_ref, "No order for loan, nothing to activate");
                return;
            }
            Err(e) => {
                warn!(loan_id = loan_ref, error = %e, "Could not look up order to activate");
                return;
            }
        };

        if order.status != OrderStatus::Created {
            return;
        }
        match self
            .orders
            .transition_status(order.id, OrderStatus::Created, OrderStatus::Active)
            .await
        {
            Ok(()) => info!(order_id = %order.id, loan_id = loan_ref, "Order activated"),
            Err(e) => warn!(order_id = %order.id, error = %e, "Could not activate order"),
        }
    }
}
