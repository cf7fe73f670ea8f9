//! Durable journal of multi-step settlement runs.
//!
//! A run is opened before the first external call of a workflow and its step cursor is
//! saved before every further external call, so an interrupted or failed run can be found
//! and resumed by an operator. A run left in `running` by a dropped or crashed worker is
//! recognised by its `updated_at`: every checkpoint refreshes it, so a run whose last
//! checkpoint is older than the staleness cutoff has no live owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, Order, ParseEnumError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Cancellation,
    InstallmentPayment,
}

/// Step cursor. For a running run it names the step about to execute; for a failed run,
/// the step that failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    FetchLoan,
    Refund,
    LedgerStatus,
    Restock,
    OrderStatus,
    Charge,
    RecordPayment,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Failed,
    /// Finished, but left work for an operator (items not restocked).
    NeedsAttention,
}

macro_rules! string_enum {
    ($ty:ty, $kind:literal, { $($variant:path => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(WorkflowKind, "workflow kind", {
    WorkflowKind::Cancellation => "cancellation",
    WorkflowKind::InstallmentPayment => "installment_payment",
});

string_enum!(WorkflowStep, "workflow step", {
    WorkflowStep::FetchLoan => "fetch_loan",
    WorkflowStep::Refund => "refund",
    WorkflowStep::LedgerStatus => "ledger_status",
    WorkflowStep::Restock => "restock",
    WorkflowStep::OrderStatus => "order_status",
    WorkflowStep::Charge => "charge",
    WorkflowStep::RecordPayment => "record_payment",
    WorkflowStep::Done => "done",
});

string_enum!(RunState, "run state", {
    RunState::Running => "running",
    RunState::Completed => "completed",
    RunState::Failed => "failed",
    RunState::NeedsAttention => "needs_attention",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub kind: WorkflowKind,
    pub order_id: Option<Uuid>,
    pub loan_ref: String,
    pub installment_ref: Option<String>,
    pub step: WorkflowStep,
    pub state: RunState,
    /// Refunded amount for cancellations, charged amount for payments.
    pub amount: i64,
    /// Items restocked so far, in order item order.
    pub items_done: i32,
    /// Refund or charge id returned by the payment processor.
    pub transaction_ref: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn cancellation(order: &Order) -> Self {
        Self::open(
            WorkflowKind::Cancellation,
            Some(order.id),
            order.loan_ref.clone(),
            None,
            WorkflowStep::FetchLoan,
            0,
        )
    }

    pub fn installment_payment(
        order_id: Option<Uuid>,
        loan_ref: &str,
        installment_ref: &str,
        amount: i64,
    ) -> Self {
        Self::open(
            WorkflowKind::InstallmentPayment,
            order_id,
            loan_ref.to_string(),
            Some(installment_ref.to_string()),
            WorkflowStep::Charge,
            amount,
        )
    }

    fn open(
        kind: WorkflowKind,
        order_id: Option<Uuid>,
        loan_ref: String,
        installment_ref: Option<String>,
        step: WorkflowStep,
        amount: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            order_id,
            loan_ref,
            installment_ref,
            step,
            state: RunState::Running,
            amount,
            items_done: 0,
            transaction_ref: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, step: WorkflowStep) {
        self.step = step;
        self.state = RunState::Running;
        self.touch();
    }

    pub fn fail(&mut self, err: &CoreError) {
        self.state = RunState::Failed;
        self.last_error = Some(err.to_string());
        self.touch();
    }

    pub fn complete(&mut self) {
        self.step = WorkflowStep::Done;
        self.state = RunState::Completed;
        self.last_error = None;
        self.touch();
    }

    pub fn needs_attention(&mut self, reason: impl Into<String>) {
        self.state = RunState::NeedsAttention;
        self.last_error = Some(reason.into());
        self.touch();
    }

    /// Failed and flagged runs may be resumed by an operator, as may a `running` run
    /// whose last checkpoint was written before `stale_before`.
    pub fn is_resumable(&self, stale_before: DateTime<Utc>) -> bool {
        match self.state {
            RunState::Failed | RunState::NeedsAttention => true,
            RunState::Running => self.updated_at < stale_before,
            RunState::Completed => false,
        }
    }

    /// Refresh the checkpoint time without moving the cursor.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayError;

    #[test]
    fn payment_run_starts_at_charge() {
        let run = WorkflowRun::installment_payment(None, "loan-1", "inst-1", 15000);
        assert_eq!(run.kind, WorkflowKind::InstallmentPayment);
        assert_eq!(run.step, WorkflowStep::Charge);
        assert_eq!(run.state, RunState::Running);
        assert!(!run.is_resumable(run.updated_at));
    }

    #[test]
    fn running_run_becomes_resumable_once_stale() {
        let mut run = WorkflowRun::installment_payment(None, "loan-1", "inst-1", 15000);
        run.advance(WorkflowStep::RecordPayment);
        let checkpoint = run.updated_at;

        assert!(!run.is_resumable(checkpoint - chrono::Duration::minutes(1)));
        assert!(run.is_resumable(checkpoint + chrono::Duration::seconds(1)));

        run.complete();
        assert!(!run.is_resumable(run.updated_at + chrono::Duration::days(1)));
    }

    #[test]
    fn failure_keeps_cursor_and_cause() {
        let mut run = WorkflowRun::installment_payment(None, "loan-1", "inst-1", 15000);
        run.advance(WorkflowStep::RecordPayment);
        run.fail(&CoreError::upstream(
            "recording payment in loan ledger",
            GatewayError::Status {
                service: "loan ledger",
                status: 500,
            },
        ));

        assert_eq!(run.step, WorkflowStep::RecordPayment);
        assert_eq!(run.state, RunState::Failed);
        assert!(run.is_resumable(run.created_at));
        assert!(run.last_error.unwrap().contains("status 500"));
    }

    #[test]
    fn string_forms_parse_back() {
        for step in [
            WorkflowStep::FetchLoan,
            WorkflowStep::Refund,
            WorkflowStep::LedgerStatus,
            WorkflowStep::Restock,
            WorkflowStep::OrderStatus,
            WorkflowStep::Charge,
            WorkflowStep::RecordPayment,
            WorkflowStep::Done,
        ] {
            assert_eq!(step.as_str().parse::<WorkflowStep>().unwrap(), step);
        }
        assert_eq!(
            "needs_attention".parse::<RunState>().unwrap(),
            RunState::NeedsAttention
        );
        assert!("paused".parse::<RunState>().is_err());
    }
}
