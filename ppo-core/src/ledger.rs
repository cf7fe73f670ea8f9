use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// A loan as reported by the loan ledger. Never persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Loan {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub paid_amount: i64,
    pub total_amount: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Upcoming,
    Overdue,
    Paid,
}

impl InstallmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallmentStatus::Upcoming => "upcoming",
            InstallmentStatus::Overdue => "overdue",
            InstallmentStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Installment {
    pub id: String,
    pub loan_id: String,
    pub amount: i64,
    pub status: InstallmentStatus,
    pub due_date: NaiveDate,
}

/// Loan statuses this service writes back to the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Refunded,
}

impl LoanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Refunded => "refunded",
        }
    }
}

/// A settled installment payment, with the processor's transaction id as provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentRecord {
    pub loan_id: String,
    pub installment_id: String,
    pub amount: i64,
    pub transaction_id: String,
}

/// External system of record for loan repayment status and installment schedules.
#[async_trait]
pub trait LoanLedger: Send + Sync {
    async fn get_loan(&self, loan_ref: &str) -> Result<Loan, GatewayError>;

    async fn list_installments(&self, user_ref: &str) -> Result<Vec<Installment>, GatewayError>;

    async fn list_upcoming_installments(&self) -> Result<Vec<Installment>, GatewayError>;

    async fn list_overdue_installments(&self) -> Result<Vec<Installment>, GatewayError>;

    async fn set_loan_status(&self, loan_ref: &str, status: LoanStatus)
        -> Result<(), GatewayError>;

    async fn record_payment(&self, payment: &PaymentRecord) -> Result<(), GatewayError>;
}
