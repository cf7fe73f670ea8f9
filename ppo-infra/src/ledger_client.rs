use async_trait::async_trait;
use chrono::NaiveDate;
use ppo_core::ledger::{Installment, InstallmentStatus, Loan, LoanLedger, LoanStatus, PaymentRecord};
use ppo_core::GatewayError;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use tracing::info;

use crate::http::JsonHttp;

const SERVICE: &str = "loan ledger";

/// Loan ledger over its JSON HTTP API.
pub struct HttpLoanLedger {
    http: JsonHttp,
}

impl HttpLoanLedger {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            http: JsonHttp::new(SERVICE, base_url, client),
        }
    }

    async fn installments_with_status(
        &self,
        status: InstallmentStatus,
    ) -> Result<Vec<Installment>, GatewayError> {
        self.http
            .get_json(&["installments"], &[("status", status.as_str())])
            .await
    }
}

#[derive(Serialize)]
struct StatusBody {
    status: LoanStatus,
}

#[async_trait]
impl LoanLedger for HttpLoanLedger {
    async fn get_loan(&self, loan_ref: &str) -> Result<Loan, GatewayError> {
        self.http.get_json(&["loans", loan_ref], &[]).await
    }

    async fn list_installments(&self, user_ref: &str) -> Result<Vec<Installment>, GatewayError> {
        self.http.get_json(&["loans"], &[("user_id", user_ref)]).await
    }

    async fn list_upcoming_installments(&self) -> Result<Vec<Installment>, GatewayError> {
        self.installments_with_status(InstallmentStatus::Upcoming).await
    }

    async fn list_overdue_installments(&self) -> Result<Vec<Installment>, GatewayError> {
        self.installments_with_status(InstallmentStatus::Overdue).await
    }

    async fn set_loan_status(&self, loan_ref: &str, status: LoanStatus) -> Result<(), GatewayError> {
        self.http
            .send_json_unit(
                Method::PUT,
                &["loans", loan_ref, "status"],
                &StatusBody { status },
                &[StatusCode::OK],
            )
            .await
    }

    async fn record_payment(&self, payment: &PaymentRecord) -> Result<(), GatewayError> {
        self.http
            .send_json_unit(
                Method::POST,
                &["loans", payment.loan_id.as_str(), "payments"],
                payment,
                &[StatusCode::OK, StatusCode::CREATED],
            )
            .await
    }
}

/// Fixed-response ledger used until the real ledger is reachable.
///
/// Sample data: every loan has paid 15000 of 60000; user installments are four monthly
/// 15000 installments of `loan-001` (first one paid); two installments are upcoming and
/// one (`inst-007` of `loan-003`) is overdue. Writes always succeed.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubLoanLedger;

impl StubLoanLedger {
    pub fn sample_loan(loan_ref: &str) -> Loan {
        Loan {
            id: loan_ref.to_string(),
            user_id: "user-aaa-bbb-ccc".to_string(),
            status: "active".to_string(),
            paid_amount: 15000,
            total_amount: 60000,
        }
    }

    pub fn sample_installments() -> Vec<Installment> {
        vec![
            installment("inst-001", "loan-001", 15000, InstallmentStatus::Paid, (2026, 1, 15)),
            installment("inst-002", "loan-001", 15000, InstallmentStatus::Upcoming, (2026, 2, 15)),
            installment("inst-003", "loan-001", 15000, InstallmentStatus::Upcoming, (2026, 3, 15)),
            installment("inst-004", "loan-001", 15000, InstallmentStatus::Upcoming, (2026, 4, 15)),
        ]
    }

    pub fn sample_upcoming() -> Vec<Installment> {
        vec![
            installment("inst-002", "loan-001", 15000, InstallmentStatus::Upcoming, (2026, 2, 15)),
            installment("inst-010", "loan-002", 20000, InstallmentStatus::Upcoming, (2026, 2, 20)),
        ]
    }

    pub fn sample_overdue() -> Vec<Installment> {
        vec![installment("inst-007", "loan-003", 12000, InstallmentStatus::Overdue, (2026, 2, 1))]
    }
}

fn installment(
    id: &str,
    loan_id: &str,
    amount: i64,
    status: InstallmentStatus,
    (y, m, d): (i32, u32, u32),
) -> Installment {
    Installment {
        id: id.to_string(),
        loan_id: loan_id.to_string(),
        amount,
        status,
        due_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
    }
}

#[async_trait]
impl LoanLedger for StubLoanLedger {
    async fn get_loan(&self, loan_ref: &str) -> Result<Loan, GatewayError> {
        info!(loan_id = loan_ref, "[stub loan ledger] get_loan");
        Ok(Self::sample_loan(loan_ref))
    }

    async fn list_installments(&self, user_ref: &str) -> Result<Vec<Installment>, GatewayError> {
        info!(user_id = user_ref, "[stub loan ledger] list_installments");
        Ok(Self::sample_installments())
    }

    async fn list_upcoming_installments(&self) -> Result<Vec<Installment>, GatewayError> {
        info!("[stub loan ledger] list_upcoming_installments");
        Ok(Self::sample_upcoming())
    }

    async fn list_overdue_installments(&self) -> Result<Vec<Installment>, GatewayError> {
        info!("[stub loan ledger] list_overdue_installments");
        Ok(Self::sample_overdue())
    }

    async fn set_loan_status(&self, loan_ref: &str, status: LoanStatus) -> Result<(), GatewayError> {
        info!(loan_id = loan_ref, new_status = status.as_str(), "[stub loan ledger] set_loan_status");
        Ok(())
    }

    async fn record_payment(&self, payment: &PaymentRecord) -> Result<(), GatewayError> {
        info!(
            loan_id = %payment.loan_id,
            installment_id = %payment.installment_id,
            amount = payment.amount,
            transaction_id = %payment.transaction_id,
            "[stub loan ledger] record_payment"
        );
        Ok(())
    }
}
