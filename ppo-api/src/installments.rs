use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use ppo_core::ledger::Installment;
use ppo_core::CoreError;
use ppo_order::{PayInstallment, PaymentConfirmation};
use ppo_shared::Masked;
use serde::Deserialize;

use crate::error::{ok, AppError, Envelope};
use crate::orders::is_currency_code;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PayInstallmentRequest {
    pub loan_id: String,
    pub installment_id: String,
    pub amount: i64,
    pub currency: String,
    pub card_token: Masked<String>,
}

impl PayInstallmentRequest {
    fn validate(self) -> Result<PayInstallment, CoreError> {
        if self.loan_id.trim().is_empty() || self.installment_id.trim().is_empty() {
            return Err(CoreError::validation("loan_id and installment_id are required"));
        }
        if self.amount <= 0 {
            return Err(CoreError::validation("amount must be greater than 0"));
        }
        if !is_currency_code(&self.currency) {
            return Err(CoreError::validation("currency must be a 3-letter code"));
        }
        if self.card_token.expose().trim().is_empty() {
            return Err(CoreError::validation("card_token is required"));
        }

        Ok(PayInstallment {
            loan_ref: self.loan_id,
            installment_ref: self.installment_id,
            amount: self.amount,
            currency: self.currency.to_ascii_uppercase(),
            card_token: self.card_token,
        })
    }
}

/// GET /api/v1/users/{user_id}/installments
pub async fn list_installments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Envelope<Vec<Installment>>>, AppError> {
    let installments = state.installments.get_installments(&user_id).await?;
    Ok(ok(installments))
}

/// POST /api/v1/installments/pay
pub async fn pay_installment(
    State(state): State<AppState>,
    payload: Result<Json<PayInstallmentRequest>, JsonRejection>,
) -> Result<Json<Envelope<PaymentConfirmation>>, AppError> {
    let Json(req) = payload?;
    let confirmation = state.installments.pay_installment(req.validate()?).await?;
    Ok(ok(confirmation))
}
