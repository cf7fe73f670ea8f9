use async_trait::async_trait;
use ppo_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::GatewayError;

#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub amount: i64,
    pub currency: String,
    pub card_token: Masked<String>,
}

/// Processor acknowledgement of a charge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChargeReceipt {
    pub transaction_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    pub order_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub card_token: Masked<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub status: String,
}

/// External card processor
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charge a stored card
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError>;

    /// Refund money previously collected for an order
    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError>;
}
