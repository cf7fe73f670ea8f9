use async_trait::async_trait;
use chrono::Utc;
use ppo_core::payment::{ChargeReceipt, ChargeRequest, PaymentProcessor, RefundReceipt, RefundRequest};
use ppo_core::GatewayError;
use reqwest::{Client, Method, StatusCode};
use tracing::info;

use crate::http::JsonHttp;

const SERVICE: &str = "payment processor";
const ACCEPTED: &[StatusCode] = &[StatusCode::OK, StatusCode::CREATED];

pub struct HttpPaymentProcessor {
    http: JsonHttp,
}

impl HttpPaymentProcessor {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            http: JsonHttp::new(SERVICE, base_url, client),
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        self.http
            .send_json(Method::POST, &["charges"], request, ACCEPTED)
            .await
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError> {
        self.http
            .send_json(Method::POST, &["refunds"], request, ACCEPTED)
            .await
    }
}

/// Processor that approves everything. Card tokens are never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubPaymentProcessor;

#[async_trait]
impl PaymentProcessor for StubPaymentProcessor {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        info!(
            amount = request.amount,
            currency = %request.currency,
            "[stub payment processor] charge"
        );
        Ok(ChargeReceipt {
            transaction_id: format!("stub-txn-{}", Utc::now().timestamp_millis()),
            status: "captured".to_string(),
        })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError> {
        info!(
            order_id = %request.order_id,
            amount = request.amount,
            currency = %request.currency,
            "[stub payment processor] refund"
        );
        Ok(RefundReceipt {
            refund_id: format!("stub-ref-{}", Utc::now().timestamp_millis()),
            status: "refunded".to_string(),
        })
    }
}
