use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use ppo_core::{CoreError, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
use ppo_order::CancellationOutcome;
use ppo_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ok, AppError, Envelope};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub loan_id: String,
    pub card_token: Masked<String>,
    pub currency: String,
    pub total_amount: i64,
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub loan_id: String,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub currency: String,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub order: OrderResponse,
    pub refunded_amount: i64,
    pub refund_id: Option<String>,
    pub unrestocked: Vec<String>,
    pub workflow_run_id: Uuid,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_ref.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            loan_id: order.loan_ref,
            status: order.status,
            total_amount: order.total_amount,
            currency: order.currency,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<CancellationOutcome> for CancellationResponse {
    fn from(outcome: CancellationOutcome) -> Self {
        Self {
            order: outcome.order.into(),
            refunded_amount: outcome.refunded_amount,
            refund_id: outcome.refund_ref,
            unrestocked: outcome.unrestocked,
            workflow_run_id: outcome.run_id,
        }
    }
}

pub(crate) fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

impl CreateOrderRequest {
    /// Everything downstream trusts these checks, including total == sum of subtotals.
    fn validate(self) -> Result<NewOrder, CoreError> {
        if self.loan_id.trim().is_empty() {
            return Err(CoreError::validation("loan_id is required"));
        }
        if self.card_token.expose().trim().is_empty() {
            return Err(CoreError::validation("card_token is required"));
        }
        if !is_currency_code(&self.currency) {
            return Err(CoreError::validation("currency must be a 3-letter code"));
        }
        if self.total_amount <= 0 {
            return Err(CoreError::validation("total_amount must be greater than 0"));
        }
        if self.items.is_empty() {
            return Err(CoreError::validation("at least one item is required"));
        }

        let mut items_total: i64 = 0;
        for (idx, item) in self.items.iter().enumerate() {
            if item.product_id.trim().is_empty() {
                return Err(CoreError::validation(format!("items[{idx}].product_id is required")));
            }
            if item.quantity <= 0 {
                return Err(CoreError::validation(format!("items[{idx}].quantity must be greater than 0")));
            }
            if item.unit_price <= 0 {
                return Err(CoreError::validation(format!("items[{idx}].unit_price must be greater than 0")));
            }
            items_total = item
                .unit_price
                .checked_mul(i64::from(item.quantity))
                .and_then(|subtotal| items_total.checked_add(subtotal))
                .ok_or_else(|| CoreError::validation("item amounts overflow"))?;
        }
        if items_total != self.total_amount {
            return Err(CoreError::validation(format!(
                "total_amount {} does not match item subtotals {}",
                self.total_amount, items_total
            )));
        }

        Ok(NewOrder {
            user_id: self.user_id,
            loan_ref: self.loan_id,
            currency: self.currency.to_ascii_uppercase(),
            card_token: self.card_token,
            total_amount: self.total_amount,
            items: self
                .items
                .into_iter()
                .map(|item| NewOrderItem {
                    product_ref: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<OrderResponse>>), AppError> {
    let Json(req) = payload?;
    let order = state.orders.create_order(req.validate()?).await?;
    Ok((StatusCode::CREATED, ok(order.into())))
}

/// GET /api/v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    order_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Envelope<OrderResponse>>, AppError> {
    let Path(order_id) = order_id?;
    let order = state.orders.get_order(order_id).await?;
    Ok(ok(order.into()))
}

/// POST /api/v1/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    order_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Envelope<CancellationResponse>>, AppError> {
    let Path(order_id) = order_id?;
    let outcome = state.orders.cancel_order(order_id).await?;
    Ok(ok(outcome.into()))
}
