use chrono::{DateTime, Utc};
use ppo_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ParseEnumError;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Active,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Active => "active",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Status only moves forward: created -> active -> {cancelled, refunded}.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::Created, OrderStatus::Active) => true,
            (OrderStatus::Created | OrderStatus::Active, s) => s.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(OrderStatus::Created),
            "active" => Ok(OrderStatus::Active),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(ParseEnumError {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// A purchase financed through an installment loan.
///
/// The loan ledger is the source of truth for how much has been paid; the order only keeps
/// what is needed to refund, restock and charge the stored card.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub loan_ref: String,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub currency: String,
    pub card_token: Masked<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new order, already validated at the boundary.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub loan_ref: String,
    pub currency: String,
    pub card_token: Masked<String>,
    pub total_amount: i64,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_ref: String,
    pub quantity: i32,
    pub unit_price: i64,
}

impl Order {
    pub fn new(input: NewOrder) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let items = input
            .items
            .into_iter()
            .map(|item| OrderItem::new(id, item.product_ref, item.quantity, item.unit_price))
            .collect();

        Self {
            id,
            user_id: input.user_id,
            loan_ref: input.loan_ref,
            status: OrderStatus::Created,
            total_amount: input.total_amount,
            currency: input.currency,
            card_token: input.card_token,
            items,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of item subtotals
    pub fn items_total(&self) -> i64 {
        self.items.iter().map(OrderItem::subtotal).sum()
    }

    pub fn update_status(&mut self, new_status: OrderStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_ref: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(order_id: Uuid, product_ref: String, quantity: i32, unit_price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_ref,
            quantity,
            unit_price,
            created_at: Utc::now(),
        }
    }

    pub fn subtotal(&self) -> i64 {
        self.unit_price * i64::from(self.quantity)
    }
}
