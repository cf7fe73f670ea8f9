use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ppo_core::repository::OrderRepository;
use ppo_core::{CoreError, CoreResult, Order, OrderItem, OrderStatus};
use ppo_shared::Masked;
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_ref, quantity, unit_price, created_at \
             FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::internal("fetching order items", e))?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn hydrate(&self, row: OrderRow) -> CoreResult<Order> {
        let items = self.load_items(row.id).await?;
        row.into_order(items)
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    loan_ref: String,
    status: String,
    total_amount: i64,
    currency: String,
    card_token: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> CoreResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| CoreError::internal("decoding order status", e))?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            loan_ref: self.loan_ref,
            status,
            total_amount: self.total_amount,
            currency: self.currency,
            card_token: Masked(self.card_token),
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_ref: String,
    quantity: i32,
    unit_price: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_ref: row.product_ref,
            quantity: row.quantity,
            unit_price: row.unit_price,
            created_at: row.created_at,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, loan_ref, status, total_amount, currency, card_token, created_at, updated_at";

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn create(&self, order: &Order) -> CoreResult<()> {
        let storage = |e: sqlx::Error| CoreError::internal("creating order", e);

        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, loan_ref, status, total_amount, currency, card_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.loan_ref)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(&order.currency)
        .bind(order.card_token.expose())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, product_ref, quantity, unit_price, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(&item.product_ref)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> CoreResult<Order> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CoreError::internal("fetching order", e))?;

        match row {
            Some(row) => self.hydrate(row).await,
            None => Err(CoreError::not_found(format!("order {} not found", id))),
        }
    }

    async fn find_by_loan_ref(&self, loan_ref: &str) -> CoreResult<Order> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE loan_ref = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(loan_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::internal("fetching order by loan", e))?;

        match row {
            Some(row) => self.hydrate(row).await,
            None => Err(CoreError::not_found(format!(
                "order with loan {} not found",
                loan_ref
            ))),
        }
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> CoreResult<()> {
        let result = sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::internal("updating order status", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("order {} not found", id)));
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(next.as_str())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::internal("updating order status", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Zero rows: either the order is gone or someone else moved it first
        let current: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::internal("fetching order status", e))?;

        match current {
            None => Err(CoreError::not_found(format!("order {} not found", id))),
            Some((status,)) => Err(CoreError::conflict(format!(
                "order {} is {}, expected {}",
                id, status, expected
            ))),
        }
    }
}
