use async_trait::async_trait;

use crate::GatewayError;

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Put `quantity` units of a product back into stock
    async fn restock(&self, product_ref: &str, quantity: i32) -> Result<(), GatewayError>;
}
