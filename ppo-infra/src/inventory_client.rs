use async_trait::async_trait;
use ppo_core::inventory::Inventory;
use ppo_core::GatewayError;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use tracing::info;

use crate::http::JsonHttp;

const SERVICE: &str = "inventory";

pub struct HttpInventory {
    http: JsonHttp,
}

impl HttpInventory {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            http: JsonHttp::new(SERVICE, base_url, client),
        }
    }
}

#[derive(Serialize)]
struct RestockBody {
    quantity: i32,
}

#[async_trait]
impl Inventory for HttpInventory {
    async fn restock(&self, product_ref: &str, quantity: i32) -> Result<(), GatewayError> {
        self.http
            .send_json_unit(
                Method::POST,
                &["products", product_ref, "restock"],
                &RestockBody { quantity },
                &[StatusCode::OK],
            )
            .await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StubInventory;

#[async_trait]
impl Inventory for StubInventory {
    async fn restock(&self, product_ref: &str, quantity: i32) -> Result<(), GatewayError> {
        info!(product_id = product_ref, quantity, "[stub inventory] restock");
        Ok(())
    }
}
