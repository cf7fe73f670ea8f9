pub mod app_config;
pub mod database;
pub mod order_repo;
pub mod workflow_repo;
pub mod memory_repo;
pub mod http;
pub mod ledger_client;
pub mod payment_client;
pub mod inventory_client;
pub mod gateways;

pub use database::DbClient;
pub use gateways::Gateways;
pub use http::build_client;
pub use memory_repo::{MemoryOrderRepository, MemoryWorkflowRepository};
pub use order_repo::StoreOrderRepository;
pub use workflow_repo::StoreWorkflowRepository;
