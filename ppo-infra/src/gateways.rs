use ppo_core::inventory::Inventory;
use ppo_core::ledger::LoanLedger;
use ppo_core::payment::PaymentProcessor;
use std::sync::Arc;
use tracing::info;

use crate::app_config::{GatewayConfig, GatewayMode};
use crate::http::build_client;
use crate::inventory_client::{HttpInventory, StubInventory};
use crate::ledger_client::{HttpLoanLedger, StubLoanLedger};
use crate::payment_client::{HttpPaymentProcessor, StubPaymentProcessor};

/// The three external systems, chosen once at start.
#[derive(Clone)]
pub struct Gateways {
    pub ledger: Arc<dyn LoanLedger>,
    pub payments: Arc<dyn PaymentProcessor>,
    pub inventory: Arc<dyn Inventory>,
}

impl Gateways {
    pub fn stub() -> Self {
        Self {
            ledger: Arc::new(StubLoanLedger),
            payments: Arc::new(StubPaymentProcessor),
            inventory: Arc::new(StubInventory),
        }
    }

    /// Live clients each get their own connection pool.
    pub fn live(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let timeout = config.timeout();
        Ok(Self {
            ledger: Arc::new(HttpLoanLedger::new(&config.loan_ledger_url, build_client(timeout)?)),
            payments: Arc::new(HttpPaymentProcessor::new(&config.payment_url, build_client(timeout)?)),
            inventory: Arc::new(HttpInventory::new(&config.inventory_url, build_client(timeout)?)),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        match config.mode {
            GatewayMode::Stub => {
                info!("Using stub gateways");
                Ok(Self::stub())
            }
            GatewayMode::Live => {
                info!(
                    loan_ledger = %config.loan_ledger_url,
                    payments = %config.payment_url,
                    inventory = %config.inventory_url,
                    "Using live gateways"
                );
                Self::live(config)
            }
        }
    }
}
