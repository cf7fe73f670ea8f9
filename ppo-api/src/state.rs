use ppo_core::repository::{OrderRepository, WorkflowRepository};
use ppo_infra::Gateways;
use ppo_order::{CollectionService, InstallmentService, OrderService, Reconciler};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub installments: Arc<InstallmentService>,
    pub reconciler: Arc<Reconciler>,
    pub collection: Arc<CollectionService>,
}

impl AppState {
    /// Wire the orchestrator services over the given stores and gateways.
    ///
    /// `stale_after` is how long a running workflow may go silent before an operator may
    /// take it over.
    pub fn build(
        order_repo: Arc<dyn OrderRepository>,
        run_repo: Arc<dyn WorkflowRepository>,
        gateways: Gateways,
        stale_after: Duration,
    ) -> Self {
        let orders = Arc::new(OrderService::new(
            order_repo.clone(),
            run_repo.clone(),
            gateways.ledger.clone(),
            gateways.payments.clone(),
            gateways.inventory.clone(),
        ));
        let installments = Arc::new(InstallmentService::new(
            order_repo.clone(),
            run_repo.clone(),
            gateways.ledger.clone(),
            gateways.payments.clone(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            run_repo,
            orders.clone(),
            installments.clone(),
            stale_after,
        ));
        let collection = Arc::new(CollectionService::new(gateways.ledger, order_repo, installments.clone()));

        Self {
            orders,
            installments,
            reconciler,
            collection,
        }
    }
}
