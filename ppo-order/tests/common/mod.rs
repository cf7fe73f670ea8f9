#![allow(dead_code)]

use async_trait::async_trait;
use ppo_core::inventory::Inventory;
use ppo_core::ledger::{Installment, Loan, LoanLedger, LoanStatus, PaymentRecord};
use ppo_core::payment::{ChargeReceipt, ChargeRequest, PaymentProcessor, RefundReceipt, RefundRequest};
use ppo_core::repository::{OrderRepository, WorkflowRepository};
use ppo_core::{CoreResult, GatewayError, NewOrder, NewOrderItem, Order, OrderStatus};
use ppo_infra::ledger_client::StubLoanLedger;
use ppo_infra::{MemoryOrderRepository, MemoryWorkflowRepository};
use ppo_order::{CollectionService, InstallmentService, OrderService, Reconciler, DEFAULT_STALE_AFTER};
use ppo_shared::Masked;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Calls across every double in a harness, in the order they were made.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Take a one-shot delay and sleep on it. The guard is released before sleeping.
async fn delay_once(slot: &Mutex<Option<Duration>>) {
    let delay = slot.lock().unwrap().take();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

pub fn status_error(service: &'static str, status: u16) -> GatewayError {
    GatewayError::Status { service, status }
}

/// Ledger double that records writes and can be told to fail specific calls.
pub struct RecordingLedger {
    pub paid_amount: Mutex<i64>,
    pub status_updates: Mutex<Vec<(String, LoanStatus)>>,
    pub payments: Mutex<Vec<PaymentRecord>>,
    pub overdue: Mutex<Vec<Installment>>,
    pub fail_get_loan: Mutex<bool>,
    pub fail_set_status: Mutex<bool>,
    pub fail_record_payment: Mutex<bool>,
    /// Stall the next `record_payment` call.
    pub record_delay: Mutex<Option<Duration>>,
    pub calls: CallLog,
}

impl RecordingLedger {
    pub fn with_paid(paid_amount: i64) -> Self {
        Self {
            paid_amount: Mutex::new(paid_amount),
            status_updates: Mutex::default(),
            payments: Mutex::default(),
            overdue: Mutex::new(StubLoanLedger::sample_overdue()),
            fail_get_loan: Mutex::new(false),
            fail_set_status: Mutex::new(false),
            fail_record_payment: Mutex::new(false),
            record_delay: Mutex::new(None),
            calls: CallLog::default(),
        }
    }

    pub fn set(flag: &Mutex<bool>, value: bool) {
        *flag.lock().unwrap() = value;
    }
}

#[async_trait]
impl LoanLedger for RecordingLedger {
    async fn get_loan(&self, loan_ref: &str) -> Result<Loan, GatewayError> {
        self.calls.push("ledger.get_loan");
        if *self.fail_get_loan.lock().unwrap() {
            return Err(status_error("loan ledger", 503));
        }
        let mut loan = StubLoanLedger::sample_loan(loan_ref);
        loan.paid_amount = *self.paid_amount.lock().unwrap();
        Ok(loan)
    }

    async fn list_installments(&self, _user_ref: &str) -> Result<Vec<Installment>, GatewayError> {
        Ok(StubLoanLedger::sample_installments())
    }

    async fn list_upcoming_installments(&self) -> Result<Vec<Installment>, GatewayError> {
        Ok(StubLoanLedger::sample_upcoming())
    }

    async fn list_overdue_installments(&self) -> Result<Vec<Installment>, GatewayError> {
        Ok(self.overdue.lock().unwrap().clone())
    }

    async fn set_loan_status(&self, loan_ref: &str, status: LoanStatus) -> Result<(), GatewayError> {
        self.calls.push(format!("ledger.set_loan_status:{:?}", status));
        if *self.fail_set_status.lock().unwrap() {
            return Err(status_error("loan ledger", 500));
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((loan_ref.to_string(), status));
        Ok(())
    }

    async fn record_payment(&self, payment: &PaymentRecord) -> Result<(), GatewayError> {
        self.calls.push("ledger.record_payment");
        delay_once(&self.record_delay).await;
        if *self.fail_record_payment.lock().unwrap() {
            return Err(status_error("loan ledger", 500));
        }
        self.payments.lock().unwrap().push(payment.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPayments {
    pub charges: Mutex<Vec<ChargeRequest>>,
    pub refunds: Mutex<Vec<RefundRequest>>,
    pub fail_charge: Mutex<bool>,
    pub fail_refund: Mutex<bool>,
    /// Stall the next `refund` call.
    pub refund_delay: Mutex<Option<Duration>>,
    pub calls: CallLog,
}

#[async_trait]
impl PaymentProcessor for RecordingPayments {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, GatewayError> {
        self.calls.push("payments.charge");
        if *self.fail_charge.lock().unwrap() {
            return Err(status_error("payment processor", 402));
        }
        let mut charges = self.charges.lock().unwrap();
        charges.push(request.clone());
        Ok(ChargeReceipt {
            transaction_id: format!("txn-{}", charges.len()),
            status: "captured".to_string(),
        })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError> {
        self.calls.push("payments.refund");
        delay_once(&self.refund_delay).await;
        if *self.fail_refund.lock().unwrap() {
            return Err(status_error("payment processor", 502));
        }
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push(request.clone());
        Ok(RefundReceipt {
            refund_id: format!("ref-{}", refunds.len()),
            status: "refunded".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingInventory {
    pub restocked: Mutex<Vec<(String, i32)>>,
    pub failing: Mutex<HashSet<String>>,
    pub calls: CallLog,
}

impl RecordingInventory {
    pub fn fail_on(&self, product_ref: &str) {
        self.failing.lock().unwrap().insert(product_ref.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn restocked_products(&self) -> Vec<String> {
        self.restocked.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl Inventory for RecordingInventory {
    async fn restock(&self, product_ref: &str, quantity: i32) -> Result<(), GatewayError> {
        self.calls.push(format!("inventory.restock:{}", product_ref));
        if self.failing.lock().unwrap().contains(product_ref) {
            return Err(status_error("inventory", 500));
        }
        self.restocked
            .lock()
            .unwrap()
            .push((product_ref.to_string(), quantity));
        Ok(())
    }
}

/// Memory order store that also logs status transitions into the call log.
pub struct RecordingOrders {
    inner: MemoryOrderRepository,
    pub calls: CallLog,
}

#[async_trait]
impl OrderRepository for RecordingOrders {
    async fn create(&self, order: &Order) -> CoreResult<()> {
        self.inner.create(order).await
    }

    async fn get_by_id(&self, id: Uuid) -> CoreResult<Order> {
        self.inner.get_by_id(id).await
    }

    async fn find_by_loan_ref(&self, loan_ref: &str) -> CoreResult<Order> {
        self.inner.find_by_loan_ref(loan_ref).await
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> CoreResult<()> {
        self.inner.update_status(id, status).await
    }

    async fn transition_status(&self, id: Uuid, expected: OrderStatus, next: OrderStatus) -> CoreResult<()> {
        self.calls.push(format!("orders.transition_status:{}", next));
        self.inner.transition_status(id, expected, next).await
    }
}

/// Everything wired against in-memory stores and recording doubles.
pub struct Harness {
    pub orders: Arc<RecordingOrders>,
    pub runs: Arc<dyn WorkflowRepository>,
    pub ledger: Arc<RecordingLedger>,
    pub payments: Arc<RecordingPayments>,
    pub inventory: Arc<RecordingInventory>,
    pub calls: CallLog,
    pub order_service: Arc<OrderService>,
    pub installment_service: Arc<InstallmentService>,
    pub collection: CollectionService,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(paid_amount: i64) -> Self {
        Self::with_inventory(paid_amount, Arc::new(RecordingInventory::default()))
    }

    pub fn with_inventory(paid_amount: i64, inventory: Arc<RecordingInventory>) -> Self {
        Self::build(paid_amount, inventory, Arc::new(MemoryWorkflowRepository::new()))
    }

    pub fn with_runs(paid_amount: i64, runs: Arc<dyn WorkflowRepository>) -> Self {
        Self::build(paid_amount, Arc::new(RecordingInventory::default()), runs)
    }

    fn build(paid_amount: i64, inventory: Arc<RecordingInventory>, runs: Arc<dyn WorkflowRepository>) -> Self {
        let calls = inventory.calls.clone();
        let orders = Arc::new(RecordingOrders {
            inner: MemoryOrderRepository::new(),
            calls: calls.clone(),
        });
        let ledger = Arc::new(RecordingLedger {
            calls: calls.clone(),
            ..RecordingLedger::with_paid(paid_amount)
        });
        let payments = Arc::new(RecordingPayments {
            calls: calls.clone(),
            ..RecordingPayments::default()
        });

        let order_service = Arc::new(OrderService::new(
            orders.clone(),
            runs.clone(),
            ledger.clone(),
            payments.clone(),
            inventory.clone(),
        ));
        let installment_service = Arc::new(InstallmentService::new(
            orders.clone(),
            runs.clone(),
            ledger.clone(),
            payments.clone(),
        ));
        let collection = CollectionService::new(ledger.clone(), orders.clone(), installment_service.clone());
        let reconciler = Reconciler::new(
            runs.clone(),
            order_service.clone(),
            installment_service.clone(),
            DEFAULT_STALE_AFTER,
        );

        Self {
            orders,
            runs,
            ledger,
            payments,
            inventory,
            calls,
            order_service,
            installment_service,
            collection,
            reconciler,
        }
    }

    /// A reconciler over the same services with another staleness window.
    pub fn reconciler_with_stale_after(&self, stale_after: Duration) -> Reconciler {
        Reconciler::new(
            self.runs.clone(),
            self.order_service.clone(),
            self.installment_service.clone(),
            stale_after,
        )
    }

    pub async fn stored_order(&self, id: Uuid) -> Order {
        self.orders.get_by_id(id).await.unwrap()
    }
}

/// 60000 total over two products: 2 x 20000 and 1 x 20000.
pub fn new_order(loan_ref: &str) -> NewOrder {
    NewOrder {
        user_id: Uuid::new_v4(),
        loan_ref: loan_ref.to_string(),
        currency: "SAR".to_string(),
        card_token: Masked::from("tok_visa_4242"),
        total_amount: 60000,
        items: vec![
            NewOrderItem {
                product_ref: "sku-phone".to_string(),
                quantity: 2,
                unit_price: 20000,
            },
            NewOrderItem {
                product_ref: "sku-case".to_string(),
                quantity: 1,
                unit_price: 20000,
            },
        ],
    }
}
