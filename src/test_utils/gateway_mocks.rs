use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::application::ports::gateway::{GatewayTransaction, PaymentGateway};
use crate::domain::entities::money::Money;

/// Gateway double with a programmable outcome queue. Calls pop the next
/// queued outcome, or approve with a generated reference when the queue is
/// empty. Per-operation call counts support "exactly one gateway call"
/// assertions.
#[derive(Default)]
pub struct MockGateway {
    outcomes: Mutex<VecDeque<AppResult<GatewayTransaction>>>,
    authorize_count: AtomicUsize,
    capture_count: AtomicUsize,
    purchase_count: AtomicUsize,
    refund_count: AtomicUsize,
    void_count: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: AppResult<GatewayTransaction>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_count.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_count.load(Ordering::SeqCst)
    }

    pub fn purchase_calls(&self) -> usize {
        self.purchase_count.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> usize {
        self.refund_count.load(Ordering::SeqCst)
    }

    pub fn void_calls(&self) -> usize {
        self.void_count.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, prefix: &str) -> AppResult<GatewayTransaction> {
        if let Some(outcome) = self.outcomes.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(approved(prefix))
    }
}

pub fn approved(prefix: &str) -> GatewayTransaction {
    GatewayTransaction {
        transaction_id: format!("{}-{}", prefix, Uuid::new_v4()),
        response_code: "1".to_string(),
        response_message: "approved".to_string(),
        processed_at: Utc::now(),
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn authorize(
        &self,
        _amount: &Money,
        _payment_nonce: &str,
        _order_ref: &str,
    ) -> AppResult<GatewayTransaction> {
        self.authorize_count.fetch_add(1, Ordering::SeqCst);
        self.next_outcome("auth")
    }

    async fn capture(
        &self,
        _amount: &Money,
        _gateway_txn_id: &str,
    ) -> AppResult<GatewayTransaction> {
        self.capture_count.fetch_add(1, Ordering::SeqCst);
        self.next_outcome("cap")
    }

    async fn purchase(
        &self,
        _amount: &Money,
        _payment_nonce: &str,
        _order_ref: &str,
    ) -> AppResult<GatewayTransaction> {
        self.purchase_count.fetch_add(1, Ordering::SeqCst);
        self.next_outcome("purchase")
    }

    async fn refund(
        &self,
        _amount: &Money,
        _gateway_txn_id: &str,
        _last_four: &str,
    ) -> AppResult<GatewayTransaction> {
        self.refund_count.fetch_add(1, Ordering::SeqCst);
        self.next_outcome("refund")
    }

    async fn void_transaction(&self, _gateway_txn_id: &str) -> AppResult<GatewayTransaction> {
        self.void_count.fetch_add(1, Ordering::SeqCst);
        self.next_outcome("void")
    }
}
