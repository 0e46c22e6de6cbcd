use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::idempotency::IdempotencyRecordRepoTrait;
use crate::application::use_cases::payments::{
    PaymentOrderRepoTrait, PaymentTransactionRepoTrait, RefundRepoTrait,
};
use crate::domain::entities::idempotency::IdempotencyRecord;
use crate::domain::entities::payment_order::PaymentOrder;
use crate::domain::entities::payment_transaction::PaymentTransaction;
use crate::domain::entities::refund::Refund;

// ============================================================================
// InMemoryPaymentOrderRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentOrderRepo {
    orders: Mutex<HashMap<Uuid, PaymentOrder>>,
    conflict_next_save: AtomicBool,
}

impl InMemoryPaymentOrderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    /// Makes the next `save` lose its version race, as if another writer
    /// got in between read and write.
    pub async fn fail_next_save_with_conflict(&self) {
        self.conflict_next_save.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentOrderRepoTrait for InMemoryPaymentOrderRepo {
    async fn insert(&self, order: &PaymentOrder) -> AppResult<()> {
        let mut orders = self.orders.lock().unwrap();
        if orders.values().any(|o| o.request_id == order.request_id) {
            return Err(AppError::InvalidInput(
                "a record with this request id already exists".into(),
            ));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn save(&self, order: &PaymentOrder) -> AppResult<PaymentOrder> {
        if self.conflict_next_save.swap(false, Ordering::SeqCst) {
            return Err(AppError::Conflict);
        }
        let mut orders = self.orders.lock().unwrap();
        let stored = orders.get_mut(&order.id).ok_or(AppError::OrderNotFound)?;
        if stored.version != order.version {
            return Err(AppError::Conflict);
        }
        let mut updated = order.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PaymentOrder>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_request_id(&self, request_id: &str) -> AppResult<Option<PaymentOrder>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.request_id == request_id)
            .cloned())
    }
}

// ============================================================================
// InMemoryTransactionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryTransactionRepo {
    transactions: Mutex<Vec<PaymentTransaction>>,
}

impl InMemoryTransactionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentTransactionRepoTrait for InMemoryTransactionRepo {
    async fn append(&self, txn: &PaymentTransaction) -> AppResult<()> {
        self.transactions.lock().unwrap().push(txn.clone());
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>> {
        let mut txns: Vec<PaymentTransaction> = self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        txns.sort_by_key(|t| t.processed_at);
        Ok(txns)
    }
}

// ============================================================================
// InMemoryRefundRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryRefundRepo {
    refunds: Mutex<Vec<Refund>>,
}

impl InMemoryRefundRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.refunds.lock().unwrap().len()
    }
}

#[async_trait]
impl RefundRepoTrait for InMemoryRefundRepo {
    async fn append(&self, refund: &Refund) -> AppResult<()> {
        self.refunds.lock().unwrap().push(refund.clone());
        Ok(())
    }

    async fn list_by_transaction(&self, transaction_id: Uuid) -> AppResult<Vec<Refund>> {
        Ok(self
            .refunds
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.transaction_id == transaction_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// InMemoryIdempotencyRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryIdempotencyRepo {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
}

impl InMemoryIdempotencyRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyRecordRepoTrait for InMemoryIdempotencyRepo {
    async fn find_by_key(&self, key: &str) -> AppResult<Option<IdempotencyRecord>> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn insert(&self, record: &IdempotencyRecord) -> AppResult<()> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.idempotency_key) {
            return Err(AppError::InvalidInput(
                "a record with this idempotency key already exists".into(),
            ));
        }
        records.insert(record.idempotency_key.clone(), record.clone());
        Ok(())
    }
}
