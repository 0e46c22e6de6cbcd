use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::clock::Clock;
use crate::application::ports::gateway::PaymentGateway;
use crate::application::use_cases::idempotency::IdempotencyGuard;
use crate::domain::entities::idempotency::{CorrelationId, IdempotencyKey};
use crate::domain::entities::money::Money;
use crate::domain::entities::payment_order::PaymentOrder;
use crate::domain::entities::payment_transaction::{PaymentTransaction, TransactionType};
use crate::domain::entities::refund::Refund;

// ============================================================================
// Constants
// ============================================================================

/// Attempts for a version-checked save before giving up. The gateway call
/// already happened by the time we save, so a lost race re-reads and
/// re-applies instead of dropping the outcome.
pub const MAX_SAVE_RETRIES: u32 = 3;

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait PaymentOrderRepoTrait: Send + Sync {
    async fn insert(&self, order: &PaymentOrder) -> AppResult<()>;

    /// Compare-and-swap on `version`: persists only when the stored version
    /// matches, returning the bumped row; `AppError::Conflict` otherwise.
    async fn save(&self, order: &PaymentOrder) -> AppResult<PaymentOrder>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PaymentOrder>>;

    async fn find_by_request_id(&self, request_id: &str) -> AppResult<Option<PaymentOrder>>;
}

#[async_trait]
pub trait PaymentTransactionRepoTrait: Send + Sync {
    async fn append(&self, txn: &PaymentTransaction) -> AppResult<()>;

    /// Transactions for an order, oldest first.
    async fn list_by_order(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>>;
}

#[async_trait]
pub trait RefundRepoTrait: Send + Sync {
    async fn append(&self, refund: &Refund) -> AppResult<()>;

    async fn list_by_transaction(&self, transaction_id: Uuid) -> AppResult<Vec<Refund>>;
}

// ============================================================================
// Payment Commands
// ============================================================================

/// The five payment lifecycle commands. Every command validates order state
/// before touching the gateway, holds no lock across the gateway call, and
/// persists with a version-checked save afterwards.
pub struct PaymentCommands {
    orders: Arc<dyn PaymentOrderRepoTrait>,
    transactions: Arc<dyn PaymentTransactionRepoTrait>,
    refunds: Arc<dyn RefundRepoTrait>,
    guard: Arc<IdempotencyGuard>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

impl PaymentCommands {
    pub fn new(
        orders: Arc<dyn PaymentOrderRepoTrait>,
        transactions: Arc<dyn PaymentTransactionRepoTrait>,
        refunds: Arc<dyn RefundRepoTrait>,
        guard: Arc<IdempotencyGuard>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            transactions,
            refunds,
            guard,
            gateway,
            clock,
        }
    }

    /// One-shot charge: authorize and capture in a single gateway call.
    pub async fn purchase(
        &self,
        customer_id: Uuid,
        money: Money,
        payment_nonce: &str,
        idempotency_key: &IdempotencyKey,
        correlation_id: &CorrelationId,
        request_id: &str,
    ) -> AppResult<PaymentOrder> {
        self.one_shot(
            customer_id,
            money,
            payment_nonce,
            idempotency_key,
            correlation_id,
            request_id,
            TransactionType::Purchase,
        )
        .await
    }

    /// Place a hold without moving money; capture/cancel settle it later.
    pub async fn authorize(
        &self,
        customer_id: Uuid,
        money: Money,
        payment_nonce: &str,
        idempotency_key: &IdempotencyKey,
        correlation_id: &CorrelationId,
        request_id: &str,
    ) -> AppResult<PaymentOrder> {
        self.one_shot(
            customer_id,
            money,
            payment_nonce,
            idempotency_key,
            correlation_id,
            request_id,
            TransactionType::Authorization,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn one_shot(
        &self,
        customer_id: Uuid,
        money: Money,
        payment_nonce: &str,
        idempotency_key: &IdempotencyKey,
        correlation_id: &CorrelationId,
        request_id: &str,
        txn_type: TransactionType,
    ) -> AppResult<PaymentOrder> {
        // Replay: a key we have seen returns the stored order without a
        // second gateway call.
        if let Some(record) = self.guard.find_existing(idempotency_key).await? {
            let order_id = Uuid::parse_str(&record.response_payload).map_err(|_| {
                AppError::Internal("idempotency record holds a malformed order id".into())
            })?;
            tracing::info!(
                order_id = %order_id,
                correlation_id = %correlation_id,
                "replaying previously recorded outcome for idempotency key"
            );
            return self
                .orders
                .find_by_id(order_id)
                .await?
                .ok_or_else(|| AppError::Internal("recorded order is gone".into()));
        }

        if self.orders.find_by_request_id(request_id).await?.is_some() {
            return Err(AppError::DuplicateRequest);
        }

        let mut order = PaymentOrder::create(
            customer_id,
            money.clone(),
            correlation_id,
            request_id,
            idempotency_key,
            self.clock.now(),
        );
        self.orders.insert(&order).await?;

        let result = match txn_type {
            TransactionType::Purchase => {
                self.gateway
                    .purchase(&money, payment_nonce, &order.id.to_string())
                    .await
            }
            _ => {
                self.gateway
                    .authorize(&money, payment_nonce, &order.id.to_string())
                    .await
            }
        };
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                // No money moved; keep the row as an explicit failure marker
                // so the request id stays burned.
                order.mark_failed(self.clock.now());
                self.orders.save(&order).await?;
                tracing::warn!(
                    order_id = %order.id,
                    correlation_id = %correlation_id,
                    error = %err,
                    "gateway rejected {}", txn_type
                );
                return Err(err);
            }
        };

        let (txn_status, settled) = match txn_type {
            TransactionType::Purchase => ("SETTLED", true),
            _ => ("AUTHORIZED", false),
        };
        let txn = PaymentTransaction::record(
            order.id,
            txn_type,
            money,
            Some(result.transaction_id),
            txn_status,
            result.processed_at,
            Some(result.response_code),
            Some(result.response_message),
        );
        self.transactions.append(&txn).await?;

        if settled {
            order.mark_captured(self.clock.now())?;
        } else {
            order.mark_authorized(self.clock.now())?;
        }
        let order = self.orders.save(&order).await?;

        let request_fingerprint = format!(
            "{}:{}:{}:{}",
            txn_type, customer_id, order.money.amount(), request_id
        );
        self.guard
            .persist(
                idempotency_key,
                &request_fingerprint,
                &order.id.to_string(),
                201,
            )
            .await?;

        tracing::info!(
            order_id = %order.id,
            correlation_id = %correlation_id,
            status = %order.status,
            "{} completed", txn_type
        );
        Ok(order)
    }

    /// Capture a previously authorized order, fully or partially.
    pub async fn capture(
        &self,
        order_id: Uuid,
        amount: Money,
        actor_id: Uuid,
    ) -> AppResult<PaymentOrder> {
        let order = self.load_order(order_id).await?;
        if !order.status.can_capture() {
            return Err(AppError::InvalidState(format!(
                "order cannot be captured from {}",
                order.status
            )));
        }
        let authorization = self.required_authorization(order_id).await?;

        let result = self
            .gateway
            .capture(&amount, &authorization.gateway_reference()?)
            .await?;

        let txn = PaymentTransaction::record(
            order.id,
            TransactionType::Capture,
            amount,
            Some(result.transaction_id),
            "CAPTURED",
            result.processed_at,
            Some(result.response_code),
            Some(result.response_message),
        );
        self.transactions.append(&txn).await?;

        let order = self
            .save_order_with(order_id, |order| {
                if !order.status.can_capture() {
                    return Err(AppError::InvalidState(format!(
                        "order cannot be captured from {}",
                        order.status
                    )));
                }
                order.mark_captured(self.clock.now())?;
                Ok(())
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            actor_id = %actor_id,
            correlation_id = %order.correlation_id,
            "order captured"
        );
        Ok(order)
    }

    /// Void an authorization before capture.
    pub async fn cancel(&self, order_id: Uuid, actor_id: Uuid) -> AppResult<PaymentOrder> {
        let order = self.load_order(order_id).await?;
        if !order.status.can_cancel() {
            return Err(AppError::InvalidState(format!(
                "order cannot be cancelled from {}",
                order.status
            )));
        }
        let authorization = self.required_authorization(order_id).await?;

        let result = self
            .gateway
            .void_transaction(&authorization.gateway_reference()?)
            .await?;

        let txn = PaymentTransaction::record(
            order.id,
            TransactionType::Void,
            order.money.clone(),
            Some(result.transaction_id),
            "VOIDED",
            result.processed_at,
            Some(result.response_code),
            Some(result.response_message),
        );
        self.transactions.append(&txn).await?;

        let order = self
            .save_order_with(order_id, |order| {
                if !order.status.can_cancel() {
                    return Err(AppError::InvalidState(format!(
                        "order cannot be cancelled from {}",
                        order.status
                    )));
                }
                order.mark_cancelled(self.clock.now())?;
                Ok(())
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            actor_id = %actor_id,
            correlation_id = %order.correlation_id,
            "order cancelled"
        );
        Ok(order)
    }

    /// Refund captured funds, fully or partially. Repeat partial refunds are
    /// allowed while cumulative refunds stay within the captured total.
    pub async fn refund(
        &self,
        order_id: Uuid,
        amount: Money,
        last_four: &str,
        actor_id: Uuid,
    ) -> AppResult<Refund> {
        let order = self.load_order(order_id).await?;
        if !order.status.can_refund() {
            return Err(AppError::InvalidState(format!(
                "order cannot be refunded from {}",
                order.status
            )));
        }
        if amount.currency() != order.money.currency() {
            return Err(AppError::InvalidInput(format!(
                "refund currency {} does not match order currency {}",
                amount.currency(),
                order.money.currency()
            )));
        }

        let transactions = self.transactions.list_by_order(order_id).await?;
        let capture_txn = transactions
            .iter()
            .find(|txn| txn.txn_type.is_capturing())
            .ok_or(AppError::CaptureMissing)?;

        let captured_total: Decimal = transactions
            .iter()
            .filter(|txn| txn.txn_type.is_capturing())
            .map(|txn| txn.money.amount())
            .sum();
        let already_refunded: Decimal = transactions
            .iter()
            .filter(|txn| txn.txn_type == TransactionType::Refund)
            .map(|txn| txn.money.amount())
            .sum();
        if already_refunded + amount.amount() > captured_total {
            return Err(AppError::InvalidAmount(format!(
                "refund of {} would exceed refundable balance {}",
                amount.amount(),
                captured_total - already_refunded
            )));
        }

        let result = self
            .gateway
            .refund(&amount, &capture_txn.gateway_reference()?, last_four)
            .await?;

        let refund = Refund::record(
            capture_txn.id,
            amount.clone(),
            "REFUNDED",
            Some(result.transaction_id.clone()),
            result.processed_at,
        );
        self.refunds.append(&refund).await?;

        let txn = PaymentTransaction::record(
            order.id,
            TransactionType::Refund,
            amount,
            Some(result.transaction_id),
            "REFUNDED",
            result.processed_at,
            Some(result.response_code),
            Some(result.response_message),
        );
        self.transactions.append(&txn).await?;

        let order = self
            .save_order_with(order_id, |order| {
                order.mark_refunded(self.clock.now())?;
                Ok(())
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            refund_id = %refund.id,
            actor_id = %actor_id,
            correlation_id = %order.correlation_id,
            "refund recorded"
        );
        Ok(refund)
    }

    pub async fn get_order(&self, order_id: Uuid) -> AppResult<PaymentOrder> {
        self.load_order(order_id).await
    }

    pub async fn order_transactions(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>> {
        self.load_order(order_id).await?;
        self.transactions.list_by_order(order_id).await
    }

    async fn load_order(&self, order_id: Uuid) -> AppResult<PaymentOrder> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(AppError::OrderNotFound)
    }

    async fn required_authorization(&self, order_id: Uuid) -> AppResult<PaymentTransaction> {
        self.transactions
            .list_by_order(order_id)
            .await?
            .into_iter()
            .find(|txn| txn.txn_type == TransactionType::Authorization)
            .ok_or(AppError::AuthMissing)
    }

    /// Re-read, re-validate, re-apply on version conflict. The mutation runs
    /// against a fresh row each attempt.
    async fn save_order_with<F>(&self, order_id: Uuid, mutate: F) -> AppResult<PaymentOrder>
    where
        F: Fn(&mut PaymentOrder) -> AppResult<()>,
    {
        for _ in 0..MAX_SAVE_RETRIES {
            let mut order = self.load_order(order_id).await?;
            mutate(&mut order)?;
            match self.orders.save(&order).await {
                Ok(saved) => return Ok(saved),
                Err(AppError::Conflict) => {
                    tracing::debug!(order_id = %order_id, "order save lost version race, retrying");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Conflict)
    }
}

impl PaymentTransaction {
    fn gateway_reference(&self) -> AppResult<String> {
        self.gateway_txn_id.clone().ok_or_else(|| {
            AppError::Internal(format!(
                "transaction {} has no gateway reference",
                self.id
            ))
        })
    }
}
