use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app_error::AppResult;
use crate::domain::entities::money::Money;

/// Successful gateway interaction. Failures surface as
/// `AppError::GatewayDeclined` (business decline, terminal for the attempt)
/// or `AppError::GatewayError` (transport/protocol failure, including
/// timeouts). Either way: no money moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub transaction_id: String,
    pub response_code: String,
    pub response_message: String,
    pub processed_at: DateTime<Utc>,
}

/// Port to the external payment processor. Capture, void, and refund chain
/// to a prior transaction through its gateway reference.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        amount: &Money,
        payment_nonce: &str,
        order_ref: &str,
    ) -> AppResult<GatewayTransaction>;

    async fn capture(&self, amount: &Money, gateway_txn_id: &str)
    -> AppResult<GatewayTransaction>;

    async fn purchase(
        &self,
        amount: &Money,
        payment_nonce: &str,
        order_ref: &str,
    ) -> AppResult<GatewayTransaction>;

    async fn refund(
        &self,
        amount: &Money,
        gateway_txn_id: &str,
        last_four: &str,
    ) -> AppResult<GatewayTransaction>;

    async fn void_transaction(&self, gateway_txn_id: &str) -> AppResult<GatewayTransaction>;
}
