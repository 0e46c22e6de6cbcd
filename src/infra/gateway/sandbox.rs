use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::gateway::{GatewayTransaction, PaymentGateway};
use crate::domain::entities::money::Money;

/// Local gateway that approves everything without leaving the process.
///
/// Magic nonce prefixes force specific outcomes so decline and outage paths
/// can be exercised end to end:
/// - `decline-…` simulates a business decline
/// - `error-…` simulates a transport failure
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxGateway;

impl SandboxGateway {
    pub fn new() -> Self {
        Self
    }

    fn scripted_outcome(&self, payment_data: &str) -> AppResult<()> {
        if payment_data.starts_with("decline-") {
            return Err(AppError::GatewayDeclined(
                "2: this transaction has been declined".into(),
            ));
        }
        if payment_data.starts_with("error-") {
            return Err(AppError::GatewayError("simulated transport failure".into()));
        }
        Ok(())
    }

    fn approve(&self, prefix: &str, reference: &str) -> GatewayTransaction {
        GatewayTransaction {
            transaction_id: format!("{}-{}-{}", prefix, reference, Uuid::new_v4().simple()),
            response_code: "1".to_string(),
            response_message: "sandbox approved".to_string(),
            processed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn authorize(
        &self,
        _amount: &Money,
        payment_nonce: &str,
        order_ref: &str,
    ) -> AppResult<GatewayTransaction> {
        self.scripted_outcome(payment_nonce)?;
        Ok(self.approve("auth", order_ref))
    }

    async fn capture(
        &self,
        _amount: &Money,
        gateway_txn_id: &str,
    ) -> AppResult<GatewayTransaction> {
        Ok(self.approve("cap", gateway_txn_id))
    }

    async fn purchase(
        &self,
        _amount: &Money,
        payment_nonce: &str,
        order_ref: &str,
    ) -> AppResult<GatewayTransaction> {
        self.scripted_outcome(payment_nonce)?;
        Ok(self.approve("purchase", order_ref))
    }

    async fn refund(
        &self,
        _amount: &Money,
        gateway_txn_id: &str,
        _last_four: &str,
    ) -> AppResult<GatewayTransaction> {
        Ok(self.approve("refund", gateway_txn_id))
    }

    async fn void_transaction(&self, gateway_txn_id: &str) -> AppResult<GatewayTransaction> {
        Ok(self.approve("void", gateway_txn_id))
    }
}
