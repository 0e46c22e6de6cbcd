use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::idempotency::{CorrelationId, IdempotencyKey};
use super::money::Money;

/// Lifecycle of a payment order.
///
/// ```text
/// Created ──┬──► Authorized ──┬──► Captured ──► Settled ──► Refunded
///           │                 │        │                       ▲
///           │                 │        └───────────────────────┘
///           └─────────────────┴──► Cancelled
/// ```
///
/// `Refunded` re-enters itself for additional partial refunds. `Failed` is
/// reachable from any status as an explicit failure marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOrderStatus {
    Created,
    Authorized,
    Captured,
    Settled,
    Cancelled,
    Refunded,
    Failed,
}

impl PaymentOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOrderStatus::Created => "CREATED",
            PaymentOrderStatus::Authorized => "AUTHORIZED",
            PaymentOrderStatus::Captured => "CAPTURED",
            PaymentOrderStatus::Settled => "SETTLED",
            PaymentOrderStatus::Cancelled => "CANCELLED",
            PaymentOrderStatus::Refunded => "REFUNDED",
            PaymentOrderStatus::Failed => "FAILED",
        }
    }

    /// Capture and cancel are only legal before the money has moved.
    pub fn can_capture(&self) -> bool {
        matches!(
            self,
            PaymentOrderStatus::Created | PaymentOrderStatus::Authorized
        )
    }

    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            PaymentOrderStatus::Created | PaymentOrderStatus::Authorized
        )
    }

    /// Refunds are legal once funds were captured, including repeat partial
    /// refunds while already `Refunded`.
    pub fn can_refund(&self) -> bool {
        matches!(
            self,
            PaymentOrderStatus::Captured
                | PaymentOrderStatus::Settled
                | PaymentOrderStatus::Refunded
        )
    }
}

impl fmt::Display for PaymentOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(PaymentOrderStatus::Created),
            "AUTHORIZED" => Ok(PaymentOrderStatus::Authorized),
            "CAPTURED" => Ok(PaymentOrderStatus::Captured),
            "SETTLED" => Ok(PaymentOrderStatus::Settled),
            "CANCELLED" => Ok(PaymentOrderStatus::Cancelled),
            "REFUNDED" => Ok(PaymentOrderStatus::Refunded),
            "FAILED" => Ok(PaymentOrderStatus::Failed),
            _ => Err(format!("unknown payment order status: {}", s)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: PaymentOrderStatus,
    pub to: PaymentOrderStatus,
}

/// Payment order aggregate. Transactions are separate rows keyed by
/// `order_id`; this struct carries no object graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub money: Money,
    pub status: PaymentOrderStatus,
    pub correlation_id: String,
    pub request_id: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl PaymentOrder {
    pub fn create(
        customer_id: Uuid,
        money: Money,
        correlation_id: &CorrelationId,
        request_id: &str,
        idempotency_key: &IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            money,
            status: PaymentOrderStatus::Created,
            correlation_id: correlation_id.as_str().to_string(),
            request_id: request_id.to_string(),
            idempotency_key: idempotency_key.as_str().to_string(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn mark_authorized(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(
            &[PaymentOrderStatus::Created],
            PaymentOrderStatus::Authorized,
            now,
        )
    }

    pub fn mark_captured(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(
            &[PaymentOrderStatus::Created, PaymentOrderStatus::Authorized],
            PaymentOrderStatus::Captured,
            now,
        )
    }

    pub fn mark_settled(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(
            &[PaymentOrderStatus::Captured],
            PaymentOrderStatus::Settled,
            now,
        )
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(
            &[PaymentOrderStatus::Created, PaymentOrderStatus::Authorized],
            PaymentOrderStatus::Cancelled,
            now,
        )
    }

    pub fn mark_refunded(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(
            &[
                PaymentOrderStatus::Captured,
                PaymentOrderStatus::Settled,
                PaymentOrderStatus::Refunded,
            ],
            PaymentOrderStatus::Refunded,
            now,
        )
    }

    /// Failure marker; reachable from any status.
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.status = PaymentOrderStatus::Failed;
        self.updated_at = now;
    }

    fn transition(
        &mut self,
        allowed: &[PaymentOrderStatus],
        to: PaymentOrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        if !allowed.contains(&self.status) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
