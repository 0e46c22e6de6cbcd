use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

/// One refund attempt against a capture or purchase transaction.
/// One row per attempt; rows are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    /// The capture/purchase transaction being refunded.
    pub transaction_id: Uuid,
    pub money: Money,
    pub status: String,
    pub gateway_txn_id: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl Refund {
    pub fn record(
        transaction_id: Uuid,
        money: Money,
        status: &str,
        gateway_txn_id: Option<String>,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            money,
            status: status.to_string(),
            gateway_txn_id,
            processed_at,
        }
    }
}
