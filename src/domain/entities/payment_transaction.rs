use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Authorization,
    Capture,
    Purchase,
    Void,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Authorization => "AUTHORIZATION",
            TransactionType::Capture => "CAPTURE",
            TransactionType::Purchase => "PURCHASE",
            TransactionType::Void => "VOID",
            TransactionType::Refund => "REFUND",
        }
    }

    /// Transaction types that represent captured funds, i.e. the base a
    /// refund draws against.
    pub fn is_capturing(&self) -> bool {
        matches!(self, TransactionType::Capture | TransactionType::Purchase)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTHORIZATION" => Ok(TransactionType::Authorization),
            "CAPTURE" => Ok(TransactionType::Capture),
            "PURCHASE" => Ok(TransactionType::Purchase),
            "VOID" => Ok(TransactionType::Void),
            "REFUND" => Ok(TransactionType::Refund),
            _ => Err(format!("unknown transaction type: {}", s)),
        }
    }
}

/// One gateway interaction on a payment order. Append-only: never mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub order_id: Uuid,
    pub txn_type: TransactionType,
    pub money: Money,
    pub gateway_txn_id: Option<String>,
    pub status: String,
    pub processed_at: DateTime<Utc>,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
}

impl PaymentTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        order_id: Uuid,
        txn_type: TransactionType,
        money: Money,
        gateway_txn_id: Option<String>,
        status: &str,
        processed_at: DateTime<Utc>,
        response_code: Option<String>,
        response_message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            txn_type,
            money,
            gateway_txn_id,
            status: status.to_string(),
            processed_at,
            response_code,
            response_message,
        }
    }
}
