use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit trail of failed recurring charges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DunningAttempt {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DunningAttempt {
    pub fn record(
        subscription_id: Uuid,
        scheduled_at: DateTime<Utc>,
        status: &str,
        failure_code: Option<String>,
        failure_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            scheduled_at,
            status: status.to_string(),
            failure_code,
            failure_message,
            created_at: now,
        }
    }
}
