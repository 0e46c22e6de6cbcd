use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessedStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessedStatus::Pending => "PENDING",
            ProcessedStatus::Processing => "PROCESSING",
            ProcessedStatus::Completed => "COMPLETED",
            ProcessedStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ProcessedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessedStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ProcessedStatus::Pending),
            "PROCESSING" => Ok(ProcessedStatus::Processing),
            "COMPLETED" => Ok(ProcessedStatus::Completed),
            "FAILED" => Ok(ProcessedStatus::Failed),
            _ => Err(format!("unknown processed status: {}", s)),
        }
    }
}

/// Ingested gateway notification. `event_id` is the vendor-assigned id and
/// is unique: a redelivery returns the stored row untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub signature: String,
    pub dedupe_hash: String,
    pub processed_status: ProcessedStatus,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl WebhookEvent {
    pub fn create(
        event_id: &str,
        event_type: &str,
        payload: &str,
        signature: &str,
        dedupe_hash: &str,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            payload: payload.to_string(),
            signature: signature.to_string(),
            dedupe_hash: dedupe_hash.to_string(),
            processed_status: ProcessedStatus::Pending,
            received_at,
            processed_at: None,
            failure_reason: None,
            created_at: received_at,
            updated_at: received_at,
            version: 0,
        }
    }

    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.processed_status = ProcessedStatus::Processing;
        self.processed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.processed_status = ProcessedStatus::Completed;
        self.processed_at = Some(now);
        self.failure_reason = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, reason: &str, now: DateTime<Utc>) {
        self.processed_status = ProcessedStatus::Failed;
        self.processed_at = Some(now);
        self.failure_reason = Some(reason.to_string());
        self.updated_at = now;
    }

    /// True when the event has sat in `Processing` past `stale_after` seconds,
    /// i.e. its consumer is presumed dead.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after_secs: i64) -> bool {
        self.processed_status == ProcessedStatus::Processing
            && self
                .processed_at
                .map(|at| at + chrono::Duration::seconds(stale_after_secs) < now)
                .unwrap_or(false)
    }
}
