use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "PENDING",
            ScheduleStatus::Success => "SUCCESS",
            ScheduleStatus::Failed => "FAILED",
            ScheduleStatus::Skipped => "SKIPPED",
        }
    }

    /// Settled rows are immutable.
    pub fn is_settled(&self) -> bool {
        !matches!(self, ScheduleStatus::Pending)
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScheduleStatus::Pending),
            "SUCCESS" => Ok(ScheduleStatus::Success),
            "FAILED" => Ok(ScheduleStatus::Failed),
            "SKIPPED" => Ok(ScheduleStatus::Skipped),
            _ => Err(format!("unknown schedule status: {}", s)),
        }
    }
}

/// One billing attempt for a subscription: the initial charge and every
/// retry each get their own row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSchedule {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub attempt_number: i32,
    pub status: ScheduleStatus,
    pub scheduled_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionSchedule {
    pub fn pending(
        subscription_id: Uuid,
        attempt_number: i32,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            attempt_number,
            status: ScheduleStatus::Pending,
            scheduled_at,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_success(&mut self, now: DateTime<Utc>) {
        self.status = ScheduleStatus::Success;
        self.updated_at = now;
    }

    pub fn mark_failure(&mut self, reason: &str, now: DateTime<Utc>) {
        self.status = ScheduleStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.updated_at = now;
    }

    pub fn mark_skipped(&mut self, now: DateTime<Utc>) {
        self.status = ScheduleStatus::Skipped;
        self.updated_at = now;
    }
}
