use chrono::{DateTime, Days, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Delinquent,
    Cancelled,
    Completed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Paused => "PAUSED",
            SubscriptionStatus::Delinquent => "DELINQUENT",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::Completed => "COMPLETED",
        }
    }

    /// Statuses the billing driver considers chargeable.
    pub fn is_billable(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Delinquent
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Completed
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "PAUSED" => Ok(SubscriptionStatus::Paused),
            "DELINQUENT" => Ok(SubscriptionStatus::Delinquent),
            "CANCELLED" => Ok(SubscriptionStatus::Cancelled),
            "COMPLETED" => Ok(SubscriptionStatus::Completed),
            _ => Err(format!("unknown subscription status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingCycle {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Bills every `interval_days` days (subscription field).
    Custom,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Daily => "DAILY",
            BillingCycle::Weekly => "WEEKLY",
            BillingCycle::Monthly => "MONTHLY",
            BillingCycle::Yearly => "YEARLY",
            BillingCycle::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY" => Ok(BillingCycle::Daily),
            "WEEKLY" => Ok(BillingCycle::Weekly),
            "MONTHLY" => Ok(BillingCycle::Monthly),
            "YEARLY" => Ok(BillingCycle::Yearly),
            "CUSTOM" => Ok(BillingCycle::Custom),
            _ => Err(format!("unknown billing cycle: {}", s)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("only active subscriptions can be paused (currently {0})")]
    NotPausable(SubscriptionStatus),

    #[error("only paused subscriptions can be resumed (currently {0})")]
    NotResumable(SubscriptionStatus),

    #[error("max retry attempts must be positive")]
    InvalidMaxRetries,

    #[error("payment method token cannot be blank")]
    BlankPaymentToken,
}

/// Recurring billing aggregate. Schedules and dunning rows are separate
/// tables keyed by `subscription_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub plan_code: String,
    pub billing_cycle: BillingCycle,
    pub interval_days: Option<i64>,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method_token: String,
    pub status: SubscriptionStatus,
    pub client_reference: String,
    pub trial_end: Option<DateTime<Utc>>,
    pub next_billing_at: DateTime<Utc>,
    pub delinquent_since: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retry_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Subscription {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        customer_id: Uuid,
        plan_code: &str,
        cycle: BillingCycle,
        interval_days: Option<i64>,
        amount: Decimal,
        currency: &str,
        payment_method_token: &str,
        client_reference: &str,
        trial_end: Option<DateTime<Utc>>,
        first_billing_at: DateTime<Utc>,
        max_retry_attempts: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            plan_code: plan_code.to_string(),
            billing_cycle: cycle,
            interval_days,
            amount,
            currency: currency.to_string(),
            payment_method_token: payment_method_token.to_string(),
            status: SubscriptionStatus::Active,
            client_reference: client_reference.to_string(),
            trial_end,
            next_billing_at: first_billing_at,
            delinquent_since: None,
            retry_count: 0,
            max_retry_attempts,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SubscriptionError> {
        if self.status != SubscriptionStatus::Active {
            return Err(SubscriptionError::NotPausable(self.status));
        }
        self.status = SubscriptionStatus::Paused;
        self.touch(now);
        Ok(())
    }

    pub fn resume(
        &mut self,
        next_billing_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        if self.status != SubscriptionStatus::Paused {
            return Err(SubscriptionError::NotResumable(self.status));
        }
        self.status = SubscriptionStatus::Active;
        self.next_billing_at = next_billing_at;
        self.touch(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Cancelled;
        self.touch(now);
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Completed;
        self.touch(now);
    }

    /// Successful charge resets the dunning state and advances the billing
    /// anchor by one cycle.
    pub fn record_successful_charge(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Active;
        self.retry_count = 0;
        self.delinquent_since = None;
        self.next_billing_at = self.next_billing_after(self.next_billing_at);
        self.touch(now);
    }

    /// Failed charge marks the subscription delinquent and points
    /// `next_billing_at` at the computed retry time.
    pub fn record_failed_charge(&mut self, next_attempt_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.retry_count += 1;
        if self.delinquent_since.is_none() {
            self.delinquent_since = Some(now);
        }
        self.status = SubscriptionStatus::Delinquent;
        self.next_billing_at = next_attempt_at;
        self.touch(now);
    }

    pub fn has_exceeded_retry_attempts(&self) -> bool {
        self.retry_count >= self.max_retry_attempts
    }

    pub fn should_auto_cancel(&self, now: DateTime<Utc>, auto_cancel_days: i64) -> bool {
        self.delinquent_since
            .map(|since| since + Duration::days(auto_cancel_days) < now)
            .unwrap_or(false)
    }

    /// Next regular billing date one cycle after `reference`.
    pub fn next_billing_after(&self, reference: DateTime<Utc>) -> DateTime<Utc> {
        match self.billing_cycle {
            BillingCycle::Daily => reference + Duration::days(1),
            BillingCycle::Weekly => reference + Duration::weeks(1),
            BillingCycle::Monthly => reference
                .checked_add_months(Months::new(1))
                .unwrap_or(reference),
            BillingCycle::Yearly => reference
                .checked_add_months(Months::new(12))
                .unwrap_or(reference),
            BillingCycle::Custom => reference
                .checked_add_days(Days::new(self.interval_days.unwrap_or(30).max(0) as u64))
                .unwrap_or(reference),
        }
    }

    pub fn update_plan(
        &mut self,
        plan_code: Option<&str>,
        amount: Option<Decimal>,
        currency: Option<&str>,
        now: DateTime<Utc>,
    ) {
        if let Some(code) = plan_code.filter(|c| !c.trim().is_empty()) {
            self.plan_code = code.to_string();
        }
        if let Some(amount) = amount {
            self.amount = amount;
        }
        if let Some(currency) = currency.filter(|c| !c.trim().is_empty()) {
            self.currency = currency.to_string();
        }
        self.touch(now);
    }

    pub fn update_payment_method(
        &mut self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        if token.trim().is_empty() {
            return Err(SubscriptionError::BlankPaymentToken);
        }
        self.payment_method_token = token.to_string();
        self.touch(now);
        Ok(())
    }

    pub fn set_max_retry_attempts(
        &mut self,
        max_retry_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        if max_retry_attempts <= 0 {
            return Err(SubscriptionError::InvalidMaxRetries);
        }
        self.max_retry_attempts = max_retry_attempts;
        self.touch(now);
        Ok(())
    }

    pub fn set_interval_days(&mut self, interval_days: Option<i64>, now: DateTime<Utc>) {
        self.interval_days = interval_days;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
