use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::clock::Clock;
use crate::application::ports::gateway::PaymentGateway;
use crate::application::use_cases::idempotency::IdempotencyGuard;
use crate::application::use_cases::payments::MAX_SAVE_RETRIES;
use crate::domain::entities::dunning::DunningAttempt;
use crate::domain::entities::idempotency::{CorrelationId, IdempotencyKey};
use crate::domain::entities::money::Money;
use crate::domain::entities::subscription::{BillingCycle, Subscription, SubscriptionStatus};
use crate::domain::entities::subscription_schedule::SubscriptionSchedule;

// ============================================================================
// Constants
// ============================================================================

/// Days to wait before retrying a failed charge, indexed by the number of
/// prior failures. Beyond the table the next regular billing-cycle date is
/// used.
const RETRY_BACKOFF_DAYS: [i64; 3] = [1, 3, 7];

pub const DEFAULT_AUTO_CANCEL_DAYS: i64 = 30;

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait SubscriptionRepoTrait: Send + Sync {
    async fn insert(&self, subscription: &Subscription) -> AppResult<()>;

    /// Compare-and-swap on `version`; `AppError::Conflict` when the stored
    /// version moved.
    async fn save(&self, subscription: &Subscription) -> AppResult<Subscription>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;

    async fn find_by_client_reference(&self, reference: &str)
    -> AppResult<Option<Subscription>>;

    /// Subscriptions in any of `statuses` with `next_billing_at <= threshold`.
    async fn find_due(
        &self,
        statuses: &[SubscriptionStatus],
        threshold: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>>;

    async fn list_all(&self) -> AppResult<Vec<Subscription>>;
}

#[async_trait]
pub trait ScheduleRepoTrait: Send + Sync {
    async fn insert(&self, schedule: &SubscriptionSchedule) -> AppResult<()>;

    async fn save(&self, schedule: &SubscriptionSchedule) -> AppResult<()>;

    /// All schedules for a subscription, oldest scheduled first.
    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionSchedule>>;

    async fn list_pending(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionSchedule>>;
}

#[async_trait]
pub trait DunningRepoTrait: Send + Sync {
    async fn append(&self, attempt: &DunningAttempt) -> AppResult<()>;

    /// Newest first.
    async fn list_by_subscription(&self, subscription_id: Uuid)
    -> AppResult<Vec<DunningAttempt>>;
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    pub customer_id: Uuid,
    pub plan_code: String,
    pub client_reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub interval_days: Option<i64>,
    pub payment_method_token: String,
    pub trial_end: Option<DateTime<Utc>>,
    pub first_billing_at: DateTime<Utc>,
    pub max_retry_attempts: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSubscriptionInput {
    pub plan_code: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub payment_method_token: Option<String>,
    pub max_retry_attempts: Option<i32>,
    pub interval_days: Option<i64>,
    pub next_billing_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Subscription Use Cases
// ============================================================================

/// Subscription lifecycle plus the billing retry engine. This is the one
/// place that locally recovers from gateway failures (by scheduling a retry)
/// instead of surfacing them, because it runs unattended.
pub struct SubscriptionUseCases {
    subscriptions: Arc<dyn SubscriptionRepoTrait>,
    schedules: Arc<dyn ScheduleRepoTrait>,
    dunning: Arc<dyn DunningRepoTrait>,
    guard: Arc<IdempotencyGuard>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    auto_cancel_days: i64,
}

impl SubscriptionUseCases {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepoTrait>,
        schedules: Arc<dyn ScheduleRepoTrait>,
        dunning: Arc<dyn DunningRepoTrait>,
        guard: Arc<IdempotencyGuard>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        auto_cancel_days: i64,
    ) -> Self {
        Self {
            subscriptions,
            schedules,
            dunning,
            guard,
            gateway,
            clock,
            auto_cancel_days,
        }
    }

    /// Creates the subscription and its first pending billing attempt. The
    /// idempotency guard is consulted before any side effect, and the
    /// business uniqueness key (`client_reference`) is checked separately so
    /// the same subscription cannot be created twice under different keys.
    pub async fn create_subscription(
        &self,
        input: CreateSubscriptionInput,
        idempotency_key: &IdempotencyKey,
        correlation_id: &CorrelationId,
    ) -> AppResult<Subscription> {
        let now = self.clock.now();

        if self.guard.find_existing(idempotency_key).await?.is_some() {
            return Err(AppError::DuplicateRequest);
        }
        if self
            .subscriptions
            .find_by_client_reference(&input.client_reference)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateSubscription(input.client_reference));
        }
        if input.max_retry_attempts <= 0 {
            return Err(AppError::InvalidInput(
                "max retry attempts must be positive".into(),
            ));
        }
        if input.billing_cycle == BillingCycle::Custom
            && input.interval_days.filter(|days| *days > 0).is_none()
        {
            return Err(AppError::InvalidInput(
                "custom billing cycle requires positive interval days".into(),
            ));
        }
        // Normalizes scale and currency the same way order money is.
        let money = Money::new(input.amount, &input.currency)?;

        let subscription = Subscription::create(
            input.customer_id,
            &input.plan_code,
            input.billing_cycle,
            input.interval_days,
            money.amount(),
            money.currency(),
            &input.payment_method_token,
            &input.client_reference,
            input.trial_end,
            input.first_billing_at,
            input.max_retry_attempts,
            now,
        );
        self.subscriptions.insert(&subscription).await?;

        let schedule =
            SubscriptionSchedule::pending(subscription.id, 0, input.first_billing_at, now);
        self.schedules.insert(&schedule).await?;

        self.guard
            .persist(
                idempotency_key,
                &format!("{}-subscription-create", correlation_id),
                &subscription.id.to_string(),
                201,
            )
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            correlation_id = %correlation_id,
            plan_code = %subscription.plan_code,
            "subscription created"
        );
        Ok(subscription)
    }

    pub async fn pause_subscription(&self, subscription_id: Uuid) -> AppResult<Subscription> {
        self.save_subscription_with(subscription_id, |sub| {
            sub.pause(self.clock.now())?;
            Ok(())
        })
        .await
    }

    pub async fn resume_subscription(
        &self,
        subscription_id: Uuid,
        next_billing_at: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        self.save_subscription_with(subscription_id, |sub| {
            sub.resume(next_billing_at, self.clock.now())?;
            Ok(())
        })
        .await
    }

    pub async fn cancel_subscription(&self, subscription_id: Uuid) -> AppResult<Subscription> {
        self.save_subscription_with(subscription_id, |sub| {
            sub.cancel(self.clock.now());
            Ok(())
        })
        .await
    }

    pub async fn update_subscription(
        &self,
        subscription_id: Uuid,
        input: UpdateSubscriptionInput,
    ) -> AppResult<Subscription> {
        self.save_subscription_with(subscription_id, |sub| {
            let now = self.clock.now();
            if input.plan_code.is_some() || input.amount.is_some() || input.currency.is_some() {
                // Normalize through Money so the scale and currency rules
                // hold on update as well as create.
                let currency = input.currency.as_deref().unwrap_or(&sub.currency);
                let amount = match input.amount {
                    Some(amount) => Some(Money::new(amount, currency)?.amount()),
                    None => None,
                };
                sub.update_plan(input.plan_code.as_deref(), amount, input.currency.as_deref(), now);
            }
            if let Some(token) = input.payment_method_token.as_deref() {
                sub.update_payment_method(token, now)?;
            }
            if let Some(max) = input.max_retry_attempts {
                sub.set_max_retry_attempts(max, now)?;
            }
            if let Some(days) = input.interval_days {
                sub.set_interval_days(Some(days), now);
            }
            if let Some(next) = input.next_billing_at {
                sub.next_billing_at = next;
            }
            Ok(())
        })
        .await
    }

    pub async fn get_subscription(&self, subscription_id: Uuid) -> AppResult<Subscription> {
        self.load_subscription(subscription_id).await
    }

    pub async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        self.subscriptions.list_all().await
    }

    pub async fn get_schedules(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionSchedule>> {
        self.load_subscription(subscription_id).await?;
        self.schedules.list_by_subscription(subscription_id).await
    }

    pub async fn get_dunning_history(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<DunningAttempt>> {
        self.load_subscription(subscription_id).await?;
        self.dunning.list_by_subscription(subscription_id).await
    }

    /// Subscriptions the billing driver should look at.
    pub async fn due_subscriptions(&self, threshold: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        self.subscriptions
            .find_due(
                &[SubscriptionStatus::Active, SubscriptionStatus::Delinquent],
                threshold,
            )
            .await
    }

    /// One sequential pass over everything due. The worker loop fans
    /// subscriptions out instead; different subscriptions are independent.
    pub async fn process_due_subscriptions(&self, threshold: DateTime<Utc>) -> AppResult<()> {
        for subscription in self.due_subscriptions(threshold).await? {
            if let Err(err) = self.process_subscription(subscription.id).await {
                tracing::error!(
                    subscription_id = %subscription.id,
                    error = %err,
                    "billing pass failed for subscription"
                );
            }
        }
        Ok(())
    }

    /// Charges every pending schedule of one subscription.
    pub async fn process_subscription(&self, subscription_id: Uuid) -> AppResult<()> {
        let subscription = self.load_subscription(subscription_id).await?;
        if !subscription.status.is_billable() {
            return Ok(());
        }
        for schedule in self.schedules.list_pending(subscription_id).await? {
            self.process_schedule(&subscription, schedule).await?;
        }
        Ok(())
    }

    async fn process_schedule(
        &self,
        subscription: &Subscription,
        mut schedule: SubscriptionSchedule,
    ) -> AppResult<()> {
        let now = self.clock.now();
        let money = Money::new(subscription.amount, &subscription.currency)?;

        let charge = self
            .gateway
            .purchase(
                &money,
                &subscription.payment_method_token,
                &subscription.client_reference,
            )
            .await;

        match charge {
            Ok(_) => {
                let updated = self
                    .save_subscription_with(subscription.id, |sub| {
                        sub.record_successful_charge(now);
                        Ok(())
                    })
                    .await?;
                schedule.mark_success(now);
                self.schedules.save(&schedule).await?;
                tracing::info!(
                    subscription_id = %subscription.id,
                    next_billing_at = %updated.next_billing_at,
                    "subscription charge succeeded"
                );
                Ok(())
            }
            Err(err) => {
                self.handle_failed_charge(subscription.id, schedule, &err, now)
                    .await
            }
        }
    }

    async fn handle_failed_charge(
        &self,
        subscription_id: Uuid,
        mut schedule: SubscriptionSchedule,
        err: &AppError,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let reason = err.to_string();
        let failure_code = err.code().as_str();

        let updated = self
            .save_subscription_with(subscription_id, |sub| {
                let next_attempt = self.retry_time(sub, now);
                sub.record_failed_charge(next_attempt, now);
                Ok(())
            })
            .await?;

        schedule.mark_failure(&reason, now);
        self.schedules.save(&schedule).await?;
        self.dunning
            .append(&DunningAttempt::record(
                subscription_id,
                now,
                "FAILED",
                Some(failure_code.to_string()),
                Some(reason.clone()),
                now,
            ))
            .await?;
        tracing::error!(
            subscription_id = %subscription_id,
            retry_count = updated.retry_count,
            error = %reason,
            "subscription charge failed"
        );

        if updated.has_exceeded_retry_attempts() {
            self.save_subscription_with(subscription_id, |sub| {
                sub.cancel(self.clock.now());
                Ok(())
            })
            .await?;
            tracing::warn!(
                subscription_id = %subscription_id,
                "subscription cancelled after exhausting retries"
            );
            return Ok(());
        }

        if updated.should_auto_cancel(now, self.auto_cancel_days) {
            self.save_subscription_with(subscription_id, |sub| {
                sub.cancel(self.clock.now());
                Ok(())
            })
            .await?;
            tracing::warn!(
                subscription_id = %subscription_id,
                "subscription cancelled after delinquency window"
            );
            return Ok(());
        }

        let retry = SubscriptionSchedule::pending(
            subscription_id,
            schedule.attempt_number + 1,
            updated.next_billing_at,
            now,
        );
        self.schedules.insert(&retry).await?;
        Ok(())
    }

    /// Backoff by prior failure count: +1d, +3d, +7d, then the next regular
    /// billing-cycle date.
    fn retry_time(&self, subscription: &Subscription, now: DateTime<Utc>) -> DateTime<Utc> {
        match RETRY_BACKOFF_DAYS.get(subscription.retry_count as usize) {
            Some(days) => now + Duration::days(*days),
            None => subscription.next_billing_after(now),
        }
    }

    async fn load_subscription(&self, subscription_id: Uuid) -> AppResult<Subscription> {
        self.subscriptions
            .find_by_id(subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)
    }

    /// Re-read, re-apply, re-save on version conflict; the gateway outcome
    /// being persisted must not be dropped by a lost race.
    async fn save_subscription_with<F>(
        &self,
        subscription_id: Uuid,
        mutate: F,
    ) -> AppResult<Subscription>
    where
        F: Fn(&mut Subscription) -> AppResult<()>,
    {
        for _ in 0..MAX_SAVE_RETRIES {
            let mut subscription = self.load_subscription(subscription_id).await?;
            mutate(&mut subscription)?;
            match self.subscriptions.save(&subscription).await {
                Ok(saved) => return Ok(saved),
                Err(AppError::Conflict) => {
                    tracing::debug!(
                        subscription_id = %subscription_id,
                        "subscription save lost version race, retrying"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::idempotency::IdempotencyRecordRepoTrait;
    use crate::domain::entities::subscription_schedule::ScheduleStatus;
    use crate::test_utils::{
        InMemoryDunningRepo, InMemoryIdempotencyRepo, InMemoryScheduleRepo,
        InMemorySubscriptionRepo, ManualClock, MockGateway, create_subscription_input,
    };
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    struct Fixture {
        use_cases: SubscriptionUseCases,
        subscriptions: Arc<InMemorySubscriptionRepo>,
        schedules: Arc<InMemoryScheduleRepo>,
        dunning: Arc<InMemoryDunningRepo>,
        gateway: Arc<MockGateway>,
        clock: Arc<ManualClock>,
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        fixture_with_repo(Arc::new(InMemoryIdempotencyRepo::new()))
    }

    fn fixture_with_repo(idempotency: Arc<dyn IdempotencyRecordRepoTrait>) -> Fixture {
        let subscriptions = Arc::new(InMemorySubscriptionRepo::new());
        let schedules = Arc::new(InMemoryScheduleRepo::new());
        let dunning = Arc::new(InMemoryDunningRepo::new());
        let gateway = Arc::new(MockGateway::new());
        let clock = Arc::new(ManualClock::new(at(2024, 1, 1)));
        let guard = Arc::new(IdempotencyGuard::new(idempotency, clock.clone()));
        let use_cases = SubscriptionUseCases::new(
            subscriptions.clone(),
            schedules.clone(),
            dunning.clone(),
            guard,
            gateway.clone(),
            clock.clone(),
            DEFAULT_AUTO_CANCEL_DAYS,
        );
        Fixture {
            use_cases,
            subscriptions,
            schedules,
            dunning,
            gateway,
            clock,
        }
    }

    fn key(value: &str) -> IdempotencyKey {
        IdempotencyKey::new(value).unwrap()
    }

    async fn create(f: &Fixture, reference: &str, key_value: &str) -> Subscription {
        f.use_cases
            .create_subscription(
                create_subscription_input(reference, |input| {
                    input.first_billing_at = at(2024, 1, 15);
                }),
                &key(key_value),
                &CorrelationId::new_id(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_persists_subscription_and_first_schedule() {
        let f = fixture();
        let sub = create(&f, "ref-1", "sub-key-0001").await;

        assert_eq!(sub.status, SubscriptionStatus::Active);
        let schedules = f.schedules.list_by_subscription(sub.id).await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].attempt_number, 0);
        assert_eq!(schedules[0].status, ScheduleStatus::Pending);
        assert_eq!(schedules[0].scheduled_at, at(2024, 1, 15));
    }

    #[tokio::test]
    async fn duplicate_client_reference_is_rejected() {
        let f = fixture();
        create(&f, "ref-1", "sub-key-0001").await;

        let err = f
            .use_cases
            .create_subscription(
                create_subscription_input("ref-1", |_| {}),
                &key("sub-key-0002"),
                &CorrelationId::new_id(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateSubscription(_)));
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_rejected_before_side_effects() {
        let f = fixture();
        create(&f, "ref-1", "sub-key-0001").await;

        let err = f
            .use_cases
            .create_subscription(
                create_subscription_input("ref-2", |_| {}),
                &key("sub-key-0001"),
                &CorrelationId::new_id(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateRequest));
        assert!(
            f.subscriptions
                .find_by_client_reference("ref-2")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn successful_charge_advances_billing_and_settles_schedule() {
        let f = fixture();
        let sub = create(&f, "ref-1", "sub-key-0001").await;

        f.clock.set(at(2024, 1, 15));
        f.use_cases
            .process_due_subscriptions(at(2024, 1, 15))
            .await
            .unwrap();

        let updated = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(updated.status, SubscriptionStatus::Active);
        assert_eq!(updated.retry_count, 0);
        assert_eq!(updated.next_billing_at, at(2024, 2, 15));

        let schedules = f.schedules.list_by_subscription(sub.id).await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].status, ScheduleStatus::Success);
        assert_eq!(f.gateway.purchase_calls(), 1);
    }

    #[tokio::test]
    async fn backoff_sequence_is_1_3_7_then_next_cycle() {
        let f = fixture();
        let sub = create(&f, "ref-1", "sub-key-0001").await;

        // Failure with 0 prior failures: +1 day.
        f.clock.set(at(2024, 1, 15));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();
        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.status, SubscriptionStatus::Delinquent);
        assert_eq!(s.next_billing_at, at(2024, 1, 16));

        // 1 prior failure: +3 days.
        f.clock.set(at(2024, 1, 16));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();
        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.next_billing_at, at(2024, 1, 19));

        // 2 prior failures: +7 days.
        f.clock.set(at(2024, 1, 19));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();
        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.next_billing_at, at(2024, 1, 26));

        // 3 prior failures on a monthly cycle: next regular cycle, +1 month.
        // max_retry_attempts is high enough not to cancel first.
        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.retry_count, 3);
        f.clock.set(at(2024, 1, 26));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();
        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.next_billing_at, at(2024, 2, 26));
    }

    #[tokio::test]
    async fn exhausting_retries_cancels_without_new_schedule() {
        let f = fixture();
        let sub = f
            .use_cases
            .create_subscription(
                create_subscription_input("ref-1", |input| {
                    input.first_billing_at = at(2024, 1, 15);
                    input.max_retry_attempts = 2;
                }),
                &key("sub-key-0001"),
                &CorrelationId::new_id(),
            )
            .await
            .unwrap();

        f.clock.set(at(2024, 1, 15));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();
        assert_eq!(
            f.use_cases.get_subscription(sub.id).await.unwrap().status,
            SubscriptionStatus::Delinquent
        );

        f.clock.set(at(2024, 1, 16));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();

        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.status, SubscriptionStatus::Cancelled);
        assert_eq!(s.retry_count, 2);

        // Initial attempt + one retry; the cancelling failure creates none.
        let schedules = f.schedules.list_by_subscription(sub.id).await.unwrap();
        assert_eq!(schedules.len(), 2);
        assert!(schedules.iter().all(|s| s.status == ScheduleStatus::Failed));
        assert_eq!(f.dunning.count().await, 2);
    }

    #[tokio::test]
    async fn long_delinquency_cancels_even_with_retries_left() {
        let f = fixture();
        let sub = f
            .use_cases
            .create_subscription(
                create_subscription_input("ref-1", |input| {
                    input.first_billing_at = at(2024, 1, 15);
                    input.max_retry_attempts = 99;
                }),
                &key("sub-key-0001"),
                &CorrelationId::new_id(),
            )
            .await
            .unwrap();

        f.clock.set(at(2024, 1, 15));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();

        // 40 days later the grace window (30 days) has long passed.
        f.clock.set(at(2024, 2, 24));
        f.gateway
            .push_outcome(Err(AppError::GatewayDeclined("declined".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();

        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.status, SubscriptionStatus::Cancelled);
        assert!(s.retry_count < s.max_retry_attempts);
    }

    #[tokio::test]
    async fn failed_charge_appends_dunning_with_error_code() {
        let f = fixture();
        let sub = create(&f, "ref-1", "sub-key-0001").await;

        f.clock.set(at(2024, 1, 15));
        f.gateway
            .push_outcome(Err(AppError::GatewayError("connect timeout".into())));
        f.use_cases.process_subscription(sub.id).await.unwrap();

        let history = f.use_cases.get_dunning_history(sub.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].failure_code.as_deref(), Some("GATEWAY_ERROR"));
        assert!(history[0].failure_message.is_some());
    }

    #[tokio::test]
    async fn paused_subscriptions_are_not_billed() {
        let f = fixture();
        let sub = create(&f, "ref-1", "sub-key-0001").await;
        f.use_cases.pause_subscription(sub.id).await.unwrap();

        f.clock.set(at(2024, 1, 15));
        f.use_cases
            .process_due_subscriptions(at(2024, 1, 15))
            .await
            .unwrap();
        assert_eq!(f.gateway.purchase_calls(), 0);

        let resumed = f
            .use_cases
            .resume_subscription(sub.id, at(2024, 2, 1))
            .await
            .unwrap();
        assert_eq!(resumed.status, SubscriptionStatus::Active);
        assert_eq!(resumed.next_billing_at, at(2024, 2, 1));
    }

    #[tokio::test]
    async fn update_subscription_applies_partial_changes() {
        let f = fixture();
        let sub = create(&f, "ref-1", "sub-key-0001").await;

        let updated = f
            .use_cases
            .update_subscription(
                sub.id,
                UpdateSubscriptionInput {
                    plan_code: Some("plan-pro".into()),
                    amount: Some(dec!(19.99)),
                    payment_method_token: Some("tok-new".into()),
                    max_retry_attempts: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.plan_code, "plan-pro");
        assert_eq!(updated.amount, dec!(19.99));
        assert_eq!(updated.payment_method_token, "tok-new");
        assert_eq!(updated.max_retry_attempts, 5);
        // untouched fields survive
        assert_eq!(updated.client_reference, "ref-1");
    }

    #[tokio::test]
    async fn unknown_subscription_is_not_found() {
        let f = fixture();
        let err = f
            .use_cases
            .get_subscription(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SubscriptionNotFound));
    }

    #[tokio::test]
    async fn charge_outcome_survives_version_race() {
        let f = fixture();
        let sub = create(&f, "ref-1", "sub-key-0001").await;

        f.clock.set(at(2024, 1, 15));
        f.subscriptions.fail_next_save_with_conflict().await;
        f.use_cases.process_subscription(sub.id).await.unwrap();

        let s = f.use_cases.get_subscription(sub.id).await.unwrap();
        assert_eq!(s.next_billing_at, at(2024, 2, 15));
    }
}
