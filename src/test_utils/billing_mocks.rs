use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::subscriptions::{
    DunningRepoTrait, ScheduleRepoTrait, SubscriptionRepoTrait,
};
use crate::domain::entities::dunning::DunningAttempt;
use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};
use crate::domain::entities::subscription_schedule::{ScheduleStatus, SubscriptionSchedule};

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    conflict_next_save: AtomicBool,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next_save_with_conflict(&self) {
        self.conflict_next_save.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionRepoTrait for InMemorySubscriptionRepo {
    async fn insert(&self, subscription: &Subscription) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions
            .values()
            .any(|s| s.client_reference == subscription.client_reference)
        {
            return Err(AppError::InvalidInput(
                "a record with this client reference already exists".into(),
            ));
        }
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn save(&self, subscription: &Subscription) -> AppResult<Subscription> {
        if self.conflict_next_save.swap(false, Ordering::SeqCst) {
            return Err(AppError::Conflict);
        }
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let stored = subscriptions
            .get_mut(&subscription.id)
            .ok_or(AppError::SubscriptionNotFound)?;
        if stored.version != subscription.version {
            return Err(AppError::Conflict);
        }
        let mut updated = subscription.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_client_reference(
        &self,
        reference: &str,
    ) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.client_reference == reference)
            .cloned())
    }

    async fn find_due(
        &self,
        statuses: &[SubscriptionStatus],
        threshold: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        let mut due: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| statuses.contains(&s.status) && s.next_billing_at <= threshold)
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_billing_at);
        Ok(due)
    }

    async fn list_all(&self) -> AppResult<Vec<Subscription>> {
        let mut all: Vec<Subscription> =
            self.subscriptions.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }
}

// ============================================================================
// InMemoryScheduleRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryScheduleRepo {
    schedules: Mutex<HashMap<Uuid, SubscriptionSchedule>>,
}

impl InMemoryScheduleRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleRepoTrait for InMemoryScheduleRepo {
    async fn insert(&self, schedule: &SubscriptionSchedule) -> AppResult<()> {
        self.schedules
            .lock()
            .unwrap()
            .insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn save(&self, schedule: &SubscriptionSchedule) -> AppResult<()> {
        self.schedules
            .lock()
            .unwrap()
            .insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionSchedule>> {
        let mut schedules: Vec<SubscriptionSchedule> = self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.subscription_id == subscription_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.scheduled_at, s.attempt_number));
        Ok(schedules)
    }

    async fn list_pending(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionSchedule>> {
        let mut pending: Vec<SubscriptionSchedule> = self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.subscription_id == subscription_id && s.status == ScheduleStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by_key(|s| (s.scheduled_at, s.attempt_number));
        Ok(pending)
    }
}

// ============================================================================
// InMemoryDunningRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryDunningRepo {
    attempts: Mutex<Vec<DunningAttempt>>,
}

impl InMemoryDunningRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl DunningRepoTrait for InMemoryDunningRepo {
    async fn append(&self, attempt: &DunningAttempt) -> AppResult<()> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<DunningAttempt>> {
        let mut attempts: Vec<DunningAttempt> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.subscription_id == subscription_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(attempts)
    }
}
