use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::queue::EventQueue;
use crate::application::use_cases::webhooks::WebhookEventRepoTrait;
use crate::domain::entities::webhook_event::{ProcessedStatus, WebhookEvent};

// ============================================================================
// InMemoryWebhookEventRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryWebhookEventRepo {
    events: Mutex<HashMap<Uuid, WebhookEvent>>,
    conflict_next_save: AtomicBool,
}

impl InMemoryWebhookEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub async fn fail_next_save_with_conflict(&self) {
        self.conflict_next_save.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl WebhookEventRepoTrait for InMemoryWebhookEventRepo {
    async fn insert(&self, event: &WebhookEvent) -> AppResult<()> {
        let mut events = self.events.lock().unwrap();
        if events.values().any(|e| e.event_id == event.event_id) {
            return Err(AppError::InvalidInput(
                "a record with this event id already exists".into(),
            ));
        }
        events.insert(event.id, event.clone());
        Ok(())
    }

    async fn save(&self, event: &WebhookEvent) -> AppResult<WebhookEvent> {
        if self.conflict_next_save.swap(false, Ordering::SeqCst) {
            return Err(AppError::Conflict);
        }
        let mut events = self.events.lock().unwrap();
        let stored = events.get_mut(&event.id).ok_or(AppError::EventNotFound)?;
        if stored.version != event.version {
            return Err(AppError::Conflict);
        }
        let mut updated = event.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEvent>> {
        Ok(self.events.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .values()
            .find(|e| e.event_id == event_id)
            .cloned())
    }

    async fn find_first_pending(&self) -> AppResult<Option<WebhookEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.processed_status == ProcessedStatus::Pending)
            .min_by_key(|e| e.received_at)
            .cloned())
    }

    async fn count_pending_before(&self, threshold: DateTime<Utc>) -> AppResult<i64> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| {
                e.processed_status == ProcessedStatus::Pending && e.received_at < threshold
            })
            .count() as i64)
    }

    async fn find_processing_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> AppResult<Vec<WebhookEvent>> {
        let mut stale: Vec<WebhookEvent> = self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| {
                e.processed_status == ProcessedStatus::Processing
                    && e.processed_at.map(|at| at < threshold).unwrap_or(false)
            })
            .cloned()
            .collect();
        stale.sort_by_key(|e| e.processed_at);
        Ok(stale)
    }
}

// ============================================================================
// CaptureQueue
// ============================================================================

/// Queue double that records every published event id.
#[derive(Default)]
pub struct CaptureQueue {
    published: Mutex<Vec<Uuid>>,
}

impl CaptureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<Uuid> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventQueue for CaptureQueue {
    async fn publish(&self, webhook_event_id: Uuid) -> AppResult<()> {
        self.published.lock().unwrap().push(webhook_event_id);
        Ok(())
    }
}
