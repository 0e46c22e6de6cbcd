use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::clock::Clock;
use crate::application::ports::queue::EventQueue;
use crate::domain::entities::webhook_event::{ProcessedStatus, WebhookEvent};

// ============================================================================
// Constants
// ============================================================================

/// Seconds an event may sit in `Processing` before the sweep presumes its
/// consumer dead and republishes it.
pub const STALE_AFTER_SECS: i64 = 300;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait WebhookEventRepoTrait: Send + Sync {
    async fn insert(&self, event: &WebhookEvent) -> AppResult<()>;

    /// Compare-and-swap on `version`; `AppError::Conflict` when the stored
    /// version moved.
    async fn save(&self, event: &WebhookEvent) -> AppResult<WebhookEvent>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEvent>>;

    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEvent>>;

    /// Oldest pending event, if any.
    async fn find_first_pending(&self) -> AppResult<Option<WebhookEvent>>;

    async fn count_pending_before(&self, threshold: DateTime<Utc>) -> AppResult<i64>;

    /// Events in `Processing` whose `processed_at` is before `threshold`.
    async fn find_processing_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> AppResult<Vec<WebhookEvent>>;
}

// ============================================================================
// Webhook Use Cases
// ============================================================================

/// Ingestion and processing state machine for gateway webhooks. Delivery is
/// at-least-once; correctness rests on the `event_id` uniqueness check plus
/// version-checked writes.
pub struct WebhookUseCases {
    events: Arc<dyn WebhookEventRepoTrait>,
    queue: Arc<dyn EventQueue>,
    clock: Arc<dyn Clock>,
    stale_after_secs: i64,
}

impl WebhookUseCases {
    pub fn new(
        events: Arc<dyn WebhookEventRepoTrait>,
        queue: Arc<dyn EventQueue>,
        clock: Arc<dyn Clock>,
        stale_after_secs: i64,
    ) -> Self {
        Self {
            events,
            queue,
            clock,
            stale_after_secs,
        }
    }

    /// Persists a new event as `Pending` and enqueues its id. A redelivery
    /// of a known `event_id` is a no-op returning the stored row: not an
    /// error, not re-persisted, not re-published.
    pub async fn record_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &str,
        signature: &str,
    ) -> AppResult<WebhookEvent> {
        if let Some(existing) = self.events.find_by_event_id(event_id).await? {
            tracing::info!(event_id = %event_id, "duplicate webhook delivery ignored");
            return Ok(existing);
        }

        let event = WebhookEvent::create(
            event_id,
            event_type,
            payload,
            signature,
            &dedupe_hash(payload),
            self.clock.now(),
        );
        self.events.insert(&event).await?;
        self.queue.publish(event.id).await?;
        tracing::info!(
            event_id = %event_id,
            event_type = %event_type,
            "webhook event recorded and enqueued"
        );
        Ok(event)
    }

    /// Claims an event for processing. First claims go `Pending →
    /// Processing`; a reclaim of an abandoned `Processing` event is also
    /// legal. The version CAS guarantees exactly one claimant wins.
    pub async fn mark_processing(&self, id: Uuid) -> AppResult<WebhookEvent> {
        let mut event = self.load_event(id).await?;
        match event.processed_status {
            ProcessedStatus::Pending | ProcessedStatus::Processing => {}
            status => {
                return Err(AppError::InvalidState(format!(
                    "webhook event cannot enter processing from {}",
                    status
                )));
            }
        }
        event.mark_processing(self.clock.now());
        self.events.save(&event).await
    }

    pub async fn mark_completed(&self, id: Uuid) -> AppResult<WebhookEvent> {
        let mut event = self.load_event(id).await?;
        if event.processed_status != ProcessedStatus::Processing {
            return Err(AppError::InvalidState(format!(
                "webhook event cannot complete from {}",
                event.processed_status
            )));
        }
        event.mark_completed(self.clock.now());
        self.events.save(&event).await
    }

    /// Records the failure reason and leaves the event for manual re-drive;
    /// failed events are not retried automatically.
    pub async fn mark_failed(&self, id: Uuid, reason: &str) -> AppResult<WebhookEvent> {
        let mut event = self.load_event(id).await?;
        if event.processed_status != ProcessedStatus::Processing {
            return Err(AppError::InvalidState(format!(
                "webhook event cannot fail from {}",
                event.processed_status
            )));
        }
        event.mark_failed(reason, self.clock.now());
        self.events.save(&event).await
    }

    pub async fn fetch_next_pending(&self) -> AppResult<Option<WebhookEvent>> {
        self.events.find_first_pending().await
    }

    pub async fn count_pending(&self, threshold: DateTime<Utc>) -> AppResult<i64> {
        self.events.count_pending_before(threshold).await
    }

    pub async fn get_event(&self, id: Uuid) -> AppResult<Option<WebhookEvent>> {
        self.events.find_by_id(id).await
    }

    /// Republishes events stuck in `Processing` past the stale threshold.
    /// Each event's claim timestamp is refreshed through a version-checked
    /// save first, so of N concurrent sweeps exactly one republishes it.
    /// Returns the number republished.
    pub async fn requeue_stale(&self) -> AppResult<usize> {
        let now = self.clock.now();
        let threshold = now - Duration::seconds(self.stale_after_secs);
        let stale = self.events.find_processing_before(threshold).await?;

        let mut republished = 0;
        for mut event in stale {
            event.mark_processing(now);
            match self.events.save(&event).await {
                Ok(saved) => {
                    tracing::warn!(
                        event_id = %saved.event_id,
                        "requeuing stale webhook event"
                    );
                    self.queue.publish(saved.id).await?;
                    republished += 1;
                }
                Err(AppError::Conflict) => {
                    // Another sweep or a live consumer got there first.
                    tracing::debug!(event_id = %event.event_id, "stale requeue lost version race");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(republished)
    }

    async fn load_event(&self, id: Uuid) -> AppResult<WebhookEvent> {
        self.events
            .find_by_id(id)
            .await?
            .ok_or(AppError::EventNotFound)
    }
}

/// Payload fingerprint for duplicate detection independent of the vendor
/// event id.
pub fn dedupe_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
