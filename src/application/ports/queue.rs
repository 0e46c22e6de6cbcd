use async_trait::async_trait;
use uuid::Uuid;

use crate::app_error::AppResult;

/// Fire-and-forget hand-off of a webhook event id to the processing queue.
/// Consumers re-load the row by id, so a duplicated publish is harmless.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn publish(&self, webhook_event_id: Uuid) -> AppResult<()>;
}
