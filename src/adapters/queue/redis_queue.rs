use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::queue::EventQueue;

/// Redis list as the webhook hand-off queue. Only the event id crosses the
/// wire; consumers re-load the row and claim it through the version check.
#[derive(Clone)]
pub struct RedisEventQueue {
    manager: ConnectionManager,
    queue_key: String,
}

impl RedisEventQueue {
    pub async fn new(redis_url: &str, queue_key: &str) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| AppError::Internal(format!("redis client: {}", err)))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| AppError::Internal(format!("redis connection: {}", err)))?;
        Ok(Self {
            manager,
            queue_key: queue_key.to_string(),
        })
    }

}

#[async_trait]
impl EventQueue for RedisEventQueue {
    async fn publish(&self, webhook_event_id: Uuid) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .lpush(&self.queue_key, webhook_event_id.to_string())
            .await
            .map_err(|err| AppError::Internal(format!("redis lpush: {}", err)))?;
        Ok(())
    }
}
