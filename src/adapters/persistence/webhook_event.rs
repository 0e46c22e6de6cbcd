use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::{PostgresPersistence, parse_column};
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::webhooks::WebhookEventRepoTrait;
use crate::domain::entities::webhook_event::{ProcessedStatus, WebhookEvent};

const SELECT_COLS: &str = "id, event_id, event_type, payload, signature, dedupe_hash, \
     processed_status, received_at, processed_at, failure_reason, created_at, updated_at, version";

fn row_to_event(row: sqlx::postgres::PgRow) -> AppResult<WebhookEvent> {
    Ok(WebhookEvent {
        id: row.get("id"),
        event_id: row.get("event_id"),
        event_type: row.get("event_type"),
        payload: row.get("payload"),
        signature: row.get("signature"),
        dedupe_hash: row.get("dedupe_hash"),
        processed_status: parse_column(
            row.get("processed_status"),
            "webhook_events.processed_status",
        )?,
        received_at: row.get("received_at"),
        processed_at: row.get("processed_at"),
        failure_reason: row.get("failure_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    })
}

#[async_trait]
impl WebhookEventRepoTrait for PostgresPersistence {
    async fn insert(&self, event: &WebhookEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events
                (id, event_id, event_type, payload, signature, dedupe_hash,
                 processed_status, received_at, processed_at, failure_reason,
                 created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(event.id)
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.signature)
        .bind(&event.dedupe_hash)
        .bind(event.processed_status.as_str())
        .bind(event.received_at)
        .bind(event.processed_at)
        .bind(&event.failure_reason)
        .bind(event.created_at)
        .bind(event.updated_at)
        .bind(event.version)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn save(&self, event: &WebhookEvent) -> AppResult<WebhookEvent> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE webhook_events
            SET processed_status = $2, processed_at = $3, failure_reason = $4,
                updated_at = $5, version = version + 1
            WHERE id = $1 AND version = $6
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(event.id)
        .bind(event.processed_status.as_str())
        .bind(event.processed_at)
        .bind(&event.failure_reason)
        .bind(event.updated_at)
        .bind(event.version)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_event).ok_or(AppError::Conflict)?
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM webhook_events WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_event).transpose()
    }

    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM webhook_events WHERE event_id = $1",
            SELECT_COLS
        ))
        .bind(event_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_event).transpose()
    }

    async fn find_first_pending(&self) -> AppResult<Option<WebhookEvent>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM webhook_events
            WHERE processed_status = $1
            ORDER BY received_at ASC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(ProcessedStatus::Pending.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_event).transpose()
    }

    async fn count_pending_before(&self, threshold: DateTime<Utc>) -> AppResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS pending FROM webhook_events
            WHERE processed_status = $1 AND received_at < $2
            "#,
        )
        .bind(ProcessedStatus::Pending.as_str())
        .bind(threshold)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.get("pending"))
    }

    async fn find_processing_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> AppResult<Vec<WebhookEvent>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM webhook_events
            WHERE processed_status = $1 AND processed_at < $2
            ORDER BY processed_at ASC
            "#,
            SELECT_COLS
        ))
        .bind(ProcessedStatus::Processing.as_str())
        .bind(threshold)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        rows.into_iter().map(row_to_event).collect()
    }
}
