use async_trait::async_trait;
use sqlx::Row;

use crate::adapters::persistence::PostgresPersistence;
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::idempotency::IdempotencyRecordRepoTrait;
use crate::domain::entities::idempotency::IdempotencyRecord;

const SELECT_COLS: &str =
    "id, idempotency_key, request_hash, response_payload, status_code, created_at";

fn row_to_record(row: sqlx::postgres::PgRow) -> IdempotencyRecord {
    IdempotencyRecord {
        id: row.get("id"),
        idempotency_key: row.get("idempotency_key"),
        request_hash: row.get("request_hash"),
        response_payload: row.get("response_payload"),
        status_code: row.get("status_code"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl IdempotencyRecordRepoTrait for PostgresPersistence {
    async fn find_by_key(&self, key: &str) -> AppResult<Option<IdempotencyRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM idempotency_records WHERE idempotency_key = $1",
            SELECT_COLS
        ))
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn insert(&self, record: &IdempotencyRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_records
                (id, idempotency_key, request_hash, response_payload, status_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.idempotency_key)
        .bind(&record.request_hash)
        .bind(&record.response_payload)
        .bind(record.status_code)
        .bind(record.created_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
