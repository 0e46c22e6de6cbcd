use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::PostgresPersistence;
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::subscriptions::DunningRepoTrait;
use crate::domain::entities::dunning::DunningAttempt;

const SELECT_COLS: &str =
    "id, subscription_id, scheduled_at, status, failure_code, failure_message, created_at";

fn row_to_attempt(row: sqlx::postgres::PgRow) -> DunningAttempt {
    DunningAttempt {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        scheduled_at: row.get("scheduled_at"),
        status: row.get("status"),
        failure_code: row.get("failure_code"),
        failure_message: row.get("failure_message"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl DunningRepoTrait for PostgresPersistence {
    async fn append(&self, attempt: &DunningAttempt) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO dunning_attempts
                (id, subscription_id, scheduled_at, status, failure_code,
                 failure_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.subscription_id)
        .bind(attempt.scheduled_at)
        .bind(&attempt.status)
        .bind(&attempt.failure_code)
        .bind(&attempt.failure_message)
        .bind(attempt.created_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<DunningAttempt>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM dunning_attempts
            WHERE subscription_id = $1
            ORDER BY created_at DESC
            "#,
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_attempt).collect())
    }
}
