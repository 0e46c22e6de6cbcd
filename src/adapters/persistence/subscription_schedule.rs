use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::{PostgresPersistence, parse_column};
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::subscriptions::ScheduleRepoTrait;
use crate::domain::entities::subscription_schedule::{ScheduleStatus, SubscriptionSchedule};

const SELECT_COLS: &str =
    "id, subscription_id, attempt_number, status, scheduled_at, failure_reason, created_at, updated_at";

fn row_to_schedule(row: sqlx::postgres::PgRow) -> AppResult<SubscriptionSchedule> {
    Ok(SubscriptionSchedule {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        attempt_number: row.get("attempt_number"),
        status: parse_column(row.get("status"), "subscription_schedules.status")?,
        scheduled_at: row.get("scheduled_at"),
        failure_reason: row.get("failure_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl ScheduleRepoTrait for PostgresPersistence {
    async fn insert(&self, schedule: &SubscriptionSchedule) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscription_schedules
                (id, subscription_id, attempt_number, status, scheduled_at,
                 failure_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.subscription_id)
        .bind(schedule.attempt_number)
        .bind(schedule.status.as_str())
        .bind(schedule.scheduled_at)
        .bind(&schedule.failure_reason)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn save(&self, schedule: &SubscriptionSchedule) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscription_schedules
            SET status = $2, failure_reason = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.status.as_str())
        .bind(&schedule.failure_reason)
        .bind(schedule.updated_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionSchedule>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscription_schedules
            WHERE subscription_id = $1
            ORDER BY scheduled_at ASC, attempt_number ASC
            "#,
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        rows.into_iter().map(row_to_schedule).collect()
    }

    async fn list_pending(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionSchedule>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscription_schedules
            WHERE subscription_id = $1 AND status = $2
            ORDER BY scheduled_at ASC, attempt_number ASC
            "#,
            SELECT_COLS
        ))
        .bind(subscription_id)
        .bind(ScheduleStatus::Pending.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        rows.into_iter().map(row_to_schedule).collect()
    }
}
