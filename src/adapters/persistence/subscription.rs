use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::{PostgresPersistence, parse_column};
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::subscriptions::SubscriptionRepoTrait;
use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};

const SELECT_COLS: &str = "id, customer_id, plan_code, billing_cycle, interval_days, amount, \
     currency, payment_method_token, status, client_reference, trial_end, next_billing_at, \
     delinquent_since, retry_count, max_retry_attempts, created_at, updated_at, version";

fn row_to_subscription(row: sqlx::postgres::PgRow) -> AppResult<Subscription> {
    Ok(Subscription {
        id: row.get("id"),
        customer_id: row.get("customer_id"),
        plan_code: row.get("plan_code"),
        billing_cycle: parse_column(row.get("billing_cycle"), "subscriptions.billing_cycle")?,
        interval_days: row.get("interval_days"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        payment_method_token: row.get("payment_method_token"),
        status: parse_column(row.get("status"), "subscriptions.status")?,
        client_reference: row.get("client_reference"),
        trial_end: row.get("trial_end"),
        next_billing_at: row.get("next_billing_at"),
        delinquent_since: row.get("delinquent_since"),
        retry_count: row.get("retry_count"),
        max_retry_attempts: row.get("max_retry_attempts"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    })
}

#[async_trait]
impl SubscriptionRepoTrait for PostgresPersistence {
    async fn insert(&self, subscription: &Subscription) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (id, customer_id, plan_code, billing_cycle, interval_days, amount,
                 currency, payment_method_token, status, client_reference, trial_end,
                 next_billing_at, delinquent_since, retry_count, max_retry_attempts,
                 created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.customer_id)
        .bind(&subscription.plan_code)
        .bind(subscription.billing_cycle.as_str())
        .bind(subscription.interval_days)
        .bind(subscription.amount)
        .bind(&subscription.currency)
        .bind(&subscription.payment_method_token)
        .bind(subscription.status.as_str())
        .bind(&subscription.client_reference)
        .bind(subscription.trial_end)
        .bind(subscription.next_billing_at)
        .bind(subscription.delinquent_since)
        .bind(subscription.retry_count)
        .bind(subscription.max_retry_attempts)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .bind(subscription.version)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn save(&self, subscription: &Subscription) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET plan_code = $2, billing_cycle = $3, interval_days = $4, amount = $5,
                currency = $6, payment_method_token = $7, status = $8, trial_end = $9,
                next_billing_at = $10, delinquent_since = $11, retry_count = $12,
                max_retry_attempts = $13, updated_at = $14, version = version + 1
            WHERE id = $1 AND version = $15
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(subscription.id)
        .bind(&subscription.plan_code)
        .bind(subscription.billing_cycle.as_str())
        .bind(subscription.interval_days)
        .bind(subscription.amount)
        .bind(&subscription.currency)
        .bind(&subscription.payment_method_token)
        .bind(subscription.status.as_str())
        .bind(subscription.trial_end)
        .bind(subscription.next_billing_at)
        .bind(subscription.delinquent_since)
        .bind(subscription.retry_count)
        .bind(subscription.max_retry_attempts)
        .bind(subscription.updated_at)
        .bind(subscription.version)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_subscription).ok_or(AppError::Conflict)?
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_subscription).transpose()
    }

    async fn find_by_client_reference(
        &self,
        reference: &str,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE client_reference = $1",
            SELECT_COLS
        ))
        .bind(reference)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_subscription).transpose()
    }

    async fn find_due(
        &self,
        statuses: &[SubscriptionStatus],
        threshold: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        let status_names: Vec<String> =
            statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE status = ANY($1) AND next_billing_at <= $2
            ORDER BY next_billing_at ASC
            "#,
            SELECT_COLS
        ))
        .bind(&status_names)
        .bind(threshold)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        rows.into_iter().map(row_to_subscription).collect()
    }

    async fn list_all(&self) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions ORDER BY created_at ASC",
            SELECT_COLS
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        rows.into_iter().map(row_to_subscription).collect()
    }
}
