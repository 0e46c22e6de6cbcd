use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::{PostgresPersistence, parse_column};
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::payments::PaymentOrderRepoTrait;
use crate::domain::entities::money::Money;
use crate::domain::entities::payment_order::PaymentOrder;

const SELECT_COLS: &str = "id, customer_id, amount, currency, status, correlation_id, \
     request_id, idempotency_key, created_at, updated_at, version";

fn row_to_order(row: sqlx::postgres::PgRow) -> AppResult<PaymentOrder> {
    let amount: Decimal = row.get("amount");
    let currency: String = row.get("currency");
    let money = Money::new(amount, &currency)
        .map_err(|err| AppError::Internal(format!("corrupt order money: {}", err)))?;
    Ok(PaymentOrder {
        id: row.get("id"),
        customer_id: row.get("customer_id"),
        money,
        status: parse_column(row.get("status"), "payment_orders.status")?,
        correlation_id: row.get("correlation_id"),
        request_id: row.get("request_id"),
        idempotency_key: row.get("idempotency_key"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    })
}

#[async_trait]
impl PaymentOrderRepoTrait for PostgresPersistence {
    async fn insert(&self, order: &PaymentOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_orders
                (id, customer_id, amount, currency, status, correlation_id,
                 request_id, idempotency_key, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.money.amount())
        .bind(order.money.currency())
        .bind(order.status.as_str())
        .bind(&order.correlation_id)
        .bind(&order.request_id)
        .bind(&order.idempotency_key)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.version)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn save(&self, order: &PaymentOrder) -> AppResult<PaymentOrder> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payment_orders
            SET status = $2, updated_at = $3, version = version + 1
            WHERE id = $1 AND version = $4
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(order.version)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        // No row matched: the version moved under us.
        row.map(row_to_order).ok_or(AppError::Conflict)?
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<PaymentOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_orders WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_order).transpose()
    }

    async fn find_by_request_id(&self, request_id: &str) -> AppResult<Option<PaymentOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_orders WHERE request_id = $1",
            SELECT_COLS
        ))
        .bind(request_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(row_to_order).transpose()
    }
}
