use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::PostgresPersistence;
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::payments::RefundRepoTrait;
use crate::domain::entities::money::Money;
use crate::domain::entities::refund::Refund;

const SELECT_COLS: &str = "id, transaction_id, amount, currency, status, gateway_txn_id, processed_at";

fn row_to_refund(row: sqlx::postgres::PgRow) -> AppResult<Refund> {
    let amount: Decimal = row.get("amount");
    let currency: String = row.get("currency");
    let money = Money::new(amount, &currency)
        .map_err(|err| AppError::Internal(format!("corrupt refund money: {}", err)))?;
    Ok(Refund {
        id: row.get("id"),
        transaction_id: row.get("transaction_id"),
        money,
        status: row.get("status"),
        gateway_txn_id: row.get("gateway_txn_id"),
        processed_at: row.get("processed_at"),
    })
}

#[async_trait]
impl RefundRepoTrait for PostgresPersistence {
    async fn append(&self, refund: &Refund) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refunds
                (id, transaction_id, amount, currency, status, gateway_txn_id, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(refund.id)
        .bind(refund.transaction_id)
        .bind(refund.money.amount())
        .bind(refund.money.currency())
        .bind(&refund.status)
        .bind(&refund.gateway_txn_id)
        .bind(refund.processed_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn list_by_transaction(&self, transaction_id: Uuid) -> AppResult<Vec<Refund>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM refunds
            WHERE transaction_id = $1
            ORDER BY processed_at ASC
            "#,
            SELECT_COLS
        ))
        .bind(transaction_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        rows.into_iter().map(row_to_refund).collect()
    }
}
