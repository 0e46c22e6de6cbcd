use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::{PostgresPersistence, parse_column};
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::payments::PaymentTransactionRepoTrait;
use crate::domain::entities::money::Money;
use crate::domain::entities::payment_transaction::PaymentTransaction;

const SELECT_COLS: &str = "id, order_id, txn_type, amount, currency, gateway_txn_id, status, \
     processed_at, response_code, response_message";

fn row_to_transaction(row: sqlx::postgres::PgRow) -> AppResult<PaymentTransaction> {
    let amount: Decimal = row.get("amount");
    let currency: String = row.get("currency");
    let money = Money::new(amount, &currency)
        .map_err(|err| AppError::Internal(format!("corrupt transaction money: {}", err)))?;
    Ok(PaymentTransaction {
        id: row.get("id"),
        order_id: row.get("order_id"),
        txn_type: parse_column(row.get("txn_type"), "payment_transactions.txn_type")?,
        money,
        gateway_txn_id: row.get("gateway_txn_id"),
        status: row.get("status"),
        processed_at: row.get("processed_at"),
        response_code: row.get("response_code"),
        response_message: row.get("response_message"),
    })
}

#[async_trait]
impl PaymentTransactionRepoTrait for PostgresPersistence {
    async fn append(&self, txn: &PaymentTransaction) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (id, order_id, txn_type, amount, currency, gateway_txn_id,
                 status, processed_at, response_code, response_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(txn.id)
        .bind(txn.order_id)
        .bind(txn.txn_type.as_str())
        .bind(txn.money.amount())
        .bind(txn.money.currency())
        .bind(&txn.gateway_txn_id)
        .bind(&txn.status)
        .bind(txn.processed_at)
        .bind(&txn.response_code)
        .bind(&txn.response_message)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> AppResult<Vec<PaymentTransaction>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM payment_transactions
            WHERE order_id = $1
            ORDER BY processed_at ASC
            "#,
            SELECT_COLS
        ))
        .bind(order_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        rows.into_iter().map(row_to_transaction).collect()
    }
}
