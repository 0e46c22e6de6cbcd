use std::str::FromStr;

use sqlx::PgPool;

use crate::app_error::{AppError, AppResult};

pub mod dunning;
pub mod idempotency_record;
pub mod payment_order;
pub mod payment_transaction;
pub mod refund;
pub mod subscription;
pub mod subscription_schedule;
pub mod webhook_event;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Parse a stored enum column. A value the domain cannot parse means the
/// row predates the current code or was corrupted; surface it instead of
/// guessing a default.
pub(crate) fn parse_column<T>(value: String, column: &str) -> AppResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse::<T>()
        .map_err(|err| AppError::Internal(format!("corrupt {} column: {}", column, err)))
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::Database("row not found".into()),
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    AppError::InvalidInput("a record with this value already exists".into())
                } else if msg.contains("foreign key") || msg.contains("violates foreign key") {
                    AppError::InvalidInput("referenced record not found".into())
                } else {
                    tracing::error!(error = ?err, "database error");
                    AppError::Database("database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "database error");
                AppError::Database("database operation failed".into())
            }
        }
    }
}
