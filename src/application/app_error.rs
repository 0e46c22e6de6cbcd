use thiserror::Error;

use crate::domain::entities::idempotency::KeyError;
use crate::domain::entities::money::MoneyError;
use crate::domain::entities::payment_order::InvalidTransition;
use crate::domain::entities::subscription::SubscriptionError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("payment order not found")]
    OrderNotFound,

    #[error("subscription not found")]
    SubscriptionNotFound,

    #[error("webhook event not found")]
    EventNotFound,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("duplicate request")]
    DuplicateRequest,

    #[error("duplicate subscription: {0}")]
    DuplicateSubscription(String),

    #[error("authorization transaction missing")]
    AuthMissing,

    #[error("capture transaction missing")]
    CaptureMissing,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("gateway declined: {0}")]
    GatewayDeclined(String),

    #[error("gateway error: {0}")]
    GatewayError(String),

    #[error("version conflict")]
    Conflict,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    OrderNotFound,
    SubscriptionNotFound,
    EventNotFound,
    InvalidState,
    DuplicateRequest,
    DuplicateSubscription,
    AuthMissing,
    CaptureMissing,
    InvalidAmount,
    GatewayDeclined,
    GatewayError,
    Conflict,
    InvalidInput,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            ErrorCode::EventNotFound => "EVENT_NOT_FOUND",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::DuplicateRequest => "DUPLICATE_REQUEST",
            ErrorCode::DuplicateSubscription => "DUPLICATE_SUBSCRIPTION",
            ErrorCode::AuthMissing => "AUTH_MISSING",
            ErrorCode::CaptureMissing => "CAPTURE_MISSING",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::GatewayDeclined => "GATEWAY_DECLINED",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::OrderNotFound => ErrorCode::OrderNotFound,
            AppError::SubscriptionNotFound => ErrorCode::SubscriptionNotFound,
            AppError::EventNotFound => ErrorCode::EventNotFound,
            AppError::InvalidState(_) => ErrorCode::InvalidState,
            AppError::DuplicateRequest => ErrorCode::DuplicateRequest,
            AppError::DuplicateSubscription(_) => ErrorCode::DuplicateSubscription,
            AppError::AuthMissing => ErrorCode::AuthMissing,
            AppError::CaptureMissing => ErrorCode::CaptureMissing,
            AppError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            AppError::GatewayDeclined(_) => ErrorCode::GatewayDeclined,
            AppError::GatewayError(_) => ErrorCode::GatewayError,
            AppError::Conflict => ErrorCode::Conflict,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Transport-level gateway failures may be retried by caller policy;
    /// declines are terminal for the attempt.
    pub fn is_retryable_gateway_failure(&self) -> bool {
        matches!(self, AppError::GatewayError(_))
    }
}

impl From<MoneyError> for AppError {
    fn from(err: MoneyError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<KeyError> for AppError {
    fn from(err: KeyError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::NotPausable(_) | SubscriptionError::NotResumable(_) => {
                AppError::InvalidState(err.to_string())
            }
            _ => AppError::InvalidInput(err.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::payment_order::PaymentOrderStatus;

    #[test]
    fn codes_match_the_taxonomy() {
        assert_eq!(AppError::OrderNotFound.code().as_str(), "ORDER_NOT_FOUND");
        assert_eq!(AppError::DuplicateRequest.code().as_str(), "DUPLICATE_REQUEST");
        assert_eq!(AppError::AuthMissing.code().as_str(), "AUTH_MISSING");
        assert_eq!(AppError::CaptureMissing.code().as_str(), "CAPTURE_MISSING");
        assert_eq!(
            AppError::GatewayDeclined("card declined".into()).code().as_str(),
            "GATEWAY_DECLINED"
        );
        assert_eq!(
            AppError::GatewayError("timeout".into()).code().as_str(),
            "GATEWAY_ERROR"
        );
        assert_eq!(
            AppError::InvalidAmount("over cap".into()).code().as_str(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            AppError::DuplicateSubscription("ref".into()).code().as_str(),
            "DUPLICATE_SUBSCRIPTION"
        );
    }

    #[test]
    fn invalid_transition_embeds_current_status() {
        let err: AppError = InvalidTransition {
            from: PaymentOrderStatus::Captured,
            to: PaymentOrderStatus::Cancelled,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::InvalidState);
        assert!(err.to_string().contains("CAPTURED"));
    }

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(AppError::GatewayError("timeout".into()).is_retryable_gateway_failure());
        assert!(!AppError::GatewayDeclined("declined".into()).is_retryable_gateway_failure());
    }
}
