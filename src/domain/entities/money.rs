use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be non-negative")]
    NegativeAmount,

    #[error("currency must be a 3-letter ISO code")]
    InvalidCurrency,

    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(String, String),
}

/// Monetary amount with a fixed scale of 2 and an uppercase 3-letter
/// currency code. Immutable once constructed; arithmetic returns new values.
///
/// Amounts with more than 2 decimal places are rounded half-up on
/// construction, so `Money::new(dec!(10.004), "usd")` is `10.00 USD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Result<Self, MoneyError> {
        let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::NegativeAmount);
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency);
        }
        Ok(Self {
            amount,
            currency: currency.to_ascii_uppercase(),
        })
    }

    pub fn zero(currency: &str) -> Result<Self, MoneyError> {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Money::new(self.amount + other.amount, &self.currency)
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Money::new(self.amount - other.amount, &self.currency)
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.clone(),
                other.currency.clone(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
