use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("idempotency key must be 8-128 chars of [A-Za-z0-9_-]")]
    InvalidIdempotencyKey,

    #[error("correlation id must be a UUID")]
    InvalidCorrelationId,
}

/// Caller-supplied token guaranteeing a retried request has exactly one
/// effect. Format-checked at the boundary so repositories only ever see
/// well-formed keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(value: &str) -> Result<Self, KeyError> {
        let ok = (8..=128).contains(&value.len())
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            return Err(KeyError::InvalidIdempotencyKey);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation id carried explicitly through every call chain
/// (command → aggregate → gateway → log), never in implicit task-local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: &str) -> Result<Self, KeyError> {
        Uuid::parse_str(value).map_err(|_| KeyError::InvalidCorrelationId)?;
        Ok(Self(value.to_string()))
    }

    pub fn new_id() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored outcome of the first successful command under an idempotency key.
/// Written once, looked up before any side-effecting work, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub id: Uuid,
    pub idempotency_key: String,
    pub request_hash: String,
    pub response_payload: String,
    pub status_code: i32,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn create(
        key: &IdempotencyKey,
        request_hash: &str,
        response_payload: &str,
        status_code: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            idempotency_key: key.as_str().to_string(),
            request_hash: request_hash.to_string(),
            response_payload: response_payload.to_string(),
            status_code,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_is_enforced() {
        assert!(IdempotencyKey::new("abc-123_XYZ").is_ok());
        assert!(IdempotencyKey::new("short").is_err());
        assert!(IdempotencyKey::new("has spaces here").is_err());
        assert!(IdempotencyKey::new(&"x".repeat(129)).is_err());
        assert!(IdempotencyKey::new(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn correlation_id_must_be_uuid() {
        assert!(CorrelationId::new("not-a-uuid").is_err());
        let id = CorrelationId::new_id();
        assert!(CorrelationId::new(id.as_str()).is_ok());
    }
}
