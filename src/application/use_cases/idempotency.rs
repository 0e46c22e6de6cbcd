use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::app_error::AppResult;
use crate::application::ports::clock::Clock;
use crate::domain::entities::idempotency::{IdempotencyKey, IdempotencyRecord};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait IdempotencyRecordRepoTrait: Send + Sync {
    async fn find_by_key(&self, key: &str) -> AppResult<Option<IdempotencyRecord>>;

    async fn insert(&self, record: &IdempotencyRecord) -> AppResult<()>;
}

// ============================================================================
// Guard
// ============================================================================

/// Maps a client-supplied idempotency key to a previously recorded outcome.
/// Looked up before any side-effecting work; written once per first
/// successful command under a key.
pub struct IdempotencyGuard {
    repo: Arc<dyn IdempotencyRecordRepoTrait>,
    clock: Arc<dyn Clock>,
}

impl IdempotencyGuard {
    pub fn new(repo: Arc<dyn IdempotencyRecordRepoTrait>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn find_existing(
        &self,
        key: &IdempotencyKey,
    ) -> AppResult<Option<IdempotencyRecord>> {
        self.repo.find_by_key(key.as_str()).await
    }

    pub async fn persist(
        &self,
        key: &IdempotencyKey,
        request_payload: &str,
        response_payload: &str,
        status_code: i32,
    ) -> AppResult<IdempotencyRecord> {
        let record = IdempotencyRecord::create(
            key,
            &hash_payload(request_payload),
            response_payload,
            status_code,
            self.clock.now(),
        );
        self.repo.insert(&record).await?;
        Ok(record)
    }
}

pub fn hash_payload(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::clock::SystemClock;
    use crate::test_utils::InMemoryIdempotencyRepo;

    #[test]
    fn hash_is_stable_hex_sha256() {
        assert_eq!(hash_payload("abc"), hash_payload("abc"));
        assert_ne!(hash_payload("abc"), hash_payload("abd"));
        assert_eq!(hash_payload("").len(), 64);
    }

    #[tokio::test]
    async fn persist_then_find_roundtrip() {
        let repo = Arc::new(InMemoryIdempotencyRepo::new());
        let guard = IdempotencyGuard::new(repo, Arc::new(SystemClock));
        let key = IdempotencyKey::new("key-12345678").unwrap();

        assert!(guard.find_existing(&key).await.unwrap().is_none());

        guard.persist(&key, "req-body", "order-1", 201).await.unwrap();

        let record = guard.find_existing(&key).await.unwrap().unwrap();
        assert_eq!(record.response_payload, "order-1");
        assert_eq!(record.status_code, 201);
        assert_eq!(record.request_hash, hash_payload("req-body"));
    }
}
