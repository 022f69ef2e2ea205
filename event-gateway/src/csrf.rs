//! Single-use CSRF tokens.
//!
//! Tokens are minted per user key (tenant + client IP) and stored in the
//! shared cache with a one-hour TTL. Validation read-and-removes under a
//! per-user lock so a token can never be spent twice, even by concurrent
//! requests. Failing to win the lock within the bound is a rejection, not a
//! wait.

use std::sync::Arc;
use std::time::Duration;

use common_cache::{Cache, KeyedLocks};
use serde_json::Value;
use uuid::Uuid;

use crate::envelope::{ApiError, ApiResult};

pub struct CsrfGuard {
    cache: Arc<dyn Cache>,
    locks: Arc<KeyedLocks>,
    ttl: Duration,
    lock_wait: Duration,
}

impl CsrfGuard {
    pub fn new(
        cache: Arc<dyn Cache>,
        locks: Arc<KeyedLocks>,
        ttl: Duration,
        lock_wait: Duration,
    ) -> Self {
        Self {
            cache,
            locks,
            ttl,
            lock_wait,
        }
    }

    /// Mint a token for `user_key` and remember it for one TTL.
    pub async fn generate(&self, user_key: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.cache
            .put(&cache_key(user_key, &token), Value::Bool(true), self.ttl)
            .await;
        token
    }

    /// Consume a token. Returns `Ok(true)` exactly once per minted token.
    /// Lock contention beyond the bound maps to `RATE_LIMITED`.
    pub async fn validate(&self, user_key: &str, token: &str) -> ApiResult<bool> {
        let _guard = self
            .locks
            .acquire(&format!("csrf-lock:{user_key}"), self.lock_wait)
            .await
            .ok_or_else(ApiError::rate_limited)?;
        Ok(self.cache.remove(&cache_key(user_key, token)).await.is_some())
    }
}

fn cache_key(user_key: &str, token: &str) -> String {
    format!("csrf:{user_key}:{token}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_cache::MemoryCache;

    fn guard() -> CsrfGuard {
        CsrfGuard::new(
            Arc::new(MemoryCache::new()),
            Arc::new(KeyedLocks::new()),
            Duration::from_secs(3600),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let guard = guard();
        let token = guard.generate("root:1.2.3.4").await;
        assert!(guard.validate("root:1.2.3.4", &token).await.unwrap());
        assert!(!guard.validate("root:1.2.3.4", &token).await.unwrap());
    }

    #[tokio::test]
    async fn tokens_are_scoped_to_their_user() {
        let guard = guard();
        let token = guard.generate("root:1.2.3.4").await;
        assert!(!guard.validate("root:9.9.9.9", &token).await.unwrap());
        // The original owner can still spend it.
        assert!(guard.validate("root:1.2.3.4", &token).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let guard = guard();
        assert!(!guard.validate("root:1.2.3.4", "no-such-token").await.unwrap());
    }
}
