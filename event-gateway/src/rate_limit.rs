//! Per-tenant/IP request budgeting and failed-auth lockout.
//!
//! Window counters live in the shared cache under fully-qualified keys, so a
//! distributed cache backend gives fleet-wide limits with no code change
//! here. The minute bucket is part of the key; expiry makes windows roll off
//! without a sweeper.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common_cache::Cache;

use crate::envelope::{ApiError, ApiResult};

pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    per_minute: u32,
    lockout_threshold: u32,
    lockout_window: Duration,
}

impl RateLimiter {
    pub fn new(
        cache: Arc<dyn Cache>,
        per_minute: u32,
        lockout_threshold: u32,
        lockout_window: Duration,
    ) -> Self {
        Self {
            cache,
            per_minute,
            lockout_threshold,
            lockout_window,
        }
    }

    /// Admit or reject one request for `(tenant, ip)`. Locked-out callers are
    /// rejected before the window counter is touched.
    pub async fn check(&self, tenant_id: &str, ip: &str) -> ApiResult<()> {
        if self.is_locked_out(tenant_id, ip).await {
            return Err(ApiError::rate_limited());
        }
        let bucket = Utc::now().timestamp() / 60;
        let key = format!("ratelimit:{tenant_id}:{ip}:{bucket}");
        let current = self.cache.incr(&key, Duration::from_secs(120)).await;
        if current > self.per_minute as i64 {
            return Err(ApiError::rate_limited());
        }
        Ok(())
    }

    /// Record an invalid secret/JWT/API-key attempt.
    pub async fn note_auth_failure(&self, tenant_id: &str, ip: &str) {
        let key = format!("lockout:{tenant_id}:{ip}");
        let failures = self.cache.incr(&key, self.lockout_window).await;
        if failures == self.lockout_threshold as i64 {
            tracing::warn!(tenant = tenant_id, ip, failures, "auth lockout engaged");
        }
    }

    pub async fn is_locked_out(&self, tenant_id: &str, ip: &str) -> bool {
        let key = format!("lockout:{tenant_id}:{ip}");
        self.cache
            .get(&key)
            .await
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            >= self.lockout_threshold as i64
    }
}
