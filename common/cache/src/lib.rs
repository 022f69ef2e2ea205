//! Shared TTL cache and keyed advisory locks.
//!
//! Keys are fully qualified by their owners (`idem:<tenant>:<scope>:<key>`,
//! `csrf:<user>`, `ratelimit:<tenant>:<ip>:<bucket>`) so tenants can never
//! collide. The [`Cache`] trait is the seam a distributed backend would slot
//! into; [`MemoryCache`] is the in-process engine used by the runtime.

pub mod lock;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use lock::{KeyedGuard, KeyedLocks};
pub use memory::MemoryCache;

#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a live entry; expired entries read as absent.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Insert or replace an entry with a time-to-live.
    async fn put(&self, key: &str, value: Value, ttl: Duration);

    /// Insert only when no live entry exists. Returns whether the insert won.
    /// This is the mutual-exclusion primitive behind idempotency keys.
    async fn put_if_absent(&self, key: &str, value: Value, ttl: Duration) -> bool;

    /// Remove and return a live entry.
    async fn remove(&self, key: &str) -> Option<Value>;

    /// Atomically increment a numeric entry, creating it at 1 with `ttl` when
    /// absent or expired. The TTL is not refreshed on later increments, which
    /// is what makes windowed counters (rate limits, lockouts) roll off.
    async fn incr(&self, key: &str, ttl: Duration) -> i64;
}
