//! Keyed advisory locks with bounded acquisition.
//!
//! Lock objects are created lazily per key and shared via `Arc`; the guard
//! releases the underlying mutex on drop. Acquisition is always bounded so a
//! wedged holder degrades into a rejected request instead of a stuck worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held lock for one key. Dropping releases it.
pub struct KeyedGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting at most `wait`. Returns `None` on
    /// timeout.
    pub async fn acquire(&self, key: &str, wait: Duration) -> Option<KeyedGuard> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        match timeout(wait, lock.lock_owned()).await {
            Ok(guard) => Some(KeyedGuard { _guard: guard }),
            Err(_) => None,
        }
    }
}
