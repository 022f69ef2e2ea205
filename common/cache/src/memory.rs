use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::Cache;

/// Entries above this count trigger an opportunistic sweep on write.
const SWEEP_THRESHOLD: usize = 4096;

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep(entries: &mut HashMap<String, (Value, Instant)>, now: Instant) {
        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, (_, expires)| *expires > now);
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some((value, expires)) if *expires > now => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Self::sweep(&mut entries, now);
        entries.insert(key.to_string(), (value, now + ttl));
    }

    async fn put_if_absent(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Self::sweep(&mut entries, now);
        match entries.get(key) {
            Some((_, expires)) if *expires > now => false,
            _ => {
                entries.insert(key.to_string(), (value, now + ttl));
                true
            }
        }
    }

    async fn remove(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.remove(key) {
            Some((value, expires)) if expires > now => Some(value),
            _ => None,
        }
    }

    async fn incr(&self, key: &str, ttl: Duration) -> i64 {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some((value, expires)) if *expires > now => {
                let next = value.as_i64().unwrap_or(0) + 1;
                *value = Value::from(next);
                next
            }
            _ => {
                entries.insert(key.to_string(), (Value::from(1), now + ttl));
                1
            }
        }
    }
}
