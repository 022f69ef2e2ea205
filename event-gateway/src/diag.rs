//! Durable diagnostic log with rolling caps.
//!
//! Rows land in the root partition's DIAG sheet. Every write enforces the
//! hard cap; every 50th write (tracked by a shared counter so concurrent
//! writers converge) prunes today's rows down to the per-day cap. The logger
//! never fails its caller: every error inside is swallowed and echoed to the
//! tracing console instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use common_cache::Cache;
use common_security::redact_meta;
use common_store::sheet::diag_cols;
use common_store::{cell_str, Sheet, Store};
use serde_json::{json, Value};
use tracing::warn;

pub const HARD_CAP: usize = 3000;
pub const PER_DAY_CAP: usize = 800;
const PRUNE_EVERY: i64 = 50;
const COUNTER_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
pub enum DiagLevel {
    Info,
    Warn,
    Error,
}

impl DiagLevel {
    fn as_str(self) -> &'static str {
        match self {
            DiagLevel::Info => "INFO",
            DiagLevel::Warn => "WARN",
            DiagLevel::Error => "ERROR",
        }
    }
}

pub struct DiagLog {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    store_id: String,
}

impl DiagLog {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>, store_id: String) -> Self {
        Self {
            store,
            cache,
            store_id,
        }
    }

    /// Append one diagnostic row. Sensitive metadata fields are redacted
    /// before persisting. Never fails the caller.
    pub async fn log(&self, level: DiagLevel, location: &str, msg: &str, mut meta: Value) {
        redact_meta(&mut meta);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let row = vec![
            json!(now),
            json!(level.as_str()),
            json!(location),
            json!(msg),
            json!(meta.to_string()),
        ];
        if let Err(err) = self.store.append(&self.store_id, Sheet::Diagnostics, row).await {
            warn!(error = %err, location, msg, "diag append failed");
            return;
        }
        self.enforce_caps().await;
    }

    pub async fn info(&self, location: &str, msg: &str, meta: Value) {
        self.log(DiagLevel::Info, location, msg, meta).await;
    }

    pub async fn warn(&self, location: &str, msg: &str, meta: Value) {
        self.log(DiagLevel::Warn, location, msg, meta).await;
    }

    pub async fn error(&self, location: &str, msg: &str, meta: Value) {
        self.log(DiagLevel::Error, location, msg, meta).await;
    }

    async fn enforce_caps(&self) {
        let len = match self.store.row_count(&self.store_id, Sheet::Diagnostics).await {
            Ok(len) => len,
            Err(err) => {
                warn!(error = %err, "diag cap check failed");
                return;
            }
        };
        if len > HARD_CAP {
            let overflow: Vec<usize> = (0..len - HARD_CAP).collect();
            if let Err(err) = self
                .store
                .delete_rows(&self.store_id, Sheet::Diagnostics, &overflow)
                .await
            {
                warn!(error = %err, "diag hard-cap prune failed");
            }
        }

        let count = self.cache.incr("diag:entry-counter", COUNTER_TTL).await;
        if count % PRUNE_EVERY == 0 {
            self.prune_today().await;
        }
    }

    /// Delete today's oldest rows beyond the per-day cap.
    async fn prune_today(&self) {
        let rows = match self.store.read_all(&self.store_id, Sheet::Diagnostics).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "diag per-day prune read failed");
                return;
            }
        };
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let todays: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| cell_str(row, diag_cols::TS).starts_with(&today))
            .map(|(i, _)| i)
            .collect();
        if todays.len() <= PER_DAY_CAP {
            return;
        }
        let excess = todays.len() - PER_DAY_CAP;
        let victims: Vec<usize> = todays.into_iter().take(excess).collect();
        if let Err(err) = self
            .store
            .delete_rows(&self.store_id, Sheet::Diagnostics, &victims)
            .await
        {
            warn!(error = %err, "diag per-day prune failed");
        }
    }
}
