use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common_cache::{Cache, KeyedLocks, MemoryCache};
use common_store::{MemoryStore, Store};

use crate::config::ServerConfig;
use crate::csrf::CsrfGuard;
use crate::diag::DiagLog;
use crate::metrics::GatewayMetrics;
use crate::ports::{FormProvider, NullQrRenderer, QrRenderer, UnconfiguredFormProvider};
use crate::rate_limit::RateLimiter;
use crate::registry::{ConfigRegistry, ConfigSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn Cache>,
    pub registry: Arc<ConfigRegistry>,
    pub locks: Arc<KeyedLocks>,
    pub rate_limiter: Arc<RateLimiter>,
    pub csrf: Arc<CsrfGuard>,
    pub qr: Arc<dyn QrRenderer>,
    pub forms: Arc<dyn FormProvider>,
    pub diag: Arc<DiagLog>,
    pub metrics: Arc<GatewayMetrics>,
    pub config: Arc<ServerConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire up the state graph from a config, a snapshot and the pluggable
    /// collaborators. The diag log always writes into the root partition.
    pub fn new(
        config: ServerConfig,
        snapshot: ConfigSnapshot,
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        qr: Arc<dyn QrRenderer>,
        forms: Arc<dyn FormProvider>,
    ) -> Self {
        let root_store_id = snapshot
            .root()
            .map(|t| t.store_id.clone())
            .unwrap_or_else(|| "store-root".to_string());
        let locks = Arc::new(KeyedLocks::new());
        let rate_limiter = Arc::new(RateLimiter::new(
            cache.clone(),
            config.rate_limit_per_minute,
            config.auth_lockout_threshold,
            Duration::from_secs(config.auth_lockout_window_secs),
        ));
        let csrf = Arc::new(CsrfGuard::new(
            cache.clone(),
            locks.clone(),
            Duration::from_secs(config.csrf_ttl_secs),
            Duration::from_secs(config.csrf_lock_wait_secs),
        ));
        let diag = Arc::new(DiagLog::new(store.clone(), cache.clone(), root_store_id));
        let metrics =
            Arc::new(GatewayMetrics::new().expect("metric registration cannot collide at startup"));
        Self {
            store,
            cache,
            registry: Arc::new(ConfigRegistry::new(snapshot)),
            locks,
            rate_limiter,
            csrf,
            qr,
            forms,
            diag,
            metrics,
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }

    /// All-in-memory state for tests and local development.
    pub fn in_memory(config: ServerConfig, snapshot: ConfigSnapshot) -> Self {
        Self::new(
            config,
            snapshot,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new()),
            Arc::new(NullQrRenderer),
            Arc::new(UnconfiguredFormProvider),
        )
    }
}
