use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common_cache::MemoryCache;
use common_store::MemoryStore;
use event_gateway::app_state::AppState;
use event_gateway::config::ServerConfig;
use event_gateway::ports::{HttpQrRenderer, UnconfiguredFormProvider};
use event_gateway::router::build_router;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = ServerConfig::from_env()?;
    let snapshot = config.load_registry()?;
    info!(
        tenants = snapshot.tenants.len(),
        templates = snapshot.templates.len(),
        "registry loaded"
    );

    let cache = Arc::new(MemoryCache::new());
    let qr = Arc::new(HttpQrRenderer::new(
        config.qr_endpoint.clone(),
        Duration::from_millis(config.qr_timeout_ms),
        cache.clone(),
    ));
    let state = AppState::new(
        config.clone(),
        snapshot,
        Arc::new(MemoryStore::new()),
        cache,
        qr,
        Arc::new(UnconfiguredFormProvider),
    );
    let app = build_router(state);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting event-gateway");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
