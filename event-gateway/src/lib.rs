pub mod analytics;
pub mod app_state;
pub mod bundles;
pub mod config;
pub mod contract;
pub mod csrf;
pub mod diag;
pub mod envelope;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod rate_limit;
pub mod registry;
pub mod reports;
pub mod router;
pub mod shortlinks;

// Re-export the pieces tests and embedders wire together.
pub use app_state::AppState;
pub use config::ServerConfig;
pub use envelope::{ApiError, ApiResult, ErrorKind};
pub use metrics::GatewayMetrics;
pub use registry::{ConfigRegistry, ConfigSnapshot};
pub use router::build_router;
