//! Process configuration from the environment plus registry loading.
//!
//! Tenants, templates and aliases come from a JSON registry file when
//! `EVENT_REGISTRY_PATH` is set, otherwise a small built-in development
//! registry is used. Admin secrets are always layered in from the
//! environment (`EVENT_ADMIN_SECRET_<TENANT>`), never from the registry file.

use std::collections::HashMap;
use std::env;
use std::fs;

use anyhow::{Context, Result};

use crate::registry::{
    AliasTarget, ConfigSnapshot, DisplayConfig, FieldSpec, FieldType, Scope, Template, Tenant,
    TenantKind,
};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL used to derive event links and shortlinks.
    pub base_url: String,
    pub registry_path: Option<String>,
    pub qr_endpoint: String,
    pub qr_timeout_ms: u64,
    pub rate_limit_per_minute: u32,
    pub auth_lockout_threshold: u32,
    pub auth_lockout_window_secs: u64,
    pub csrf_ttl_secs: u64,
    pub csrf_lock_wait_secs: u64,
    pub idempotency_ttl_secs: u64,
    pub event_lock_wait_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8090);
        let base_url =
            env::var("EVENT_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}/"));
        let registry_path = env::var("EVENT_REGISTRY_PATH").ok();
        let qr_endpoint = env::var("EVENT_QR_ENDPOINT")
            .unwrap_or_else(|_| "https://quickchart.io/qr".to_string());
        let qr_timeout_ms = env::var("EVENT_QR_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3000);
        let rate_limit_per_minute = env::var("EVENT_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        Ok(Self {
            host,
            port,
            base_url,
            registry_path,
            qr_endpoint,
            qr_timeout_ms,
            rate_limit_per_minute: rate_limit_per_minute.max(1),
            auth_lockout_threshold: 5,
            auth_lockout_window_secs: 900,
            csrf_ttl_secs: 3600,
            csrf_lock_wait_secs: 5,
            idempotency_ttl_secs: 600,
            event_lock_wait_secs: 10,
        })
    }

    /// Load the registry snapshot and layer in admin secrets from env vars of
    /// the form `EVENT_ADMIN_SECRET_<TENANT_ID>` (dashes become underscores).
    pub fn load_registry(&self) -> Result<ConfigSnapshot> {
        let mut snapshot = match &self.registry_path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read registry file {path}"))?;
                serde_json::from_str::<ConfigSnapshot>(&raw)
                    .with_context(|| format!("failed to parse registry file {path}"))?
            }
            None => dev_registry(),
        };
        snapshot.admin_secrets = secrets_from_env(&snapshot);
        Ok(snapshot)
    }
}

fn secrets_from_env(snapshot: &ConfigSnapshot) -> HashMap<String, String> {
    let mut secrets = HashMap::new();
    for tenant in &snapshot.tenants {
        let var = format!(
            "EVENT_ADMIN_SECRET_{}",
            tenant.id.to_uppercase().replace('-', "_")
        );
        if let Ok(secret) = env::var(&var) {
            secrets.insert(tenant.id.clone(), secret);
        }
    }
    secrets
}

/// Built-in development registry: a root tenant, the standard event template
/// and the friendly aliases the admin UI links to.
pub fn dev_registry() -> ConfigSnapshot {
    ConfigSnapshot {
        app_title: "Event Toolkit".to_string(),
        build: env!("CARGO_PKG_VERSION").to_string(),
        contract_version: "v2".to_string(),
        tenants: vec![Tenant {
            id: "root".to_string(),
            name: "Root".to_string(),
            hostnames: vec!["localhost".to_string()],
            scopes_allowed: vec![Scope::Events, Scope::Leagues, Scope::Tournaments],
            store_id: "store-root".to_string(),
            kind: TenantKind::Leaf,
            child_brands: vec![],
            include_in_portfolio_reports: true,
        }],
        templates: vec![event_template()],
        aliases: default_aliases(),
        display: DisplayConfig::default(),
        display_overrides: HashMap::new(),
        admin_secrets: HashMap::new(),
    }
}

pub fn event_template() -> Template {
    let field = |id: &str, field_type: FieldType, required: bool| FieldSpec {
        id: id.to_string(),
        field_type,
        required,
    };
    Template {
        id: "event".to_string(),
        name: "Event".to_string(),
        fields: vec![
            field("name", FieldType::String, true),
            field("startDateISO", FieldType::String, true),
            field("venue", FieldType::String, false),
            field("signupUrl", FieldType::Url, false),
            field("infoUrl", FieldType::Url, false),
            field("heroImageUrl", FieldType::Url, false),
            field("scheduleNote", FieldType::Text, false),
        ],
    }
}

fn default_aliases() -> HashMap<String, AliasTarget> {
    let mut aliases = HashMap::new();
    aliases.insert("status".to_string(), AliasTarget::Action("status".to_string()));
    aliases.insert("setup".to_string(), AliasTarget::Action("config".to_string()));
    aliases.insert(
        "permissions".to_string(),
        AliasTarget::Action("permissions".to_string()),
    );
    aliases.insert("docs".to_string(), AliasTarget::Action("docs".to_string()));
    aliases.insert("admin".to_string(), AliasTarget::Page("admin".to_string()));
    aliases.insert("display".to_string(), AliasTarget::Page("display".to_string()));
    aliases
}
