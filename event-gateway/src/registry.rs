//! In-memory tenant/template/alias registry.
//!
//! The registry is read-mostly: every request grabs the current snapshot
//! (`Arc`) once and works against that consistent view. Reloads build a new
//! snapshot and swap the pointer; in-flight requests keep the old one.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Resource families a tenant may be allowed to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Events,
    Leagues,
    Tournaments,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Events => "events",
            Scope::Leagues => "leagues",
            Scope::Tournaments => "tournaments",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "events" => Some(Scope::Events),
            "leagues" => Some(Scope::Leagues),
            "tournaments" => Some(Scope::Tournaments),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenantKind {
    #[default]
    Leaf,
    Parent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub scopes_allowed: Vec<Scope>,
    /// Storage partition backing this tenant's sheets.
    pub store_id: String,
    #[serde(default, rename = "type")]
    pub kind: TenantKind,
    #[serde(default)]
    pub child_brands: Vec<String>,
    #[serde(default)]
    pub include_in_portfolio_reports: bool,
}

impl Tenant {
    pub fn allows_scope(&self, scope: Scope) -> bool {
        self.scopes_allowed.contains(&scope)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Url,
    Number,
    Boolean,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl Template {
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// A friendly URL alias, e.g. `/summer-open` or `/abc/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "target")]
pub enum AliasTarget {
    /// Dispatches into the JSON action surface, bypassing page rendering.
    Action(String),
    /// Resolves to a page bundle route.
    Page(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayEmphasis {
    #[default]
    Scores,
    Sponsors,
    Hero,
}

impl DisplayEmphasis {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayEmphasis::Scores => "scores",
            DisplayEmphasis::Sponsors => "sponsors",
            DisplayEmphasis::Hero => "hero",
        }
    }
}

/// Defaults for the display surface, merged with per-template overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    pub rotation_ms: u64,
    pub sponsor_slots: u32,
    pub has_side_pane: bool,
    pub emphasis: DisplayEmphasis,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            rotation_ms: 8000,
            sponsor_slots: 3,
            has_side_pane: true,
            emphasis: DisplayEmphasis::Scores,
        }
    }
}

/// Partial display override declared per template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOverride {
    #[serde(default)]
    pub rotation_ms: Option<u64>,
    #[serde(default)]
    pub sponsor_slots: Option<u32>,
    #[serde(default)]
    pub has_side_pane: Option<bool>,
    #[serde(default)]
    pub emphasis: Option<DisplayEmphasis>,
}

impl DisplayConfig {
    pub fn merged(&self, over: Option<&DisplayOverride>) -> DisplayConfig {
        let Some(over) = over else {
            return self.clone();
        };
        DisplayConfig {
            rotation_ms: over.rotation_ms.unwrap_or(self.rotation_ms),
            sponsor_slots: over.sponsor_slots.unwrap_or(self.sponsor_slots),
            has_side_pane: over.has_side_pane.unwrap_or(self.has_side_pane),
            emphasis: over.emphasis.unwrap_or(self.emphasis),
        }
    }
}

/// One immutable configuration view. Admin secrets live here at runtime but
/// are layered in from the environment, never serialized back out.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    #[serde(default = "default_app_title")]
    pub app_title: String,
    #[serde(default = "default_build")]
    pub build: String,
    #[serde(default = "default_contract")]
    pub contract_version: String,
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub aliases: HashMap<String, AliasTarget>,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub display_overrides: HashMap<String, DisplayOverride>,
    #[serde(skip)]
    pub admin_secrets: HashMap<String, String>,
}

fn default_app_title() -> String {
    "Event Toolkit".to_string()
}

fn default_build() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_contract() -> String {
    "v2".to_string()
}

pub const ROOT_TENANT: &str = "root";

impl ConfigSnapshot {
    pub fn tenant(&self, id: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|t| t.id == id)
    }

    /// Hostname match is case-insensitive and exact.
    pub fn tenant_by_host(&self, host: &str) -> Option<&Tenant> {
        let host = host.split(':').next().unwrap_or(host);
        self.tenants.iter().find(|t| {
            t.hostnames
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(host))
        })
    }

    pub fn root(&self) -> Option<&Tenant> {
        self.tenant(ROOT_TENANT)
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn alias(&self, name: &str) -> Option<&AliasTarget> {
        self.aliases.get(name)
    }

    pub fn secret_for(&self, tenant_id: &str) -> Option<&str> {
        self.admin_secrets.get(tenant_id).map(String::as_str)
    }

    /// Every hostname across all tenants; used by the origin check and the
    /// redirect interstitial decision.
    pub fn all_hostnames(&self) -> Vec<String> {
        self.tenants
            .iter()
            .flat_map(|t| t.hostnames.iter().cloned())
            .collect()
    }
}

/// Process-wide registry handle. Readers call [`ConfigRegistry::current`]
/// once per request; reloads swap the snapshot pointer atomically.
pub struct ConfigRegistry {
    snapshot: RwLock<Arc<ConfigSnapshot>>,
}

impl ConfigRegistry {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn swap(&self, next: ConfigSnapshot) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            app_title: default_app_title(),
            build: default_build(),
            contract_version: default_contract(),
            tenants: vec![Tenant {
                id: "root".to_string(),
                name: "Root".to_string(),
                hostnames: vec!["Events.Example.com".to_string()],
                scopes_allowed: vec![Scope::Events],
                store_id: "store-root".to_string(),
                kind: TenantKind::Leaf,
                child_brands: vec![],
                include_in_portfolio_reports: false,
            }],
            templates: vec![],
            aliases: HashMap::new(),
            display: DisplayConfig::default(),
            display_overrides: HashMap::new(),
            admin_secrets: HashMap::new(),
        }
    }

    #[test]
    fn host_match_is_case_insensitive_and_ignores_port() {
        let snap = snapshot();
        assert!(snap.tenant_by_host("events.example.com").is_some());
        assert!(snap.tenant_by_host("EVENTS.EXAMPLE.COM:8443").is_some());
        assert!(snap.tenant_by_host("other.example.com").is_none());
    }

    #[test]
    fn swap_replaces_snapshot_for_new_readers() {
        let registry = ConfigRegistry::new(snapshot());
        let before = registry.current();
        let mut next = snapshot();
        next.app_title = "Renamed".to_string();
        registry.swap(next);
        assert_eq!(before.app_title, "Event Toolkit");
        assert_eq!(registry.current().app_title, "Renamed");
    }

    #[test]
    fn display_merge_prefers_override_fields() {
        let base = DisplayConfig::default();
        let over = DisplayOverride {
            emphasis: Some(DisplayEmphasis::Hero),
            sponsor_slots: Some(5),
            ..DisplayOverride::default()
        };
        let merged = base.merged(Some(&over));
        assert_eq!(merged.emphasis, DisplayEmphasis::Hero);
        assert_eq!(merged.sponsor_slots, 5);
        assert_eq!(merged.rotation_ms, 8000);
    }
}
