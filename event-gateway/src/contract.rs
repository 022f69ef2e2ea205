//! Canonical event contract (v2) and hydration.
//!
//! Rows persist the event body as JSON without the derived `links`/`qr`
//! blocks; hydration rebuilds those from `(base_url, tenant, id)` on every
//! read. Legacy field aliases (`dateISO`/`dateTime`, `location`/`venueName`,
//! `ctaLabels`, `sections.*.enabled`) are accepted on input and mapped; the
//! canonical shape is what always goes over the wire.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::envelope::{ApiError, ApiResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cta {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ctas {
    #[serde(default)]
    pub primary: Cta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Cta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Links {
    #[serde(default)]
    pub public_url: String,
    #[serde(default)]
    pub display_url: String,
    #[serde(default)]
    pub poster_url: String,
    #[serde(default)]
    pub signup_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_report_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QrCodes {
    #[serde(default)]
    pub public: String,
    #[serde(default)]
    pub signup: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub show_schedule: bool,
    #[serde(default = "default_true")]
    pub show_standings: bool,
    #[serde(default)]
    pub show_bracket: bool,
    #[serde(default = "default_true")]
    pub show_sponsors: bool,
    #[serde(default = "default_true")]
    pub show_qr: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_schedule: true,
            show_standings: true,
            show_bracket: false,
            show_sponsors: true,
            show_qr: true,
        }
    }
}

/// The canonical wire shape. Template-declared fields beyond the fixed set
/// ride in `extra` and survive serialization at the top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub name: String,
    #[serde(default, rename = "startDateISO")]
    pub start_date_iso: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub qr: QrCodes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracket: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_data: Option<Value>,
    #[serde(default)]
    pub ctas: Ctas,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "createdAtISO")]
    pub created_at_iso: String,
    #[serde(default, rename = "updatedAtISO")]
    pub updated_at_iso: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything needed to derive an event's links.
pub struct LinkContext<'a> {
    pub base_url: &'a str,
    pub tenant_id: &'a str,
}

impl Event {
    /// Rebuild the derived `links` block. An explicit `signupUrl` data field
    /// wins over the derived signup page link.
    pub fn derive_links(&mut self, ctx: &LinkContext<'_>) {
        let base = ctx.base_url;
        let brand = ctx.tenant_id;
        let id = &self.id;
        let explicit_signup = self
            .extra
            .get("signupUrl")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self.links = Links {
            public_url: format!("{base}?page=events&brand={brand}&id={id}"),
            display_url: format!("{base}?page=display&brand={brand}&id={id}"),
            poster_url: format!("{base}?page=poster&brand={brand}&id={id}"),
            signup_url: explicit_signup
                .unwrap_or_else(|| format!("{base}?page=signup&brand={brand}&id={id}")),
            shared_report_url: Some(format!("{base}?page=report&brand={brand}&id={id}")),
        };
        if self.ctas.primary.url.is_empty() {
            self.ctas.primary.url = self.links.signup_url.clone();
        }
        if self.ctas.primary.label.is_empty() {
            self.ctas.primary.label = "Sign up".to_string();
        }
    }

    /// Serialize for persistence: the canonical body minus the derived
    /// `links`/`qr` blocks, which must never hit storage.
    pub fn to_stored_json(&self) -> ApiResult<String> {
        let mut value = serde_json::to_value(self)
            .map_err(|err| ApiError::internal(format!("event serialization failed: {err}")))?;
        if let Some(map) = value.as_object_mut() {
            map.remove("links");
            map.remove("qr");
        }
        serde_json::to_string(&value)
            .map_err(|err| ApiError::internal(format!("event serialization failed: {err}")))
    }
}

/// Parse a stored event body, mapping deprecated aliases onto the canonical
/// contract before deserializing.
pub fn parse_stored_event(raw: &str) -> ApiResult<Event> {
    let mut value: Value = serde_json::from_str(raw)
        .map_err(|err| ApiError::internal(format!("corrupt event row: {err}")))?;
    apply_legacy_aliases(&mut value);
    serde_json::from_value(value)
        .map_err(|err| ApiError::internal(format!("corrupt event row: {err}")))
}

/// In-place migration of deprecated input aliases.
pub fn apply_legacy_aliases(value: &mut Value) {
    let Some(map) = value.as_object_mut() else {
        return;
    };

    if !has_nonempty_str(map, "startDateISO") {
        let from_date_iso = map.get("dateISO").and_then(Value::as_str).map(str::to_string);
        let from_date_time = map
            .get("dateTime")
            .and_then(Value::as_str)
            .map(|s| s.split('T').next().unwrap_or(s).to_string());
        if let Some(date) = from_date_iso.or(from_date_time) {
            map.insert("startDateISO".to_string(), Value::String(date));
        }
    }
    map.remove("dateISO");
    map.remove("dateTime");

    if !has_nonempty_str(map, "venue") {
        let fallback = map
            .get("location")
            .or_else(|| map.get("venueName"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(venue) = fallback {
            map.insert("venue".to_string(), Value::String(venue));
        }
    }
    map.remove("location");
    map.remove("venueName");

    if map.get("ctas").map_or(true, |c| !c.is_object()) {
        if let Some(labels) = map.get("ctaLabels").and_then(Value::as_array).cloned() {
            let label_at = |i: usize| {
                labels
                    .get(i)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            let url = map
                .get("signupUrl")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let mut ctas = json!({ "primary": { "label": label_at(0), "url": url } });
            if labels.len() > 1 {
                ctas["secondary"] = json!({ "label": label_at(1), "url": "" });
            }
            map.insert("ctas".to_string(), ctas);
        }
    }
    map.remove("ctaLabels");

    if map.get("settings").map_or(true, |s| !s.is_object()) {
        if let Some(sections) = map.get("sections").and_then(Value::as_object).cloned() {
            let enabled = |key: &str, default: bool| {
                sections
                    .get(key)
                    .and_then(|s| s.get("enabled"))
                    .and_then(Value::as_bool)
                    .unwrap_or(default)
            };
            map.insert(
                "settings".to_string(),
                json!({
                    "showSchedule": enabled("schedule", true),
                    "showStandings": enabled("standings", true),
                    "showBracket": enabled("bracket", false),
                    "showSponsors": enabled("sponsors", true),
                }),
            );
        }
    }
    map.remove("sections");
}

fn has_nonempty_str(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_str).is_some_and(|s| !s.is_empty())
}

/// Thin event used by the sponsor and shared-report bundles.
pub fn thin_event(event: &Event, tenant_id: &str) -> Value {
    json!({
        "id": event.id,
        "name": event.name,
        "dateTime": event.start_date_iso,
        "location": event.venue,
        "brandId": tenant_id,
    })
}

/// `startDateISO` must match `^\d{4}-\d{2}-\d{2}$`.
pub fn is_start_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && [0, 1, 2, 3, 5, 6, 8, 9]
            .iter()
            .all(|&i| bytes[i].is_ascii_digit())
}

/// Slug charset per contract: `^[a-z0-9-]{1,50}$`.
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 50
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Derive a slug from arbitrary text: lowercase, non-alphanumerics collapse
/// to single dashes, trimmed, capped at 50 characters.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    let mut out: String = trimmed.chars().take(50).collect();
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("event");
    }
    out
}

/// Deterministic content validator for ETag comparison: hex SHA-256 of the
/// serialized value, truncated to 16 characters.
pub fn compute_etag(value: &Value) -> String {
    let serialized = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::digest(&serialized);
    hex::encode(digest)[..16].to_string()
}
