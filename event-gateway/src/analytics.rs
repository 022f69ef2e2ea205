//! Append-only analytics ingestion.
//!
//! Rows are immutable once appended; every string cell is spreadsheet-escaped
//! at this boundary so formula injection cannot ride in through telemetry.
//! Ingestion is unauthenticated by contract — the origin check and rate
//! limiter in the router are the gate.

use chrono::{SecondsFormat, Utc};
use common_security::{escape_cell, sanitize_text};
use common_store::{Sheet, Store};
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::envelope::{ApiError, ApiResult};
use crate::registry::Tenant;

pub const METRICS: &[&str] = &["impression", "click", "dwellSec", "view", "external_click"];
pub const EXTERNAL_LINK_TYPES: &[&str] = &[
    "schedule",
    "standings",
    "bracket",
    "stats",
    "scoreboard",
    "stream",
];

const MAX_BATCH: usize = 500;
const MAX_USER_AGENT: usize = 200;
const MAX_VISIBLE_SPONSORS: usize = 20;

/// One validated analytics row ready for append.
pub struct AnalyticsRow {
    pub ts: String,
    pub event_id: String,
    pub surface: String,
    pub metric: String,
    pub sponsor_id: String,
    pub value: f64,
    pub token: String,
    pub user_agent: String,
    pub session_id: String,
    pub visible_sponsor_ids_json: String,
}

impl AnalyticsRow {
    fn into_row(self) -> Vec<Value> {
        vec![
            json!(escape_cell(&self.ts)),
            json!(escape_cell(&self.event_id)),
            json!(escape_cell(&self.surface)),
            json!(escape_cell(&self.metric)),
            json!(escape_cell(&self.sponsor_id)),
            json!(self.value),
            json!(escape_cell(&self.token)),
            json!(escape_cell(&self.user_agent)),
            json!(escape_cell(&self.session_id)),
            json!(escape_cell(&self.visible_sponsor_ids_json)),
        ]
    }
}

/// `logEvents`: append a batch of telemetry rows for a tenant.
pub async fn log_events(state: &AppState, tenant: &Tenant, body: &Value) -> ApiResult<Value> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::bad_input("Missing items"))?;
    if items.is_empty() {
        return Ok(json!({ "logged": 0 }));
    }
    if items.len() > MAX_BATCH {
        return Err(ApiError::bad_input("Batch too large"));
    }

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        rows.push(validate_item(item)?);
    }

    let mut logged = 0usize;
    for row in rows {
        append_row(state, &tenant.store_id, row).await?;
        logged += 1;
    }
    Ok(json!({ "logged": logged }))
}

/// `logExternalClick`: attribution row for an outbound content link.
pub async fn log_external_click(
    state: &AppState,
    tenant: &Tenant,
    body: &Value,
) -> ApiResult<Value> {
    let event_id = required_id(body, "eventId")?;
    let link_type = body
        .get("linkType")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_input("Missing linkType"))?;
    if !EXTERNAL_LINK_TYPES.contains(&link_type) {
        return Err(ApiError::bad_input("Invalid linkType"));
    }
    let surface = body
        .get("surface")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("public");
    let session_id = body
        .get("sessionId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let visible: Vec<&str> = body
        .get("visibleSponsorIds")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .take(MAX_VISIBLE_SPONSORS)
                .collect()
        })
        .unwrap_or_default();

    let row = AnalyticsRow {
        ts: now_iso(),
        event_id,
        surface: sanitize_text(surface, 50),
        metric: "external_click".to_string(),
        sponsor_id: link_type.to_string(),
        value: 1.0,
        token: String::new(),
        user_agent: String::new(),
        session_id: sanitize_text(session_id, 100),
        visible_sponsor_ids_json: serde_json::to_string(&visible).unwrap_or_else(|_| "[]".into()),
    };
    append_row(state, &tenant.store_id, row).await?;
    Ok(json!({ "logged": 1 }))
}

/// Best-effort click row used by the shortlink redirect path. Failures are
/// logged and swallowed; the redirect must still be served.
pub async fn record_click(
    state: AppState,
    store_id: String,
    event_id: String,
    surface: String,
    sponsor_id: String,
    token: String,
) {
    let row = AnalyticsRow {
        ts: now_iso(),
        event_id,
        surface,
        metric: "click".to_string(),
        sponsor_id,
        value: 1.0,
        token,
        user_agent: String::new(),
        session_id: String::new(),
        visible_sponsor_ids_json: "[]".to_string(),
    };
    if let Err(err) = append_row(&state, &store_id, row).await {
        state
            .diag
            .warn("shortlinks", "redirect click log failed", json!({"error": err.to_string()}))
            .await;
    }
}

async fn append_row(state: &AppState, store_id: &str, row: AnalyticsRow) -> ApiResult<()> {
    state
        .store
        .append(store_id, Sheet::Analytics, row.into_row())
        .await?;
    state.metrics.analytics_rows_total.inc();
    Ok(())
}

fn validate_item(item: &Value) -> ApiResult<AnalyticsRow> {
    let event_id = required_id(item, "eventId")?;
    let metric = item
        .get("metric")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_input("Missing metric"))?;
    if !METRICS.contains(&metric) {
        return Err(ApiError::bad_input("Invalid metric"));
    }
    let surface = item
        .get("surface")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("public");
    let ts = item
        .get("ts")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| sanitize_text(s, 40))
        .unwrap_or_else(now_iso);
    let value = item.get("value").and_then(Value::as_f64).unwrap_or(1.0);
    let visible_json = item
        .get("visibleSponsorIds")
        .and_then(Value::as_array)
        .map(|ids| {
            let slice: Vec<&str> = ids
                .iter()
                .filter_map(Value::as_str)
                .take(MAX_VISIBLE_SPONSORS)
                .collect();
            serde_json::to_string(&slice).unwrap_or_else(|_| "[]".into())
        })
        .unwrap_or_else(|| "[]".to_string());

    let text = |key: &str, max: usize| {
        item.get(key)
            .and_then(Value::as_str)
            .map(|s| sanitize_text(s, max))
            .unwrap_or_default()
    };

    Ok(AnalyticsRow {
        ts,
        event_id,
        surface: sanitize_text(surface, 50),
        metric: metric.to_string(),
        sponsor_id: text("sponsorId", 100),
        value,
        token: text("token", 100),
        user_agent: text("userAgent", MAX_USER_AGENT),
        session_id: text("sessionId", 100),
        visible_sponsor_ids_json: visible_json,
    })
}

fn required_id(value: &Value, key: &str) -> ApiResult<String> {
    let raw = value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_input(format!("Missing {key}")))?;
    if !common_security::validate_id(raw) {
        return Err(ApiError::bad_input(format!("Invalid {key}")));
    }
    Ok(raw.to_string())
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{dev_registry, ServerConfig};
    use common_store::sheet::analytics_cols;

    fn state() -> AppState {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            base_url: "http://localhost/".into(),
            registry_path: None,
            qr_endpoint: String::new(),
            qr_timeout_ms: 100,
            rate_limit_per_minute: 100,
            auth_lockout_threshold: 5,
            auth_lockout_window_secs: 900,
            csrf_ttl_secs: 3600,
            csrf_lock_wait_secs: 5,
            idempotency_ttl_secs: 600,
            event_lock_wait_secs: 10,
        };
        AppState::in_memory(config, dev_registry())
    }

    #[tokio::test]
    async fn batch_appends_ten_column_rows() {
        let state = state();
        let snapshot = state.registry.current();
        let tenant = snapshot.root().unwrap();
        let body = json!({
            "items": [
                { "eventId": "e1", "metric": "impression", "surface": "display", "sponsorId": "s1" },
                { "eventId": "e1", "metric": "dwellSec", "value": 12.5, "userAgent": "=HYPERLINK(evil)" }
            ]
        });
        let out = log_events(&state, tenant, &body).await.unwrap();
        assert_eq!(out["logged"], 2);
        let rows = state
            .store
            .read_all(&tenant.store_id, Sheet::Analytics)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 10));
        // Formula leader is neutralized.
        let ua = rows[1][analytics_cols::USER_AGENT].as_str().unwrap();
        assert!(ua.starts_with('\''));
    }

    #[tokio::test]
    async fn rejects_unknown_metric() {
        let state = state();
        let snapshot = state.registry.current();
        let tenant = snapshot.root().unwrap();
        let body = json!({ "items": [ { "eventId": "e1", "metric": "pageview" } ] });
        let err = log_events(&state, tenant, &body).await.unwrap_err();
        assert_eq!(err.message, "Invalid metric");
    }

    #[tokio::test]
    async fn external_click_validates_link_type_and_caps_sponsors() {
        let state = state();
        let snapshot = state.registry.current();
        let tenant = snapshot.root().unwrap();

        let bad = json!({ "eventId": "e1", "linkType": "homepage" });
        assert!(log_external_click(&state, tenant, &bad).await.is_err());

        let ids: Vec<String> = (0..30).map(|i| format!("s{i}")).collect();
        let ok = json!({ "eventId": "e1", "linkType": "standings", "visibleSponsorIds": ids });
        log_external_click(&state, tenant, &ok).await.unwrap();
        let rows = state
            .store
            .read_all(&tenant.store_id, Sheet::Analytics)
            .await
            .unwrap();
        let visible: Vec<String> = serde_json::from_str(
            rows[0][analytics_cols::VISIBLE_SPONSOR_IDS].as_str().unwrap(),
        )
        .unwrap();
        assert_eq!(visible.len(), 20);
        assert_eq!(rows[0][analytics_cols::METRIC], "external_click");
        assert_eq!(rows[0][analytics_cols::SPONSOR_ID], "standings");
    }
}
