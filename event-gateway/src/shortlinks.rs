//! Shortlink minting and the redirect surface.
//!
//! Tokens are full UUID v4s stored in the root partition so one sheet serves
//! every brand. The redirect handler is the only place the core emits HTML:
//! a constant meta-refresh page for tenant-owned targets and a constant
//! external-link warning interstitial for everything else, each with a single
//! escaped slot.

use chrono::{SecondsFormat, Utc};
use common_security::{escape_cell, is_url, validate_id};
use common_store::sheet::shortlinks_cols;
use common_store::{cell_str, Row, Sheet};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analytics;
use crate::app_state::AppState;
use crate::envelope::{ApiError, ApiResult};
use crate::registry::Tenant;

/// `createShortlink`: validate, mint, append, return the wrapped link.
pub async fn create_shortlink(state: &AppState, tenant: &Tenant, body: &Value) -> ApiResult<Value> {
    let target_url = body
        .get("targetUrl")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_input("Missing targetUrl"))?;
    if !is_url(target_url) {
        return Err(ApiError::bad_input("Invalid targetUrl"));
    }
    let optional_id = |key: &str| -> ApiResult<String> {
        match body.get(key).and_then(Value::as_str) {
            None | Some("") => Ok(String::new()),
            Some(raw) if validate_id(raw) => Ok(raw.to_string()),
            Some(_) => Err(ApiError::bad_input(format!("Invalid {key}"))),
        }
    };
    let event_id = optional_id("eventId")?;
    let sponsor_id = optional_id("sponsorId")?;
    let surface = optional_id("surface")?;

    let snapshot = state.registry.current();
    let store_id = snapshot
        .root()
        .map(|t| t.store_id.clone())
        .ok_or_else(|| ApiError::internal("root tenant missing from registry"))?;

    let token = Uuid::new_v4().to_string();
    let row = vec![
        json!(token),
        json!(escape_cell(target_url)),
        json!(event_id),
        json!(sponsor_id),
        json!(surface),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        json!(tenant.id),
    ];
    state.store.append(&store_id, Sheet::Shortlinks, row).await?;

    Ok(json!({
        "token": token,
        "shortlink": format!("{}?p=r&t={}", state.config.base_url, token),
    }))
}

/// Outcome of a redirect lookup, rendered by [`redirect_page`].
enum Redirect {
    Error(&'static str),
    Internal(String),
    External(String),
}

/// `?page=r&t=<token>`: resolve, log, forward. Always responds with HTML.
pub async fn handle_redirect(state: &AppState, token: Option<&str>) -> String {
    state.metrics.shortlink_redirects_total.inc();
    let outcome = resolve_redirect(state, token).await;
    match outcome {
        Redirect::Error(message) => error_page(message),
        Redirect::Internal(url) => meta_refresh_page(&url),
        Redirect::External(url) => interstitial_page(&url),
    }
}

async fn resolve_redirect(state: &AppState, token: Option<&str>) -> Redirect {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Redirect::Error("Invalid shortlink");
    };
    if !validate_id(token) {
        return Redirect::Error("Invalid shortlink");
    }

    let snapshot = state.registry.current();
    let Some(store_id) = snapshot.root().map(|t| t.store_id.clone()) else {
        return Redirect::Error("Shortlink not found");
    };
    let rows = match state.store.read_all(&store_id, Sheet::Shortlinks).await {
        Ok(rows) => rows,
        Err(err) => {
            state
                .diag
                .error("shortlinks", "shortlink read failed", json!({"error": err.to_string()}))
                .await;
            return Redirect::Error("Shortlink not found");
        }
    };
    let Some(row) = rows
        .iter()
        .find(|row| cell_str(row, shortlinks_cols::TOKEN) == token)
    else {
        return Redirect::Error("Shortlink not found");
    };

    let target = stored_target_url(row);
    if !is_url(&target) {
        return Redirect::Error("Invalid shortlink target");
    }

    spawn_click_log(state, row, token);

    if is_tenant_host(&snapshot.all_hostnames(), &target) {
        Redirect::Internal(target)
    } else {
        Redirect::External(target)
    }
}

/// Fire-and-forget attribution write; the redirect never waits on it.
fn spawn_click_log(state: &AppState, row: &Row, token: &str) {
    let surface = {
        let s = cell_str(row, shortlinks_cols::SURFACE);
        if s.is_empty() {
            "shortlink".to_string()
        } else {
            s.to_string()
        }
    };
    let snapshot = state.registry.current();
    let owner = cell_str(row, shortlinks_cols::TENANT_ID);
    let store_id = snapshot
        .tenant(owner)
        .or_else(|| snapshot.root())
        .map(|t| t.store_id.clone());
    if let Some(store_id) = store_id {
        tokio::spawn(analytics::record_click(
            state.clone(),
            store_id,
            cell_str(row, shortlinks_cols::EVENT_ID).to_string(),
            surface,
            cell_str(row, shortlinks_cols::SPONSOR_ID).to_string(),
            token.to_string(),
        ));
    }
}

/// Stored target URLs carry the cell-escape apostrophe only when the raw
/// value had a formula leader, which `is_url` would have rejected; strip
/// defensively anyway.
fn stored_target_url(row: &Row) -> String {
    let raw = cell_str(row, shortlinks_cols::TARGET_URL);
    raw.strip_prefix('\'').unwrap_or(raw).to_string()
}

fn is_tenant_host(hostnames: &[String], target: &str) -> bool {
    url::Url::parse(target)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|host| hostnames.iter().any(|c| c.eq_ignore_ascii_case(&host)))
        .unwrap_or(false)
}

/// Minimal HTML escaping for the single interpolated slot.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn error_page(message: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{m}</title></head>\
         <body><h1>{m}</h1><p>This link cannot be followed.</p></body></html>",
        m = escape_html(message)
    )
}

fn meta_refresh_page(url: &str) -> String {
    let escaped = escape_html(url);
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"0;url={escaped}\">\
         <title>Redirecting</title></head>\
         <body><p>Redirecting to <a href=\"{escaped}\">{escaped}</a></p></body></html>"
    )
}

fn interstitial_page(url: &str) -> String {
    let escaped = escape_html(url);
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Leaving this site</title></head>\
         <body><h1>You are leaving this site</h1>\
         <p>This link goes to an external destination:</p>\
         <p><code>{escaped}</code></p>\
         <p><a href=\"{escaped}\" rel=\"noopener noreferrer\">Continue</a> \
         <a href=\"/\">Cancel</a></p>\
         </body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping_covers_the_slot() {
        assert_eq!(
            escape_html("https://e.com/?a=1&b=\"<x>\""),
            "https://e.com/?a=1&amp;b=&quot;&lt;x&gt;&quot;"
        );
    }

    #[test]
    fn tenant_host_detection() {
        let hosts = vec!["events.example.com".to_string()];
        assert!(is_tenant_host(&hosts, "https://events.example.com/e/1"));
        assert!(is_tenant_host(&hosts, "https://EVENTS.EXAMPLE.COM/e/1"));
        assert!(!is_tenant_host(&hosts, "https://example.com/promo"));
        assert!(!is_tenant_host(&hosts, "not a url"));
    }

    #[test]
    fn interstitial_contains_escaped_target_only() {
        let page = interstitial_page("https://example.com/promo?x=\"1\"");
        assert!(page.contains("https://example.com/promo?x=&quot;1&quot;"));
        assert!(!page.contains("x=\"1\""));
    }
}
