#![allow(dead_code)]

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use event_gateway::app_state::AppState;
use event_gateway::config::{event_template, ServerConfig};
use event_gateway::registry::{
    AliasTarget, ConfigSnapshot, DisplayConfig, DisplayEmphasis, DisplayOverride, Scope, Tenant,
    TenantKind,
};
use event_gateway::router::build_router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

pub const ROOT_SECRET: &str = "root-secret";
pub const ABC_SECRET: &str = "abc-secret";

pub struct TestApp {
    pub state: AppState,
    pub app: Router,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        base_url: "http://svc.test/".to_string(),
        registry_path: None,
        qr_endpoint: "https://qr.test/qr".to_string(),
        qr_timeout_ms: 100,
        // High default so functional tests never trip the window; the rate
        // limit suite builds its own state with the contract value.
        rate_limit_per_minute: 1000,
        auth_lockout_threshold: 5,
        auth_lockout_window_secs: 900,
        csrf_ttl_secs: 3600,
        csrf_lock_wait_secs: 5,
        idempotency_ttl_secs: 600,
        event_lock_wait_secs: 10,
    }
}

pub fn test_snapshot() -> ConfigSnapshot {
    let tenant = |id: &str, name: &str, host: &str, store: &str| Tenant {
        id: id.to_string(),
        name: name.to_string(),
        hostnames: vec![host.to_string()],
        scopes_allowed: vec![Scope::Events, Scope::Tournaments],
        store_id: store.to_string(),
        kind: TenantKind::Leaf,
        child_brands: vec![],
        include_in_portfolio_reports: false,
    };
    let mut aliases = HashMap::new();
    aliases.insert("status".to_string(), AliasTarget::Action("status".to_string()));
    aliases.insert("big-screen".to_string(), AliasTarget::Page("display".to_string()));

    let mut display_overrides = HashMap::new();
    display_overrides.insert(
        "event".to_string(),
        DisplayOverride {
            emphasis: Some(DisplayEmphasis::Sponsors),
            ..DisplayOverride::default()
        },
    );

    let mut admin_secrets = HashMap::new();
    admin_secrets.insert("root".to_string(), ROOT_SECRET.to_string());
    admin_secrets.insert("abc".to_string(), ABC_SECRET.to_string());

    ConfigSnapshot {
        app_title: "Event Toolkit".to_string(),
        build: "test".to_string(),
        contract_version: "v2".to_string(),
        tenants: vec![
            tenant("root", "Root Events", "events.example.com", "store-root"),
            tenant("abc", "ABC League", "abc.example.com", "store-abc"),
        ],
        templates: vec![event_template()],
        aliases,
        display: DisplayConfig::default(),
        display_overrides,
        admin_secrets,
    }
}

pub fn test_app() -> TestApp {
    test_app_with(test_config())
}

pub fn test_app_with(config: ServerConfig) -> TestApp {
    let state = AppState::in_memory(config, test_snapshot());
    let app = build_router(state.clone());
    TestApp { state, app }
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    get_json_with_headers(app, uri, &[]).await
}

pub async fn get_json_with_headers(
    app: &Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn get_html(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

pub async fn post_json(app: &Router, body: Value) -> (StatusCode, Value) {
    post_json_with_headers(app, body, &[]).await
}

pub async fn post_json_with_headers(
    app: &Router,
    body: Value,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Create an event under `brand` with the brand's admin secret; returns the
/// hydrated event value.
pub async fn create_event(app: &Router, brand: &str, secret: &str, name: &str) -> Value {
    let (status, body) = post_json(
        app,
        json!({
            "action": "create",
            "brandId": brand,
            "adminKey": secret,
            "name": name,
            "startDateISO": "2025-08-15",
            "venue": "Park",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    assert_eq!(body["ok"], true, "create failed: {body}");
    body["value"].clone()
}

/// Poll the analytics sheet until `predicate` rows exist or a deadline hits.
/// Redirect click logging is fire-and-forget, so tests wait for it.
pub async fn wait_for_analytics_rows(
    state: &AppState,
    store_id: &str,
    expected: usize,
) -> Vec<Vec<Value>> {
    use common_store::{Sheet, Store};
    for _ in 0..50 {
        let rows = state
            .store
            .read_all(store_id, Sheet::Analytics)
            .await
            .expect("analytics read");
        if rows.len() >= expected {
            return rows;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("analytics rows never reached {expected}");
}
