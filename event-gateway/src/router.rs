//! Request routing and dispatch.
//!
//! Everything rides on `/` with query-parameter routing plus optional
//! friendly path aliases, so the surface stays deployable behind a single
//! script-style endpoint. Order of resolution: tenant (brand param → host →
//! root), then aliases, then `?action=`, then `?page=`, then the public
//! listing fallback.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use common_auth::{authenticate, check_origin, Credentials};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::analytics;
use crate::app_state::AppState;
use crate::bundles;
use crate::envelope::{ok_cached, ok_value, ApiError, ApiResult};
use crate::events;
use crate::ports::FormError;
use crate::registry::{AliasTarget, Tenant};
use crate::reports;
use crate::shortlinks;

/// POST actions that change state and therefore need a CSRF token when the
/// request comes from a browser.
const CSRF_ACTIONS: &[&str] = &[
    "create",
    "update",
    "delete",
    "updateEventData",
    "createShortlink",
    "createFormFromTemplate",
    "generateFormShortlink",
];

/// POST actions that require tenant credentials.
const AUTHENTICATED_ACTIONS: &[&str] = &[
    "create",
    "update",
    "updateEventData",
    "createShortlink",
    "getReport",
    "getAdminBundle",
    "getSponsorAnalytics",
    "createFormFromTemplate",
    "generateFormShortlink",
];

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/", get(handle_get).post(handle_post))
        .route("/:seg_a", get(handle_get_one))
        .route("/:seg_a/:seg_b", get(handle_get_two))
        .with_state(state)
        .layer(cors)
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(resp) => resp,
        Err(err) => {
            tracing::warn!(?err, "failed to render metrics");
            ApiError::internal(err.to_string()).into_response()
        }
    }
}

async fn handle_get(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    dispatch_get(state, Vec::new(), params, headers).await
}

async fn handle_get_one(
    State(state): State<AppState>,
    Path(seg_a): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    dispatch_get(state, vec![seg_a], params, headers).await
}

async fn handle_get_two(
    State(state): State<AppState>,
    Path((seg_a, seg_b)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    dispatch_get(state, vec![seg_a, seg_b], params, headers).await
}

async fn dispatch_get(
    state: AppState,
    segments: Vec<String>,
    params: HashMap<String, String>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers);
    let tenant = match resolve_tenant(&state, params.get("brand").map(String::as_str), &headers) {
        Ok(tenant) => tenant,
        Err(err) => return finish_err(&state, "resolve", err).await,
    };
    if let Err(err) = state.rate_limiter.check(&tenant.id, &ip).await {
        state.metrics.rate_limit_rejections.inc();
        return finish_err(&state, "rate-limit", err).await;
    }

    // Friendly path aliases. `[brand, alias]` re-resolves the tenant from the
    // first segment; `[alias]` keeps the already-resolved tenant.
    let mut params = params;
    let snapshot = state.registry.current();
    let (tenant, alias_target) = match segments.as_slice() {
        [brand, alias] => match snapshot.tenant(brand) {
            Some(t) => (t.clone(), snapshot.alias(alias).cloned()),
            None => return finish_err(&state, "alias", ApiError::not_found()).await,
        },
        [single] => {
            if let Some(target) = snapshot.alias(single) {
                (tenant, Some(target.clone()))
            } else if let Some(t) = snapshot.tenant(single) {
                (t.clone(), None)
            } else {
                return finish_err(&state, "alias", ApiError::not_found()).await;
            }
        }
        _ => (tenant, None),
    };
    match alias_target {
        Some(AliasTarget::Action(action)) => {
            return run_get_action(&state, &tenant, &action, &params, &headers, &ip).await;
        }
        Some(AliasTarget::Page(page)) => {
            params.insert("page".to_string(), page);
        }
        None => {}
    }

    if let Some(action) = params.get("action").cloned() {
        return run_get_action(&state, &tenant, &action, &params, &headers, &ip).await;
    }

    let page = params
        .get("page")
        .or_else(|| params.get("p"))
        .cloned()
        .unwrap_or_default();
    if page == "r" || page == "redirect" {
        state.metrics.requests_total.with_label_values(&["redirect"]).inc();
        let token = params.get("t").or_else(|| params.get("token")).map(String::as_str);
        return Html(shortlinks::handle_redirect(&state, token).await).into_response();
    }
    if !page.is_empty() {
        return run_page(&state, &tenant, &page, &params, &headers, &ip).await;
    }

    // Fallback: the public listing route.
    run_get_action(&state, &tenant, "list", &params, &headers, &ip).await
}

/// GET action surface: public reads only.
async fn run_get_action(
    state: &AppState,
    tenant: &Tenant,
    action: &str,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    ip: &str,
) -> Response {
    state.metrics.requests_total.with_label_values(&[action]).inc();
    let if_none_match = params
        .get("etag")
        .map(String::as_str)
        .or_else(|| header_str(headers, header::IF_NONE_MATCH.as_str()));

    let result: ApiResult<Response> = match action {
        "status" => status_value(state, tenant).await.map(|v| ok_value(v, None)),
        "generateCSRFToken" => {
            let token = state.csrf.generate(&csrf_user_key(tenant, ip)).await;
            Ok(ok_value(json!({ "csrfToken": token }), None))
        }
        "config" => Ok(ok_value(config_value(state, tenant), None)),
        "permissions" => Ok(ok_value(permissions_value(tenant), None)),
        "docs" => Ok(ok_value(docs_value(state), None)),
        "list" => match check_scope_param(tenant, params) {
            Ok(()) => {
                let limit = params.get("limit").map(|v| parse_i64(v, "limit"));
                let offset = params.get("offset").map(|v| parse_i64(v, "offset"));
                match (transpose(limit), transpose(offset)) {
                    (Ok(limit), Ok(offset)) => events::list_events(state, tenant, limit, offset)
                        .await
                        .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
                    (Err(err), _) | (_, Err(err)) => Err(err),
                }
            }
            Err(err) => Err(err),
        },
        "get" => match check_scope_param(tenant, params).and_then(|()| required_param(params, "id")) {
            Ok(id) => events::get_event(state, tenant, id)
                .await
                .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
            Err(err) => Err(err),
        },
        "getPublicBundle" | "getDisplayBundle" | "getPosterBundle" | "getSponsorBundle"
        | "getSharedReportBundle" => match required_param(params, "id") {
            Ok(id) => bundle_for_action(state, tenant, action, id)
                .await
                .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
            Err(err) => Err(err),
        },
        _ => Err(ApiError::bad_input("Unknown action")),
    };
    finish(state, action, result).await
}

async fn bundle_for_action(
    state: &AppState,
    tenant: &Tenant,
    action: &str,
    id: &str,
) -> ApiResult<(Value, String)> {
    match action {
        "getPublicBundle" => bundles::public_bundle(state, tenant, id).await,
        "getDisplayBundle" => bundles::display_bundle(state, tenant, id).await,
        "getPosterBundle" => bundles::poster_bundle(state, tenant, id).await,
        "getSponsorBundle" => bundles::sponsor_bundle(state, tenant, id).await,
        "getSharedReportBundle" => bundles::shared_report_bundle(state, tenant, id).await,
        _ => Err(ApiError::bad_input("Unknown action")),
    }
}

/// `?page=<x>` routes serve the page's backing bundle as JSON; HTML rendering
/// lives outside the core.
async fn run_page(
    state: &AppState,
    tenant: &Tenant,
    page: &str,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    ip: &str,
) -> Response {
    let label = format!("page:{page}");
    state
        .metrics
        .requests_total
        .with_label_values(&[label.as_str()])
        .inc();
    let if_none_match = params
        .get("etag")
        .map(String::as_str)
        .or_else(|| header_str(headers, header::IF_NONE_MATCH.as_str()));

    let result: ApiResult<Response> = match page {
        "events" | "public" | "signup" => match params.get("id") {
            Some(id) => bundles::public_bundle(state, tenant, id)
                .await
                .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
            None => events::list_events(state, tenant, None, None)
                .await
                .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
        },
        "display" => with_id(params, |id| bundles::display_bundle(state, tenant, id))
            .await
            .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
        "poster" => with_id(params, |id| bundles::poster_bundle(state, tenant, id))
            .await
            .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
        "sponsor" => with_id(params, |id| bundles::sponsor_bundle(state, tenant, id))
            .await
            .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
        "report" => with_id(params, |id| bundles::shared_report_bundle(state, tenant, id))
            .await
            .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
        "admin" => {
            let auth = authorize(
                state,
                tenant,
                params.get("adminKey").map(String::as_str),
                headers,
                ip,
            )
            .await;
            match auth {
                Ok(()) => {
                    let advanced = params.get("mode").map(String::as_str) == Some("advanced");
                    match required_param(params, "id") {
                        Ok(id) => bundles::admin_bundle(state, tenant, id, advanced)
                            .await
                            .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
                        Err(err) => Err(err),
                    }
                }
                Err(err) => Err(err),
            }
        }
        _ => events::list_events(state, tenant, None, None)
            .await
            .map(|(value, etag)| ok_cached(value, etag, if_none_match)),
    };
    finish(state, &label, result).await
}

async fn handle_post(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let err = ApiError::bad_input("Invalid JSON body");
            tracing::debug!(%rejection, "rejected POST body");
            return finish_err(&state, "post", err).await;
        }
    };
    let action = match body.get("action").and_then(Value::as_str) {
        Some(action) => action.to_string(),
        None => return finish_err(&state, "post", ApiError::bad_input("Missing action")).await,
    };
    state
        .metrics
        .requests_total
        .with_label_values(&[action.as_str()])
        .inc();

    let ip = client_ip(&headers);
    let brand = body
        .get("brandId")
        .and_then(Value::as_str)
        .or_else(|| params.get("brand").map(String::as_str));
    let tenant = match resolve_tenant(&state, brand, &headers) {
        Ok(tenant) => tenant,
        Err(err) => return finish_err(&state, &action, err).await,
    };
    if let Err(err) = state.rate_limiter.check(&tenant.id, &ip).await {
        state.metrics.rate_limit_rejections.inc();
        return finish_err(&state, &action, err).await;
    }

    let result = run_post_action(&state, &tenant, &action, &body, &headers, &ip).await;
    finish(&state, &action, result).await
}

async fn run_post_action(
    state: &AppState,
    tenant: &Tenant,
    action: &str,
    body: &Value,
    headers: &HeaderMap,
    ip: &str,
) -> ApiResult<Response> {
    let snapshot = state.registry.current();
    let origin = header_str(headers, header::ORIGIN.as_str());
    // A body adminKey counts as a credential here: origin-less requests must
    // prove they are API clients, and the shared secret does exactly that
    // (it still gets verified before any authenticated action runs).
    let has_credentials = headers.contains_key(header::AUTHORIZATION)
        || headers.contains_key("x-api-key")
        || body
            .get("adminKey")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
    check_origin(origin, has_credentials, &snapshot.all_hostnames()).map_err(|err| {
        state.metrics.auth_failures.inc();
        ApiError::from(err)
    })?;

    // Browser-originated writes must spend a CSRF token; API clients
    // authenticate via headers and skip this.
    if CSRF_ACTIONS.contains(&action) && origin.is_some() {
        let token = body.get("csrfToken").and_then(Value::as_str).unwrap_or_default();
        if token.is_empty()
            || !state.csrf.validate(&csrf_user_key(tenant, ip), token).await?
        {
            state.metrics.csrf_rejections.inc();
            return Err(ApiError::bad_input("Invalid CSRF token"));
        }
    }

    if AUTHENTICATED_ACTIONS.contains(&action) {
        authorize(state, tenant, body.get("adminKey").and_then(Value::as_str), headers, ip).await?;
    } else if action == "getSponsorROI" {
        // Optional auth: sponsors may fetch their own ROI view; credentials,
        // when offered, must still be valid.
        let offered = body.get("adminKey").is_some()
            || headers.contains_key(header::AUTHORIZATION)
            || headers.contains_key("x-api-key");
        if offered {
            authorize(state, tenant, body.get("adminKey").and_then(Value::as_str), headers, ip)
                .await?;
        }
    }

    match action {
        "create" => {
            let (value, etag) = events::create_event(state, tenant, body).await?;
            Ok(ok_value(value, Some(&etag)))
        }
        "update" | "updateEventData" => {
            let id = required_body_id(body)?;
            let (value, etag) = events::update_event(state, tenant, id, body).await?;
            Ok(ok_value(value, Some(&etag)))
        }
        "delete" => Err(ApiError::bad_input("Unsupported action")),
        "logEvents" => analytics::log_events(state, tenant, body)
            .await
            .map(|v| ok_value(v, None)),
        "logExternalClick" => analytics::log_external_click(state, tenant, body)
            .await
            .map(|v| ok_value(v, None)),
        "getReport" => {
            let id = required_body_id(body)?;
            reports::get_report(state, tenant, id).await.map(|v| ok_value(v, None))
        }
        "getAdminBundle" => {
            let id = required_body_id(body)?;
            let advanced = body.get("mode").and_then(Value::as_str) == Some("advanced");
            let if_none_match = body.get("etag").and_then(Value::as_str);
            let (value, etag) = bundles::admin_bundle(state, tenant, id, advanced).await?;
            Ok(ok_cached(value, etag, if_none_match))
        }
        "createShortlink" => shortlinks::create_shortlink(state, tenant, body)
            .await
            .map(|v| ok_value(v, None)),
        "listFormTemplates" => {
            let templates = state.forms.list_templates().await;
            Ok(ok_value(json!({ "templates": templates }), None))
        }
        "createFormFromTemplate" => create_form_from_template(state, tenant, body).await,
        "generateFormShortlink" => generate_form_shortlink(state, tenant, body).await,
        "getSponsorAnalytics" => reports::get_sponsor_analytics(state, tenant, body)
            .await
            .map(|v| ok_value(v, None)),
        "getSponsorROI" => reports::get_sponsor_roi(state, tenant, body)
            .await
            .map(|v| ok_value(v, None)),
        _ => Err(ApiError::bad_input("Unknown action")),
    }
}

async fn create_form_from_template(
    state: &AppState,
    tenant: &Tenant,
    body: &Value,
) -> ApiResult<Response> {
    let event_id = required_body_id(body)?;
    let form_template = body
        .get("formTemplateId")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_input("Missing formTemplateId"))?;
    // Event must exist under this tenant before we mint anything external.
    events::find_event_row(state, tenant, event_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let info = state
        .forms
        .create_form(&tenant.id, event_id, form_template)
        .await
        .map_err(|err| match err {
            FormError::Unconfigured => ApiError::bad_input("Form provider not configured"),
            FormError::Provider(detail) => ApiError::internal(detail),
        })?;
    let mut updates = serde_json::Map::new();
    updates.insert("formUrl".to_string(), json!(info.form_url));
    if let Some(edit) = &info.edit_url {
        updates.insert("formEditUrl".to_string(), json!(edit));
    }
    events::merge_external_data(state, tenant, event_id, updates).await?;
    Ok(ok_value(serde_json::to_value(&info).unwrap_or(Value::Null), None))
}

async fn generate_form_shortlink(
    state: &AppState,
    tenant: &Tenant,
    body: &Value,
) -> ApiResult<Response> {
    let event_id = required_body_id(body)?;
    let (event, _) = events::get_event(state, tenant, event_id).await?;
    let target = event
        .get("externalData")
        .and_then(|d| d.get("formUrl"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            event
                .get("links")
                .and_then(|l| l.get("signupUrl"))
                .and_then(Value::as_str)
        })
        .ok_or_else(|| ApiError::bad_input("Event has no signup form"))?;
    let request = json!({
        "targetUrl": target,
        "eventId": event_id,
        "surface": "signup",
    });
    shortlinks::create_shortlink(state, tenant, &request)
        .await
        .map(|v| ok_value(v, None))
}

/// Resolve credentials against the tenant secret; failures feed the lockout
/// counter and the diagnostic log before surfacing as `BAD_INPUT`.
async fn authorize(
    state: &AppState,
    tenant: &Tenant,
    admin_key: Option<&str>,
    headers: &HeaderMap,
    ip: &str,
) -> ApiResult<()> {
    let snapshot = state.registry.current();
    let bearer = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|raw| raw.strip_prefix("Bearer ").map(str::trim));
    let creds = Credentials {
        admin_key,
        bearer,
        api_key: header_str(headers, "x-api-key"),
    };
    let secret = snapshot.secret_for(&tenant.id).unwrap_or_default();
    match authenticate(&tenant.id, secret, &creds) {
        Ok(_) if !secret.is_empty() => Ok(()),
        Ok(_) => {
            // A tenant without a configured secret accepts nothing.
            note_auth_failure(state, tenant, ip, "no secret configured").await;
            Err(ApiError::bad_input("Invalid authentication credentials"))
        }
        Err(err) => {
            note_auth_failure(state, tenant, ip, &err.to_string()).await;
            Err(ApiError::from(err))
        }
    }
}

async fn note_auth_failure(state: &AppState, tenant: &Tenant, ip: &str, detail: &str) {
    state.metrics.auth_failures.inc();
    state.rate_limiter.note_auth_failure(&tenant.id, ip).await;
    state
        .diag
        .warn(
            "auth",
            "authentication failed",
            json!({ "tenant": tenant.id, "ip": ip, "detail": detail }),
        )
        .await;
}

async fn status_value(state: &AppState, tenant: &Tenant) -> ApiResult<Value> {
    let snapshot = state.registry.current();
    let db_ok = state
        .store
        .row_count(&tenant.store_id, common_store::Sheet::Events)
        .await
        .is_ok();
    Ok(json!({
        "build": snapshot.build,
        "contract": snapshot.contract_version,
        "brand": tenant.id,
        "time": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "db": { "ok": db_ok, "id": tenant.store_id },
    }))
}

/// Optional `scope=<s>` on read routes: must parse and be allowed for the
/// tenant.
fn check_scope_param(tenant: &Tenant, params: &HashMap<String, String>) -> ApiResult<()> {
    let Some(raw) = params.get("scope").filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let scope = crate::registry::Scope::parse(raw)
        .ok_or_else(|| ApiError::bad_input("Invalid scope"))?;
    if !tenant.allows_scope(scope) {
        return Err(ApiError::bad_input("Scope not allowed for tenant"));
    }
    Ok(())
}

fn permissions_value(tenant: &Tenant) -> Value {
    json!({
        "brand": tenant.id,
        "scopesAllowed": tenant.scopes_allowed,
        "authMethods": ["adminKey", "bearer", "apiKey"],
        "writeActionsRequireCsrf": true,
    })
}

/// Machine-readable route summary served by the `docs` alias target.
fn docs_value(state: &AppState) -> Value {
    let snapshot = state.registry.current();
    json!({
        "build": snapshot.build,
        "contract": snapshot.contract_version,
        "reads": [
            "status", "config", "permissions", "docs", "generateCSRFToken",
            "list", "get", "getPublicBundle", "getDisplayBundle",
            "getPosterBundle", "getSponsorBundle", "getSharedReportBundle",
        ],
        "writes": [
            "create", "update", "logEvents", "logExternalClick", "getReport",
            "getAdminBundle", "createShortlink", "listFormTemplates",
            "createFormFromTemplate", "generateFormShortlink",
            "getSponsorAnalytics", "getSponsorROI",
        ],
    })
}

fn config_value(state: &AppState, tenant: &Tenant) -> Value {
    let snapshot = state.registry.current();
    let brands: Vec<Value> = snapshot
        .tenants
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "hostnames": t.hostnames,
                "scopesAllowed": t.scopes_allowed,
            })
        })
        .collect();
    let templates: Vec<Value> = snapshot
        .templates
        .iter()
        .map(|t| serde_json::to_value(t).unwrap_or(Value::Null))
        .collect();
    json!({
        "brands": brands,
        "brand": tenant.id,
        "templates": templates,
        "build": snapshot.build,
    })
}

fn resolve_tenant(
    state: &AppState,
    brand: Option<&str>,
    headers: &HeaderMap,
) -> ApiResult<Tenant> {
    let snapshot = state.registry.current();
    if let Some(brand) = brand.filter(|b| !b.is_empty()) {
        return snapshot
            .tenant(brand)
            .cloned()
            .ok_or_else(ApiError::not_found);
    }
    if let Some(host) = header_str(headers, header::HOST.as_str()) {
        if let Some(tenant) = snapshot.tenant_by_host(host) {
            return Ok(tenant.clone());
        }
    }
    snapshot
        .root()
        .cloned()
        .ok_or_else(|| ApiError::internal("root tenant missing from registry"))
}

async fn finish(state: &AppState, action: &str, result: ApiResult<Response>) -> Response {
    match result {
        Ok(resp) => resp,
        Err(err) => finish_err(state, action, err).await,
    }
}

async fn finish_err(state: &AppState, action: &str, err: ApiError) -> Response {
    state
        .metrics
        .errors_total
        .with_label_values(&[err.kind.as_str()])
        .inc();
    if let Some(internal) = &err.internal {
        state
            .diag
            .error(
                "router",
                &err.message,
                json!({ "action": action, "detail": internal }),
            )
            .await;
        tracing::warn!(action, code = err.kind.as_str(), detail = %internal, "request failed");
    } else {
        tracing::debug!(action, code = err.kind.as_str(), message = %err.message, "request rejected");
    }
    err.into_response()
}

fn csrf_user_key(tenant: &Tenant, ip: &str) -> String {
    format!("{}:{}", tenant.id, ip)
}

fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|raw| raw.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn required_param<'a>(params: &'a HashMap<String, String>, key: &str) -> ApiResult<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_input(format!("Missing {key}")))
}

fn required_body_id(body: &Value) -> ApiResult<&str> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_input("Missing id"))
}

fn parse_i64(raw: &str, key: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::bad_input(format!("Invalid {key}")))
}

fn transpose(value: Option<ApiResult<i64>>) -> ApiResult<Option<i64>> {
    match value {
        None => Ok(None),
        Some(Ok(v)) => Ok(Some(v)),
        Some(Err(err)) => Err(err),
    }
}

async fn with_id<'a, F, Fut>(
    params: &'a HashMap<String, String>,
    f: F,
) -> ApiResult<(Value, String)>
where
    F: FnOnce(&'a str) -> Fut,
    Fut: std::future::Future<Output = ApiResult<(Value, String)>>,
{
    let id = required_param(params, "id")?;
    f(id).await
}
