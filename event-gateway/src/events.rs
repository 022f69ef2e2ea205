//! Event lifecycle: create, read, list, update.
//!
//! Creation and update hold the process-wide event write lock around their
//! read-modify-write of the Events sheet; that lock is what makes slug
//! collision handling deterministic. Reads take snapshots and never lock.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use common_security::{is_url, sanitize_text, validate_id};
use common_store::sheet::{events_cols, sponsors_cols};
use common_store::{cell_str, Row, Sheet};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::contract::{
    apply_legacy_aliases, compute_etag, is_slug, is_start_date, parse_stored_event, slugify, Event,
    LinkContext,
};
use crate::envelope::{ApiError, ApiResult};
use crate::registry::{FieldType, Scope, Template, Tenant};

const EVENT_WRITE_LOCK: &str = "events:write";
const NAME_MAX: usize = 200;
const TEXT_MAX: usize = 1000;
const LIST_LIMIT_DEFAULT: usize = 100;
const LIST_LIMIT_MAX: usize = 1000;

/// Locate `(row_index, row)` for an event id within one tenant. A row owned
/// by another tenant reads as absent, so cross-tenant probes cannot tell an
/// existing foreign id from a missing one.
pub async fn find_event_row(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<Option<(usize, Row)>> {
    if !validate_id(event_id) {
        return Err(ApiError::bad_input("Invalid id"));
    }
    let rows = state.store.read_all(&tenant.store_id, Sheet::Events).await?;
    Ok(rows.into_iter().enumerate().find(|(_, row)| {
        cell_str(row, events_cols::ID) == event_id
            && cell_str(row, events_cols::TENANT_ID) == tenant.id
    }))
}

/// `create`: validate, reserve the idempotency key, pick a unique slug under
/// the write lock, append, return the hydrated event.
pub async fn create_event(
    state: &AppState,
    tenant: &Tenant,
    body: &Value,
) -> ApiResult<(Value, String)> {
    let scope_raw = body
        .get("scope")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("events");
    let scope = Scope::parse(scope_raw).ok_or_else(|| ApiError::bad_input("Invalid scope"))?;
    if !tenant.allows_scope(scope) {
        return Err(ApiError::bad_input("Scope not allowed for tenant"));
    }

    let name = sanitize_text(
        body.get("name").and_then(Value::as_str).unwrap_or_default(),
        NAME_MAX,
    );
    if name.is_empty() {
        return Err(ApiError::bad_input("Missing or invalid name"));
    }
    let start_date = body
        .get("startDateISO")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !is_start_date(start_date) {
        return Err(ApiError::bad_input("Missing or invalid startDateISO"));
    }
    let venue = sanitize_text(
        body.get("venue").and_then(Value::as_str).unwrap_or_default(),
        NAME_MAX,
    );
    if venue.is_empty() {
        return Err(ApiError::bad_input("Missing or invalid venue"));
    }

    let id = match body.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let parsed = Uuid::parse_str(raw).map_err(|_| ApiError::bad_input("Invalid id"))?;
            if parsed.get_version_num() != 4 {
                return Err(ApiError::bad_input("Invalid id"));
            }
            parsed.to_string()
        }
        None => Uuid::new_v4().to_string(),
    };

    let requested_slug = body
        .get("slug")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(slugify)
        .filter(|s| is_slug(s));

    let template_id = resolve_template_id(state, body)?;

    if let Some(idem_key) = body.get("idemKey").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        if !is_idem_key(idem_key) {
            return Err(ApiError::bad_input("Invalid idemKey"));
        }
        let cache_key = format!("idem:{}:{}:{}", tenant.id, scope.as_str(), idem_key);
        let won = state
            .cache
            .put_if_absent(
                &cache_key,
                json!(id.clone()),
                Duration::from_secs(state.config.idempotency_ttl_secs),
            )
            .await;
        if !won {
            return Err(ApiError::bad_input("Duplicate create"));
        }
    }

    let data = body.get("data").and_then(Value::as_object);
    let template = match data {
        Some(_) => Some(template_for(state, &template_id)?),
        None => None,
    };
    let slug_base = requested_slug.unwrap_or_else(|| slugify(&name));
    let now = now_iso();
    let mut event_value = json!({
        "id": id,
        "slug": "",
        "name": name,
        "startDateISO": start_date,
        "venue": venue,
        "templateId": template_id,
        "createdAtISO": now,
        "updatedAtISO": now,
    });
    for key in ["schedule", "standings", "bracket", "sponsors", "media", "externalData"] {
        if let Some(content) = body.get(key) {
            if !content.is_null() {
                event_value[key] = content.clone();
            }
        }
    }
    if let Some(ctas) = body.get("ctas") {
        event_value["ctas"] = sanitize_ctas(ctas)?;
    }
    if let Some(settings) = body.get("settings").filter(|s| s.is_object()) {
        event_value["settings"] = settings.clone();
    }
    if let (Some(data), Some(template)) = (data, &template) {
        let map = event_value.as_object_mut().expect("event body is an object");
        merge_template_fields(template, data, map)?;
    }

    // Slug selection and append are a single critical section; concurrent
    // creators of the same name serialize here and see each other's slugs.
    let guard = state
        .locks
        .acquire(
            EVENT_WRITE_LOCK,
            Duration::from_secs(state.config.event_lock_wait_secs),
        )
        .await
        .ok_or_else(|| ApiError::internal("event write lock acquisition timed out"))?;

    let rows = state.store.read_all(&tenant.store_id, Sheet::Events).await?;
    let taken: HashSet<String> = rows
        .iter()
        .filter(|row| cell_str(row, events_cols::TENANT_ID) == tenant.id)
        .map(|row| cell_str(row, events_cols::SLUG).to_string())
        .collect();
    let slug = unique_slug(slug_base, &taken);
    event_value["slug"] = json!(slug.clone());

    let event: Event = serde_json::from_value(event_value)
        .map_err(|err| ApiError::contract(format!("composed event failed contract: {err}")))?;
    let stored = event.to_stored_json()?;
    state
        .store
        .append(
            &tenant.store_id,
            Sheet::Events,
            vec![
                json!(event.id.clone()),
                json!(tenant.id),
                json!(event.template_id.clone()),
                json!(stored),
                json!(now_iso()),
                json!(slug),
            ],
        )
        .await?;
    drop(guard);

    hydrated_event_value(state, tenant, event, true).await
}

/// `get`: hydrate one event with links, QR codes and expanded sponsors.
pub async fn get_event(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<(Value, String)> {
    let (_, row) = find_event_row(state, tenant, event_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let event = parse_stored_event(cell_str(&row, events_cols::DATA_JSON))?;
    hydrated_event_value(state, tenant, event, true).await
}

/// `list`: tenant-filtered page of events, hydrated without sponsor
/// expansion or QR rendering.
pub async fn list_events(
    state: &AppState,
    tenant: &Tenant,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<(Value, String)> {
    let limit = match limit {
        None => LIST_LIMIT_DEFAULT,
        Some(l) if l >= 1 => (l as usize).min(LIST_LIMIT_MAX),
        Some(_) => return Err(ApiError::bad_input("Invalid limit")),
    };
    let offset = match offset {
        None => 0,
        Some(o) if o >= 0 => o as usize,
        Some(_) => return Err(ApiError::bad_input("Invalid offset")),
    };

    let rows = state.store.read_all(&tenant.store_id, Sheet::Events).await?;
    let owned: Vec<&Row> = rows
        .iter()
        .filter(|row| cell_str(row, events_cols::TENANT_ID) == tenant.id)
        .collect();
    let total = owned.len();

    let mut items = Vec::new();
    for row in owned.into_iter().skip(offset).take(limit) {
        let mut event = parse_stored_event(cell_str(row, events_cols::DATA_JSON))?;
        event.derive_links(&LinkContext {
            base_url: &state.config.base_url,
            tenant_id: &tenant.id,
        });
        items.push(serde_json::to_value(&event).map_err(|err| ApiError::internal(err.to_string()))?);
    }

    let value = json!({
        "items": items,
        "pagination": {
            "total": total,
            "limit": limit,
            "offset": offset,
            "hasMore": offset + items.len() < total,
        },
    });
    let etag = compute_etag(&value);
    Ok((value, etag))
}

/// `update`: merge template-declared fields into the stored body under the
/// write lock, then return the fresh `get` view.
pub async fn update_event(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
    body: &Value,
) -> ApiResult<(Value, String)> {
    let data = body
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| ApiError::bad_input("Missing data"))?;

    let guard = state
        .locks
        .acquire(
            EVENT_WRITE_LOCK,
            Duration::from_secs(state.config.event_lock_wait_secs),
        )
        .await
        .ok_or_else(|| ApiError::internal("event write lock acquisition timed out"))?;

    let (row_index, row) = find_event_row(state, tenant, event_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let template = template_for(state, cell_str(&row, events_cols::TEMPLATE_ID))?;

    let mut stored: Value = serde_json::from_str(cell_str(&row, events_cols::DATA_JSON))
        .map_err(|err| ApiError::internal(format!("corrupt event row: {err}")))?;
    apply_legacy_aliases(&mut stored);
    let map = stored
        .as_object_mut()
        .ok_or_else(|| ApiError::internal("corrupt event row: not an object"))?;

    merge_template_fields(&template, data, map)?;
    map.insert("updatedAtISO".to_string(), json!(now_iso()));

    // Round-trip through the contract type so a bad merge can never persist.
    let event: Event = serde_json::from_value(stored.clone())
        .map_err(|err| ApiError::contract(format!("updated event failed contract: {err}")))?;
    state
        .store
        .update_cell(
            &tenant.store_id,
            Sheet::Events,
            row_index,
            events_cols::DATA_JSON,
            json!(event.to_stored_json()?),
        )
        .await?;
    drop(guard);

    get_event(state, tenant, event_id).await
}

/// Merge `externalData` keys into a stored event outside the template-field
/// path. Used by the form integration to record created form URLs.
pub async fn merge_external_data(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
    updates: Map<String, Value>,
) -> ApiResult<()> {
    let guard = state
        .locks
        .acquire(
            EVENT_WRITE_LOCK,
            Duration::from_secs(state.config.event_lock_wait_secs),
        )
        .await
        .ok_or_else(|| ApiError::internal("event write lock acquisition timed out"))?;

    let (row_index, row) = find_event_row(state, tenant, event_id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let mut stored: Value = serde_json::from_str(cell_str(&row, events_cols::DATA_JSON))
        .map_err(|err| ApiError::internal(format!("corrupt event row: {err}")))?;
    let external = stored
        .as_object_mut()
        .ok_or_else(|| ApiError::internal("corrupt event row: not an object"))?
        .entry("externalData")
        .or_insert_with(|| json!({}));
    if let Some(target) = external.as_object_mut() {
        for (key, value) in updates {
            target.insert(key, value);
        }
    }
    stored["updatedAtISO"] = json!(now_iso());
    state
        .store
        .update_cell(
            &tenant.store_id,
            Sheet::Events,
            row_index,
            events_cols::DATA_JSON,
            json!(stored.to_string()),
        )
        .await?;
    drop(guard);
    Ok(())
}

/// Expand sponsor id references on an event into full sponsor objects from
/// the tenant's Sponsors sheet. Unknown ids collapse to `{id}` stubs.
pub async fn hydrate_sponsor_ids(state: &AppState, tenant: &Tenant, event: &mut Event) -> ApiResult<()> {
    let Some(Value::Array(entries)) = event.sponsors.clone() else {
        return Ok(());
    };
    if entries.iter().all(|e| e.is_object()) {
        return Ok(());
    }
    let rows = state.store.read_all(&tenant.store_id, Sheet::Sponsors).await?;
    let expanded: Vec<Value> = entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(id) => rows
                .iter()
                .find(|row| cell_str(row, sponsors_cols::ID) == id)
                .map(sponsor_row_value)
                .unwrap_or_else(|| json!({ "id": id })),
            other => other,
        })
        .collect();
    event.sponsors = Some(Value::Array(expanded));
    Ok(())
}

pub fn sponsor_row_value(row: &Row) -> Value {
    json!({
        "id": cell_str(row, sponsors_cols::ID),
        "name": cell_str(row, sponsors_cols::NAME),
        "logoUrl": cell_str(row, sponsors_cols::LOGO_URL),
        "linkUrl": cell_str(row, sponsors_cols::LINK_URL),
        "tier": cell_str(row, sponsors_cols::TIER),
    })
}

/// Finish an event for the wire: derive links, render QR codes, optionally
/// expand sponsors, and compute the ETag.
async fn hydrated_event_value(
    state: &AppState,
    tenant: &Tenant,
    mut event: Event,
    expand_sponsors: bool,
) -> ApiResult<(Value, String)> {
    event.derive_links(&LinkContext {
        base_url: &state.config.base_url,
        tenant_id: &tenant.id,
    });
    event.qr.public = state.qr.render(&event.links.public_url).await;
    event.qr.signup = state.qr.render(&event.links.signup_url).await;
    if expand_sponsors {
        hydrate_sponsor_ids(state, tenant, &mut event).await?;
    }
    let value = serde_json::to_value(&event).map_err(|err| ApiError::internal(err.to_string()))?;
    let etag = compute_etag(&value);
    Ok((value, etag))
}

fn resolve_template_id(state: &AppState, body: &Value) -> ApiResult<String> {
    let snapshot = state.registry.current();
    match body.get("templateId").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        Some(id) => {
            if snapshot.template(id).is_none() {
                return Err(ApiError::bad_input("Unknown template"));
            }
            Ok(id.to_string())
        }
        None => Ok(if snapshot.template("event").is_some() {
            "event".to_string()
        } else {
            "custom".to_string()
        }),
    }
}

fn template_for(state: &AppState, template_id: &str) -> ApiResult<Template> {
    state
        .registry
        .current()
        .template(template_id)
        .cloned()
        .ok_or_else(|| ApiError::bad_input("Unknown template"))
}

/// Apply submitted `data` fields, accepting only template-declared keys and
/// enforcing per-type validation.
fn merge_template_fields(
    template: &Template,
    data: &Map<String, Value>,
    target: &mut Map<String, Value>,
) -> ApiResult<()> {
    for (key, value) in data {
        let field = template
            .field(key)
            .ok_or_else(|| ApiError::bad_input(format!("Unknown field: {key}")))?;
        let cleaned = match field.field_type {
            FieldType::Url => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| ApiError::bad_input(format!("Invalid URL for field: {key}")))?;
                if raw.is_empty() {
                    Value::String(String::new())
                } else if is_url(raw) {
                    Value::String(raw.to_string())
                } else {
                    return Err(ApiError::bad_input(format!("Invalid URL for field: {key}")));
                }
            }
            FieldType::String => sanitize_string_field(key, value, NAME_MAX)?,
            FieldType::Text => sanitize_string_field(key, value, TEXT_MAX)?,
            FieldType::Number => {
                if !value.is_number() {
                    return Err(ApiError::bad_input(format!("Invalid number for field: {key}")));
                }
                value.clone()
            }
            FieldType::Boolean => {
                if !value.is_boolean() {
                    return Err(ApiError::bad_input(format!("Invalid boolean for field: {key}")));
                }
                value.clone()
            }
            FieldType::Json => {
                if !(value.is_object() || value.is_array()) {
                    return Err(ApiError::bad_input(format!("Invalid value for field: {key}")));
                }
                value.clone()
            }
        };
        if key == "startDateISO" {
            let date = cleaned.as_str().unwrap_or_default();
            if !is_start_date(date) {
                return Err(ApiError::bad_input("Missing or invalid startDateISO"));
            }
        }
        if key == "name" && cleaned.as_str().is_some_and(str::is_empty) {
            return Err(ApiError::bad_input("Missing or invalid name"));
        }
        target.insert(key.clone(), cleaned);
    }
    Ok(())
}

fn sanitize_string_field(key: &str, value: &Value, max: usize) -> ApiResult<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| ApiError::bad_input(format!("Invalid value for field: {key}")))?;
    Ok(Value::String(sanitize_text(raw, max)))
}

fn sanitize_ctas(value: &Value) -> ApiResult<Value> {
    let primary = value.get("primary").unwrap_or(&Value::Null);
    let cta = |v: &Value| -> ApiResult<Value> {
        let label = sanitize_text(v.get("label").and_then(Value::as_str).unwrap_or_default(), 100);
        let url = v.get("url").and_then(Value::as_str).unwrap_or_default();
        if !url.is_empty() && !is_url(url) {
            return Err(ApiError::bad_input("Invalid CTA url"));
        }
        Ok(json!({ "label": label, "url": url }))
    };
    let mut out = json!({ "primary": cta(primary)? });
    if let Some(secondary) = value.get("secondary").filter(|v| v.is_object()) {
        out["secondary"] = cta(secondary)?;
    }
    Ok(out)
}

fn unique_slug(base: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&base) {
        return base;
    }
    for k in 2u32.. {
        let suffix = format!("-{k}");
        let mut candidate = base.clone();
        candidate.truncate(50usize.saturating_sub(suffix.len()));
        let candidate = format!("{}{}", candidate.trim_end_matches('-'), suffix);
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!("slug space exhausted")
}

fn is_idem_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
