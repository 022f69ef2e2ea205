//! Surface bundles: read-only composites of one event plus what that surface
//! needs. All bundle values are ETagged by the router and honor
//! `ifNoneMatch` through the shared envelope helpers.

use chrono::NaiveDate;
use common_store::sheet::{analytics_cols, shortlinks_cols};
use common_store::{cell_f64, cell_str, Sheet};
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::contract::{compute_etag, parse_stored_event, thin_event, Event, LinkContext};
use crate::envelope::ApiResult;
use crate::events;
use crate::registry::Tenant;
use crate::reports::ratio4;

/// Public page bundle: the hydrated event plus brand chrome.
pub async fn public_bundle(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<(Value, String)> {
    let (event, _) = events::get_event(state, tenant, event_id).await?;
    let snapshot = state.registry.current();
    let value = json!({
        "event": event,
        "config": {
            "appTitle": snapshot.app_title,
            "brandId": tenant.id,
            "brandName": tenant.name,
        },
    });
    let etag = compute_etag(&value);
    Ok((value, etag))
}

/// Display (venue screen) bundle: rotation and layout derived from the
/// global display defaults merged with the event template's override.
pub async fn display_bundle(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<(Value, String)> {
    let (event, _) = events::get_event(state, tenant, event_id).await?;
    let template_id = event
        .get("templateId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let snapshot = state.registry.current();
    let display = snapshot
        .display
        .merged(snapshot.display_overrides.get(template_id));
    let value = json!({
        "event": event,
        "rotation": {
            "sponsorSlots": display.sponsor_slots,
            "rotationMs": display.rotation_ms,
        },
        "layout": {
            "hasSidePane": display.has_side_pane,
            "emphasis": display.emphasis.as_str(),
        },
    });
    let etag = compute_etag(&value);
    Ok((value, etag))
}

/// Poster bundle: external QR image URLs (the print pipeline fetches them
/// itself) and pre-formatted print lines.
pub async fn poster_bundle(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<(Value, String)> {
    let (event, _) = events::get_event(state, tenant, event_id).await?;
    let links = event.get("links").cloned().unwrap_or_default();
    let qr_image = |target: &Value| -> String {
        let url = target.as_str().unwrap_or_default();
        if url.is_empty() {
            String::new()
        } else {
            format!(
                "{}?size=600&text={}",
                state.config.qr_endpoint,
                urlencoding::encode(url)
            )
        }
    };
    let date_line = event
        .get("startDateISO")
        .and_then(Value::as_str)
        .map(format_date_line)
        .unwrap_or_default();
    let venue_line = event
        .get("venue")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let value = json!({
        "event": event,
        "qrCodes": {
            "public": qr_image(&links["publicUrl"]),
            "signup": qr_image(&links["signupUrl"]),
        },
        "print": {
            "dateLine": date_line,
            "venueLine": venue_line,
        },
    });
    let etag = compute_etag(&value);
    Ok((value, etag))
}

/// Sponsor bundle: thin event plus per-sponsor performance aggregated from
/// this event's analytics rows.
pub async fn sponsor_bundle(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<(Value, String)> {
    let event = load_event(state, tenant, event_id).await?;
    let mut sponsors = sponsor_entries(state, tenant, &event).await?;
    let stats = per_sponsor_stats(state, tenant, event_id).await?;
    for sponsor in sponsors.iter_mut().filter(|s| s.is_object()) {
        let id = sponsor.get("id").and_then(Value::as_str).unwrap_or_default();
        let (impressions, clicks) = stats.get(id).copied().unwrap_or((0.0, 0.0));
        sponsor["impressions"] = json!(impressions);
        sponsor["clicks"] = json!(clicks);
        sponsor["ctr"] = json!(ratio4(clicks, impressions));
    }
    let value = json!({
        "event": thin_event(&event, &tenant.id),
        "sponsors": sponsors,
    });
    let etag = compute_etag(&value);
    Ok((value, etag))
}

/// Shared-report bundle: thin event plus the headline metrics a sponsor or
/// venue partner sees without admin access.
pub async fn shared_report_bundle(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<(Value, String)> {
    let event = load_event(state, tenant, event_id).await?;
    let rows = state.store.read_all(&tenant.store_id, Sheet::Analytics).await?;

    let mut views = 0.0;
    let mut sessions: Vec<String> = Vec::new();
    let mut signup_clicks = 0.0;
    let mut checkin_clicks = 0.0;
    let mut feedback_clicks = 0.0;
    let mut sponsor_impressions = 0.0;
    let mut sponsor_clicks = 0.0;
    let mut league_clicks = Map::new();
    let mut broadcast_clicks = Map::new();
    for key in ["schedule", "standings", "bracket"] {
        league_clicks.insert(key.to_string(), json!(0.0));
    }
    for key in ["stats", "scoreboard", "stream"] {
        broadcast_clicks.insert(key.to_string(), json!(0.0));
    }

    for row in rows
        .iter()
        .filter(|r| cell_str(r, analytics_cols::EVENT_ID) == event_id)
    {
        let metric = cell_str(row, analytics_cols::METRIC);
        let sponsor = cell_str(row, analytics_cols::SPONSOR_ID);
        let value = cell_f64(row, analytics_cols::VALUE);
        match metric {
            "view" | "impression" if sponsor.is_empty() => {
                views += value;
                let session = cell_str(row, analytics_cols::SESSION_ID);
                if !session.is_empty() {
                    sessions.push(session.to_string());
                }
            }
            "impression" => sponsor_impressions += value,
            "click" => match sponsor {
                "signup" => signup_clicks += value,
                "checkin" => checkin_clicks += value,
                "feedback" => feedback_clicks += value,
                _ => sponsor_clicks += value,
            },
            "external_click" => {
                let bucket = if ["schedule", "standings", "bracket"].contains(&sponsor) {
                    Some(&mut league_clicks)
                } else if ["stats", "scoreboard", "stream"].contains(&sponsor) {
                    Some(&mut broadcast_clicks)
                } else {
                    None
                };
                if let Some(bucket) = bucket {
                    let current = bucket.get(sponsor).and_then(Value::as_f64).unwrap_or(0.0);
                    bucket.insert(sponsor.to_string(), json!(current + value));
                }
            }
            _ => {}
        }
    }
    sessions.sort_unstable();
    sessions.dedup();

    let value = json!({
        "event": thin_event(&event, &tenant.id),
        "metrics": {
            "views": views,
            "uniqueViews": sessions.len(),
            "signupClicks": signup_clicks,
            "checkinClicks": checkin_clicks,
            "feedbackClicks": feedback_clicks,
            "sponsors": {
                "impressions": sponsor_impressions,
                "clicks": sponsor_clicks,
                "avgCtr": ratio4(sponsor_clicks, sponsor_impressions),
            },
            "leagueClicks": league_clicks,
            "broadcastClicks": broadcast_clicks,
        },
    });
    let etag = compute_etag(&value);
    Ok((value, etag))
}

/// Admin bundle (requires auth upstream): the full event plus brand config,
/// allowed templates, content diagnostics and the sponsor roster. `advanced`
/// switches the admin UI between wizard and full modes.
pub async fn admin_bundle(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
    advanced: bool,
) -> ApiResult<(Value, String)> {
    let (event, _) = events::get_event(state, tenant, event_id).await?;
    let snapshot = state.registry.current();
    let templates: Vec<Value> = snapshot
        .templates
        .iter()
        .map(|t| serde_json::to_value(t).unwrap_or(Value::Null))
        .collect();

    let has_form = event
        .get("externalData")
        .and_then(|d| d.get("formUrl"))
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    let root_store = snapshot.root().map(|t| t.store_id.clone());
    let has_shortlinks = match root_store {
        Some(store_id) => state
            .store
            .read_all(&store_id, Sheet::Shortlinks)
            .await?
            .iter()
            .any(|row| cell_str(row, shortlinks_cols::EVENT_ID) == event_id),
        None => false,
    };
    let last_published = event
        .get("updatedAtISO")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let sponsor_rows = state.store.read_all(&tenant.store_id, Sheet::Sponsors).await?;
    let all_sponsors: Vec<Value> = sponsor_rows
        .iter()
        .filter(|row| cell_str(row, common_store::sheet::sponsors_cols::TENANT_ID) == tenant.id)
        .map(events::sponsor_row_value)
        .collect();

    let value = json!({
        "event": event,
        "mode": if advanced { "advanced" } else { "wizard" },
        "brandConfig": {
            "id": tenant.id,
            "name": tenant.name,
            "hostnames": tenant.hostnames,
            "scopesAllowed": tenant.scopes_allowed,
        },
        "templates": templates,
        "diagnostics": {
            "hasForm": has_form,
            "hasShortlinks": has_shortlinks,
            "lastPublishedAt": last_published,
        },
        "allSponsors": all_sponsors,
    });
    let etag = compute_etag(&value);
    Ok((value, etag))
}

async fn load_event(state: &AppState, tenant: &Tenant, event_id: &str) -> ApiResult<Event> {
    use common_store::sheet::events_cols;
    let (_, row) = events::find_event_row(state, tenant, event_id)
        .await?
        .ok_or_else(crate::envelope::ApiError::not_found)?;
    let mut event = parse_stored_event(cell_str(&row, events_cols::DATA_JSON))?;
    event.derive_links(&LinkContext {
        base_url: &state.config.base_url,
        tenant_id: &tenant.id,
    });
    Ok(event)
}

/// Sponsor entries attached to the event, expanded from the roster.
async fn sponsor_entries(
    state: &AppState,
    tenant: &Tenant,
    event: &Event,
) -> ApiResult<Vec<Value>> {
    let mut event = event.clone();
    events::hydrate_sponsor_ids(state, tenant, &mut event).await?;
    Ok(event
        .sponsors
        .and_then(|s| s.as_array().cloned())
        .unwrap_or_default())
}

/// `(impressions, clicks)` per sponsor id for one event.
async fn per_sponsor_stats(
    state: &AppState,
    tenant: &Tenant,
    event_id: &str,
) -> ApiResult<std::collections::HashMap<String, (f64, f64)>> {
    let rows = state.store.read_all(&tenant.store_id, Sheet::Analytics).await?;
    let mut stats: std::collections::HashMap<String, (f64, f64)> = std::collections::HashMap::new();
    for row in rows
        .iter()
        .filter(|r| cell_str(r, analytics_cols::EVENT_ID) == event_id)
    {
        let sponsor = cell_str(row, analytics_cols::SPONSOR_ID);
        if sponsor.is_empty() {
            continue;
        }
        let entry = stats.entry(sponsor.to_string()).or_default();
        let value = cell_f64(row, analytics_cols::VALUE);
        match cell_str(row, analytics_cols::METRIC) {
            "impression" => entry.0 += value,
            "click" => entry.1 += value,
            _ => {}
        }
    }
    Ok(stats)
}

/// "Saturday, August 15, 2025" from a `YYYY-MM-DD` date.
fn format_date_line(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%A, %B %-d, %Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_line_formats_human_readable() {
        assert_eq!(format_date_line("2025-08-15"), "Friday, August 15, 2025");
        // Unparseable dates pass through untouched.
        assert_eq!(format_date_line("soon"), "soon");
    }
}
