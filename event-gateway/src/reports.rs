//! On-demand aggregation of analytics rows into event reports, sponsor
//! analytics and ROI estimates. Group-bys are commutative, so append order
//! never changes a report.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use common_store::sheet::analytics_cols;
use common_store::{cell_f64, cell_str, Row, Sheet};
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::envelope::{ApiError, ApiResult};
use crate::events;
use crate::registry::Tenant;

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    impressions: f64,
    clicks: f64,
    dwell_sec: f64,
}

impl Tally {
    fn absorb(&mut self, metric: &str, value: f64) {
        match metric {
            "impression" | "view" => self.impressions += value,
            "click" | "external_click" => self.clicks += value,
            "dwellSec" => self.dwell_sec += value,
            _ => {}
        }
    }

    fn ctr(&self) -> f64 {
        ratio4(self.clicks, self.impressions)
    }

    fn to_value(self) -> Value {
        json!({
            "impressions": self.impressions,
            "clicks": self.clicks,
            "dwellSec": self.dwell_sec,
            "ctr": self.ctr(),
        })
    }
}

/// CTR guard: zero impressions means zero, never a division.
pub fn ratio4(clicks: f64, impressions: f64) -> f64 {
    if impressions <= 0.0 {
        0.0
    } else {
        round4(clicks / impressions)
    }
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}

/// Sponsor engagement: `0.6 × CTR + 0.4 × min(dwellPerImp / 5, 1)`, scaled to
/// a 0..=100 score.
pub fn engagement_score(impressions: f64, clicks: f64, dwell_sec: f64) -> f64 {
    if impressions <= 0.0 {
        return 0.0;
    }
    let ctr = clicks / impressions;
    let dwell_per_imp = dwell_sec / impressions;
    let score = (0.6 * ctr + 0.4 * (dwell_per_imp / 5.0).min(1.0)) * 100.0;
    round4(score.clamp(0.0, 100.0))
}

/// `getReport`: totals plus by-surface/by-sponsor/by-token groupings for one
/// event. Cross-tenant probes fail with the same `NOT_FOUND` as missing rows.
pub async fn get_report(state: &AppState, tenant: &Tenant, event_id: &str) -> ApiResult<Value> {
    // Resolves the row under this tenant only; a foreign id is indistinguishable
    // from a missing one.
    events::find_event_row(state, tenant, event_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let rows = state.store.read_all(&tenant.store_id, Sheet::Analytics).await?;
    let mut totals = Tally::default();
    let mut by_surface: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_sponsor: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_token: BTreeMap<String, Tally> = BTreeMap::new();

    for row in rows.iter().filter(|r| row_event_id(r) == event_id) {
        let metric = cell_str(row, analytics_cols::METRIC);
        let value = cell_f64(row, analytics_cols::VALUE);
        totals.absorb(metric, value);

        let surface = non_empty(cell_str(row, analytics_cols::SURFACE));
        let sponsor = non_empty(cell_str(row, analytics_cols::SPONSOR_ID));
        let token = non_empty(cell_str(row, analytics_cols::TOKEN));
        by_surface.entry(surface).or_default().absorb(metric, value);
        by_sponsor.entry(sponsor).or_default().absorb(metric, value);
        by_token.entry(token).or_default().absorb(metric, value);
    }

    Ok(json!({
        "eventId": event_id,
        "totals": {
            "impressions": totals.impressions,
            "clicks": totals.clicks,
            "dwellSec": totals.dwell_sec,
        },
        "bySurface": tally_map(by_surface),
        "bySponsor": tally_map(by_sponsor),
        "byToken": tally_map(by_token),
        "generatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// `getSponsorAnalytics`: one sponsor's aggregate across every event of the
/// tenant, optionally bounded to an inclusive date range.
pub async fn get_sponsor_analytics(
    state: &AppState,
    tenant: &Tenant,
    body: &Value,
) -> ApiResult<Value> {
    let sponsor_id = body
        .get("sponsorId")
        .and_then(Value::as_str)
        .filter(|s| common_security::validate_id(s))
        .ok_or_else(|| ApiError::bad_input("Missing or invalid sponsorId"))?;
    let date_from = body.get("dateFrom").and_then(Value::as_str);
    let date_to = body.get("dateTo").and_then(Value::as_str);

    let rows = state.store.read_all(&tenant.store_id, Sheet::Analytics).await?;
    let mut total = Tally::default();
    let mut by_surface: BTreeMap<String, Tally> = BTreeMap::new();
    for row in rows.iter() {
        if cell_str(row, analytics_cols::SPONSOR_ID) != sponsor_id {
            continue;
        }
        if !within_range(cell_str(row, analytics_cols::TIMESTAMP), date_from, date_to) {
            continue;
        }
        let metric = cell_str(row, analytics_cols::METRIC);
        let value = cell_f64(row, analytics_cols::VALUE);
        total.absorb(metric, value);
        by_surface
            .entry(non_empty(cell_str(row, analytics_cols::SURFACE)))
            .or_default()
            .absorb(metric, value);
    }

    Ok(json!({
        "sponsorId": sponsor_id,
        "impressions": total.impressions,
        "clicks": total.clicks,
        "dwellSec": total.dwell_sec,
        "ctr": total.ctr(),
        "engagementScore": engagement_score(total.impressions, total.clicks, total.dwell_sec),
        "bySurface": tally_map(by_surface),
        "period": { "from": date_from, "to": date_to },
    }))
}

/// `getSponsorROI`: sponsor aggregate fed through the pure ROI calculator.
pub async fn get_sponsor_roi(state: &AppState, tenant: &Tenant, body: &Value) -> ApiResult<Value> {
    let analytics = get_sponsor_analytics(state, tenant, body).await?;
    let impressions = analytics["impressions"].as_f64().unwrap_or(0.0);
    let clicks = analytics["clicks"].as_f64().unwrap_or(0.0);
    let dwell = analytics["dwellSec"].as_f64().unwrap_or(0.0);
    let params = RoiParams::from_body(body);
    Ok(compute_roi(impressions, clicks, dwell, &params, &analytics["period"]))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RoiParams {
    pub sponsorship_cost: f64,
    pub cost_per_click: f64,
    pub conversion_rate: f64,
    pub avg_transaction_value: f64,
}

impl RoiParams {
    pub fn from_body(body: &Value) -> Self {
        let num = |key: &str| body.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        Self {
            sponsorship_cost: num("sponsorshipCost"),
            cost_per_click: num("costPerClick"),
            conversion_rate: num("conversionRate"),
            avg_transaction_value: num("avgTransactionValue"),
        }
    }
}

/// Pure ROI calculator. Undefined quantities stay 0 instead of NaN.
pub fn compute_roi(
    impressions: f64,
    clicks: f64,
    dwell_sec: f64,
    params: &RoiParams,
    period: &Value,
) -> Value {
    let total_cost = params.sponsorship_cost + params.cost_per_click * clicks;
    let cpm = if impressions > 0.0 {
        round4(total_cost / impressions * 1000.0)
    } else {
        0.0
    };
    let cost_per_click = if clicks > 0.0 {
        round4(total_cost / clicks)
    } else {
        0.0
    };
    let estimated_conversions = round4(clicks * params.conversion_rate);
    let estimated_revenue = round4(estimated_conversions * params.avg_transaction_value);
    let roi = if total_cost > 0.0 {
        round4((estimated_revenue - total_cost) / total_cost * 100.0)
    } else {
        0.0
    };

    let ctr = ratio4(clicks, impressions);
    let mut insights = Vec::new();
    if total_cost == 0.0 {
        insights.push("No cost inputs provided; financials are informational only.".to_string());
    } else if roi > 0.0 {
        insights.push(format!("Positive return: estimated ROI of {roi}%."));
    } else {
        insights.push(format!("Estimated ROI is {roi}%; revenue does not yet cover cost."));
    }
    if impressions > 0.0 && ctr < 0.01 {
        insights.push("Click-through rate is below 1%; consider stronger placement.".to_string());
    }
    if impressions == 0.0 {
        insights.push("No impressions recorded in the selected period.".to_string());
    }

    json!({
        "period": period,
        "metrics": {
            "impressions": impressions,
            "clicks": clicks,
            "dwellSec": dwell_sec,
            "ctr": ctr,
            "engagementScore": engagement_score(impressions, clicks, dwell_sec),
        },
        "financials": {
            "totalCost": round4(total_cost),
            "costPerClick": cost_per_click,
            "cpm": cpm,
            "estimatedConversions": estimated_conversions,
            "estimatedRevenue": estimated_revenue,
            "roi": roi,
        },
        "insights": insights,
    })
}

fn row_event_id(row: &Row) -> &str {
    cell_str(row, analytics_cols::EVENT_ID)
}

fn non_empty(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Inclusive date-prefix comparison over RFC 3339 timestamps.
fn within_range(ts: &str, from: Option<&str>, to: Option<&str>) -> bool {
    let date = &ts[..ts.len().min(10)];
    if let Some(from) = from {
        if date < from {
            return false;
        }
    }
    if let Some(to) = to {
        if date > to {
            return false;
        }
    }
    true
}

fn tally_map(map: BTreeMap<String, Tally>) -> Value {
    let mut out = Map::new();
    for (key, tally) in map {
        out.insert(key, tally.to_value());
    }
    Value::Object(out)
}
