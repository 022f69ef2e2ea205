use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    pub rate_limit_rejections: IntCounter,
    pub auth_failures: IntCounter,
    pub csrf_rejections: IntCounter,
    pub analytics_rows_total: IntCounter,
    pub shortlink_redirects_total: IntCounter,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new("gateway_requests_total", "RPC requests grouped by action"),
            &["action"],
        )?;
        let errors_total = IntCounterVec::new(
            Opts::new("gateway_errors_total", "Error envelopes grouped by code"),
            &["code"],
        )?;
        let rate_limit_rejections = IntCounter::new(
            "gateway_rate_limit_rejections_total",
            "Requests rejected by the per-minute window or auth lockout",
        )?;
        let auth_failures = IntCounter::new(
            "gateway_auth_failures_total",
            "Failed credential resolutions",
        )?;
        let csrf_rejections = IntCounter::new(
            "gateway_csrf_rejections_total",
            "State-changing requests with a missing or spent CSRF token",
        )?;
        let analytics_rows_total = IntCounter::new(
            "gateway_analytics_rows_total",
            "Analytics rows appended across all tenants",
        )?;
        let shortlink_redirects_total = IntCounter::new(
            "gateway_shortlink_redirects_total",
            "Shortlink redirect pages served",
        )?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(rate_limit_rejections.clone()))?;
        registry.register(Box::new(auth_failures.clone()))?;
        registry.register(Box::new(csrf_rejections.clone()))?;
        registry.register(Box::new(analytics_rows_total.clone()))?;
        registry.register(Box::new(shortlink_redirects_total.clone()))?;
        Ok(Self {
            registry,
            requests_total,
            errors_total,
            rate_limit_rejections,
            auth_failures,
            csrf_rejections,
            analytics_rows_total,
            shortlink_redirects_total,
        })
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        let mut resp = Response::new(Body::from(buffer));
        *resp.status_mut() = StatusCode::OK;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        );
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_register_and_render() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.requests_total.with_label_values(&["status"]).inc();
        metrics.errors_total.with_label_values(&["BAD_INPUT"]).inc();
        metrics.rate_limit_rejections.inc();
        let resp = metrics.render().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
