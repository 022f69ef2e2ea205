//! Seams to external collaborators: QR rendering and form creation.
//!
//! QR failures are absorbed into empty data URIs so a slow or dead renderer
//! can never fail a read path. Rendered images are cached by URL hash, since
//! event links are stable and the upstream fetch is the expensive part.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use common_cache::Cache;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

#[async_trait]
pub trait QrRenderer: Send + Sync {
    /// Render `url` as a PNG data URI. Returns an empty string on failure.
    async fn render(&self, url: &str) -> String;
}

/// Fetches QR PNGs from an external chart endpoint with a hard deadline.
pub struct HttpQrRenderer {
    client: reqwest::Client,
    endpoint: String,
    cache: Arc<dyn Cache>,
}

const QR_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

impl HttpQrRenderer {
    pub fn new(endpoint: String, timeout: Duration, cache: Arc<dyn Cache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            cache,
        }
    }

    async fn fetch(&self, url: &str) -> Option<String> {
        let request_url = format!(
            "{}?size=180&text={}",
            self.endpoint,
            urlencoding::encode(url)
        );
        let response = self.client.get(&request_url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let bytes = response.bytes().await.ok()?;
        Some(format!(
            "data:image/png;base64,{}",
            BASE64_STANDARD.encode(&bytes)
        ))
    }
}

#[async_trait]
impl QrRenderer for HttpQrRenderer {
    async fn render(&self, url: &str) -> String {
        if url.is_empty() {
            return String::new();
        }
        let key = format!("qr:{}", hex::encode(Sha256::digest(url.as_bytes())));
        if let Some(cached) = self.cache.get(&key).await.and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        }) {
            return cached;
        }
        match self.fetch(url).await {
            Some(data_uri) => {
                self.cache
                    .put(&key, Value::String(data_uri.clone()), QR_CACHE_TTL)
                    .await;
                data_uri
            }
            None => {
                warn!(url, "QR render failed, returning empty data URI");
                String::new()
            }
        }
    }
}

/// Renderer that always yields empty data URIs. Used in tests and when no
/// endpoint is configured.
pub struct NullQrRenderer;

#[async_trait]
impl QrRenderer for NullQrRenderer {
    async fn render(&self, _url: &str) -> String {
        String::new()
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form provider not configured")]
    Unconfigured,
    #[error("form provider failure: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInfo {
    pub form_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_url: Option<String>,
}

#[async_trait]
pub trait FormProvider: Send + Sync {
    async fn list_templates(&self) -> Vec<FormTemplate>;

    /// Create a signup form for an event from a form template.
    async fn create_form(
        &self,
        tenant_id: &str,
        event_id: &str,
        template_id: &str,
    ) -> Result<FormInfo, FormError>;
}

/// Default provider when no office-API integration is wired in.
pub struct UnconfiguredFormProvider;

#[async_trait]
impl FormProvider for UnconfiguredFormProvider {
    async fn list_templates(&self) -> Vec<FormTemplate> {
        Vec::new()
    }

    async fn create_form(
        &self,
        _tenant_id: &str,
        _event_id: &str,
        _template_id: &str,
    ) -> Result<FormInfo, FormError> {
        Err(FormError::Unconfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_cache::MemoryCache;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn renders_and_caches_data_uri() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/qr");
            then.status(200).body(b"pngbytes");
        });
        let renderer = HttpQrRenderer::new(
            format!("{}/qr", server.base_url()),
            Duration::from_secs(2),
            Arc::new(MemoryCache::new()),
        );
        let first = renderer.render("https://example.com/e/1").await;
        assert!(first.starts_with("data:image/png;base64,"));
        let second = renderer.render("https://example.com/e/1").await;
        assert_eq!(first, second);
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn failure_yields_empty_string() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/qr");
            then.status(500);
        });
        let renderer = HttpQrRenderer::new(
            format!("{}/qr", server.base_url()),
            Duration::from_secs(2),
            Arc::new(MemoryCache::new()),
        );
        assert_eq!(renderer.render("https://example.com/e/1").await, "");
    }
}
