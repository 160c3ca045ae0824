//! Lookup collaborator seam for term enrichment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// External lookup service for one enrichment facet.
///
/// The three lookups are independent network calls; the enricher fans
/// them out in parallel and caches only complete results.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync + 'static {
    async fn translate(&self, token: &str, target_language: &str) -> anyhow::Result<String>;

    async fn pronounce(&self, token: &str, target_language: &str) -> anyhow::Result<String>;

    async fn define(&self, token: &str, target_language: &str) -> anyhow::Result<String>;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    token: &'a str,
    target_language: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    result: String,
}

/// HTTP provider posting to `{base_url}/{translate,pronounce,define}`.
pub struct HttpEnrichmentProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEnrichmentProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn lookup(&self, path: &str, token: &str, target_language: &str) -> anyhow::Result<String> {
        let response: LookupResponse = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(&LookupRequest {
                token,
                target_language,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.result)
    }
}

#[async_trait]
impl EnrichmentProvider for HttpEnrichmentProvider {
    async fn translate(&self, token: &str, target_language: &str) -> anyhow::Result<String> {
        self.lookup("translate", token, target_language).await
    }

    async fn pronounce(&self, token: &str, target_language: &str) -> anyhow::Result<String> {
        self.lookup("pronounce", token, target_language).await
    }

    async fn define(&self, token: &str, target_language: &str) -> anyhow::Result<String> {
        self.lookup("define", token, target_language).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
