//! HTTP transport using reqwest

use super::{DataService, RawResponse};
use crate::artifact::{CoClusterRequest, StatisticsKey};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Backend client speaking the analysis server's JSON API
#[derive(Debug, Clone)]
pub struct HttpDataService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDataService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, path);

        tracing::trace!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        // Error pages are often plain text; keep them as a JSON string
        let data = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));

        Ok(RawResponse::new(status, data))
    }
}

#[async_trait]
impl DataService for HttpDataService {
    async fn get_models(&self) -> Result<RawResponse> {
        self.get("/models", &[]).await
    }

    async fn get_model_config(&self, model: &str) -> Result<RawResponse> {
        let path = format!("/models/config/{}", urlencoding::encode(model));
        self.get(&path, &[]).await
    }

    async fn get_co_cluster(&self, request: &CoClusterRequest) -> Result<RawResponse> {
        self.get(
            "/co_cluster",
            &[
                ("model", request.model.clone()),
                ("state", request.state.clone()),
                ("n_cluster", request.n_cluster.to_string()),
                ("top_k", request.params.top_k.to_string()),
                ("mode", request.params.mode.to_string()),
            ],
        )
        .await
    }

    async fn get_statistics(&self, key: &StatisticsKey) -> Result<RawResponse> {
        self.get(
            "/state_statistics",
            &[
                ("model", key.model.clone()),
                ("state", key.state.clone()),
                ("layer", key.layer.to_string()),
                ("top_k", key.top_k.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let service =
            HttpDataService::new("http://localhost:5000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(service.base_url(), "http://localhost:5000/api");
    }
}
