//! Transport contract towards the analysis backend

pub mod http;

pub use http::HttpDataService;

use crate::artifact::{CoClusterRequest, StatisticsKey};
use crate::error::{LoadError, LoadResult};
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Status and body of a backend response, kept verbatim for error reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    pub status: u16,
    pub data: serde_json::Value,
}

impl RawResponse {
    pub fn new(status: u16, data: serde_json::Value) -> Self {
        Self { status, data }
    }

    pub fn ok(data: serde_json::Value) -> Self {
        Self::new(200, data)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body regardless of status
    pub fn decode<T: DeserializeOwned>(self, resource: &str) -> LoadResult<T> {
        serde_json::from_value(self.data).map_err(|e| LoadError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }

    /// Decode a successful body, or surface the response as a backend error
    pub fn into_data<T: DeserializeOwned>(self, resource: &str) -> LoadResult<T> {
        if !self.is_success() {
            tracing::warn!(
                resource = %resource,
                status = self.status,
                "Backend request failed"
            );
            return Err(LoadError::Backend {
                resource: resource.to_string(),
                response: self,
            });
        }
        self.decode(resource)
    }
}

/// Body of the model listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    pub models: Vec<String>,
}

/// Operations the backend exposes
///
/// Non-success statuses are returned as a normal `RawResponse`; `Err` is
/// reserved for failures where no response was obtained at all.
#[async_trait]
pub trait DataService: Send + Sync {
    /// List the names of all models the backend can analyse
    async fn get_models(&self) -> Result<RawResponse>;

    async fn get_model_config(&self, model: &str) -> Result<RawResponse>;

    async fn get_co_cluster(&self, request: &CoClusterRequest) -> Result<RawResponse>;

    async fn get_statistics(&self, key: &StatisticsKey) -> Result<RawResponse>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================
