//! Configuration structures and loading logic

use crate::artifact::{ClusterMode, CoClusterParams, CoClusterRequest, DEFAULT_CLUSTER_COUNT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the visualization backend
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub default_cluster_count: usize,
    pub default_top_k: u32,
    pub default_mode: ClusterMode,
    /// Buffered notifications before senders wait on the relay
    pub relay_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            request_timeout_secs: default_request_timeout(),
            default_cluster_count: DEFAULT_CLUSTER_COUNT,
            default_top_k: default_top_k(),
            default_mode: ClusterMode::default(),
            relay_capacity: default_relay_capacity(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file with environment variable overrides
    ///
    /// Without an explicit path, `<config dir>/rnnvis/client.toml` is read
    /// when it exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| default_config_path().filter(|p| p.exists()));

        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(url) = std::env::var("RNNVIS_BACKEND_URL") {
            config.backend_url = url;
        }
        if let Ok(timeout) = std::env::var("RNNVIS_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout
                .parse()
                .context("Invalid RNNVIS_REQUEST_TIMEOUT_SECS value")?;
        }
        if let Ok(capacity) = std::env::var("RNNVIS_RELAY_CAPACITY") {
            config.relay_capacity = capacity
                .parse()
                .context("Invalid RNNVIS_RELAY_CAPACITY value")?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://"))
        {
            anyhow::bail!(
                "Backend URL must start with http:// or https:// (got '{}')",
                self.backend_url
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }
        if self.default_cluster_count == 0 {
            anyhow::bail!("Default cluster count must be greater than 0");
        }
        if self.default_top_k == 0 {
            anyhow::bail!("Default top_k must be greater than 0");
        }
        if self.relay_capacity == 0 {
            anyhow::bail!("Relay capacity must be greater than 0");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Co-cluster request using the configured defaults
    pub fn co_cluster_request(
        &self,
        model: impl Into<String>,
        state: impl Into<String>,
    ) -> CoClusterRequest {
        CoClusterRequest::new(model, state)
            .with_clusters(self.default_cluster_count)
            .with_params(CoClusterParams {
                top_k: self.default_top_k,
                mode: self.default_mode,
            })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rnnvis").join("client.toml"))
}

// Default functions
fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_top_k() -> u32 {
    crate::artifact::DEFAULT_TOP_K
}
fn default_relay_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.backend_url, "http://localhost:5000");
        assert_eq!(config.default_cluster_count, 10);
        assert_eq!(config.default_top_k, 300);
        assert_eq!(config.default_mode, ClusterMode::Positive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            backend_url = "https://rnnvis.example.org/api"
            default_mode = "abs"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend_url, "https://rnnvis.example.org/api");
        assert_eq!(config.default_mode, ClusterMode::Abs);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.relay_capacity, 64);
    }

    #[test]
    fn test_url_scheme_validation() {
        let config = ClientConfig {
            backend_url: "localhost:5000".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_values_rejected() {
        for config in [
            ClientConfig {
                request_timeout_secs: 0,
                ..Default::default()
            },
            ClientConfig {
                default_cluster_count: 0,
                ..Default::default()
            },
            ClientConfig {
                default_top_k: 0,
                ..Default::default()
            },
            ClientConfig {
                relay_capacity: 0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err(), "accepted {config:?}");
        }
    }

    #[test]
    fn test_co_cluster_request_uses_defaults() {
        let config = ClientConfig {
            default_cluster_count: 6,
            default_top_k: 100,
            default_mode: ClusterMode::Raw,
            ..Default::default()
        };

        let request = config.co_cluster_request("M", "state_c");
        assert_eq!(request.n_cluster, 6);
        assert_eq!(request.params.top_k, 100);
        assert_eq!(request.params.mode, ClusterMode::Raw);
    }
}
