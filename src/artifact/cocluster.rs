//! Co-clustering of hidden units and words

use super::Artifact;
use crate::error::{LoadError, LoadResult};
use crate::identifier::{ArtifactId, co_cluster_id};
use crate::service::DataService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CLUSTER_COUNT: usize = 10;
pub const DEFAULT_TOP_K: u32 = 300;

/// Which activations the backend clusters on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    #[default]
    Positive,
    Negative,
    Abs,
    Raw,
}

impl ClusterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Abs => "abs",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClusterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "abs" => Ok(Self::Abs),
            "raw" => Ok(Self::Raw),
            other => Err(format!("unknown cluster mode '{}'", other)),
        }
    }
}

/// Backend parameters for a co-clustering run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoClusterParams {
    pub top_k: u32,
    pub mode: ClusterMode,
}

impl Default for CoClusterParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            mode: ClusterMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoClusterRequest {
    pub model: String,
    pub state: String,
    pub n_cluster: usize,
    pub params: CoClusterParams,
}

impl CoClusterRequest {
    /// Request with the default cluster count and parameters
    pub fn new(model: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            state: state.into(),
            n_cluster: DEFAULT_CLUSTER_COUNT,
            params: CoClusterParams::default(),
        }
    }

    pub fn with_clusters(mut self, n_cluster: usize) -> Self {
        self.n_cluster = n_cluster;
        self
    }

    pub fn with_params(mut self, params: CoClusterParams) -> Self {
        self.params = params;
        self
    }

    pub fn identifier(&self) -> ArtifactId {
        co_cluster_id(self)
    }
}

/// Raw co-cluster labels as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoClusterData {
    /// Cluster label per hidden unit
    pub row_labels: Vec<u32>,
    /// Cluster label per word
    pub col_labels: Vec<u32>,
    /// Words in column order
    pub words: Vec<String>,
}

/// Loaded co-clustering result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoCluster {
    pub request: CoClusterRequest,
    pub data: CoClusterData,
}

impl CoCluster {
    /// Hidden unit indices grouped by cluster
    pub fn unit_clusters(&self) -> Vec<Vec<usize>> {
        group_by_label(&self.data.row_labels, self.request.n_cluster)
    }

    /// Words grouped by cluster
    pub fn word_clusters(&self) -> Vec<Vec<&str>> {
        group_by_label(&self.data.col_labels, self.request.n_cluster)
            .into_iter()
            .map(|indices| {
                indices
                    .into_iter()
                    .filter_map(|i| self.data.words.get(i).map(String::as_str))
                    .collect()
            })
            .collect()
    }
}

/// Labels at or above `n_cluster` are dropped
fn group_by_label(labels: &[u32], n_cluster: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); n_cluster];
    let mut stray = 0usize;
    for (index, &label) in labels.iter().enumerate() {
        match groups.get_mut(label as usize) {
            Some(group) => group.push(index),
            None => stray += 1,
        }
    }
    if stray > 0 {
        tracing::warn!(stray, n_cluster, "Ignoring cluster labels outside the requested count");
    }
    groups
}

#[async_trait]
impl Artifact for CoCluster {
    type Request = CoClusterRequest;
    const KIND: &'static str = "co_cluster";

    fn identifier(request: &CoClusterRequest) -> ArtifactId {
        co_cluster_id(request)
    }

    fn model_name(request: &CoClusterRequest) -> &str {
        &request.model
    }

    async fn load(request: &CoClusterRequest, service: &dyn DataService) -> LoadResult<Self> {
        let resource = format!("co-cluster {}", Self::identifier(request));

        tracing::debug!(
            model = %request.model,
            state = %request.state,
            n_cluster = request.n_cluster,
            "Fetching co-cluster"
        );

        let response = service
            .get_co_cluster(request)
            .await
            .map_err(LoadError::transport)?;
        let data: CoClusterData = response.into_data(&resource)?;

        Ok(Self {
            request: request.clone(),
            data,
        })
    }
}
