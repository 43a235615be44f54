//! Artifacts derived by the analysis backend
//!
//! Provides:
//! - Model configurations and the cell type to state mapping
//! - Co-clustering results over hidden-state activations
//! - Per-layer state statistics
//! - Sentence evaluation records

pub mod cocluster;
pub mod config;
pub mod sentence;
pub mod statistics;

pub use cocluster::{
    ClusterMode, CoCluster, CoClusterData, CoClusterParams, CoClusterRequest, DEFAULT_CLUSTER_COUNT,
    DEFAULT_TOP_K,
};
pub use config::{CELL_STATES, CellSpec, CellType, ModelArchitecture, ModelConfig};
pub use sentence::SentenceRecord;
pub use statistics::{Layer, StateStatistics, StatisticsData, StatisticsKey, StatisticsRequest};

use crate::error::LoadResult;
use crate::identifier::ArtifactId;
use crate::service::DataService;
use async_trait::async_trait;

/// A cacheable result fetched from the backend for a parameterised request
#[async_trait]
pub trait Artifact: Sized + Send + Sync + 'static {
    type Request: Clone + Send + Sync + 'static;

    /// Label used in logs and metrics
    const KIND: &'static str;

    /// Canonical cache key of a request
    fn identifier(request: &Self::Request) -> ArtifactId;

    /// Model the request belongs to
    fn model_name(request: &Self::Request) -> &str;

    /// Fetch and decode the artifact
    async fn load(request: &Self::Request, service: &dyn DataService) -> LoadResult<Self>;
}
