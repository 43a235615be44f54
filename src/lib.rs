//! rnnvis-client - Lazy-loading cache for an RNN hidden-state dashboard
//!
//! Fetches model registries, model configs, co-clustering results and state
//! statistics from the analysis backend on demand, deduplicates concurrent
//! requests, and keeps the results in a shared store alongside the current
//! model/state/layer selection.

pub mod artifact;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod identifier;
pub mod inflight;
pub mod loader;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod service;
pub mod store;

pub use artifact::{
    Artifact, CellType, ClusterMode, CoCluster, CoClusterParams, CoClusterRequest, Layer,
    ModelConfig, SentenceRecord, StateStatistics, StatisticsKey, StatisticsRequest,
};
pub use config::ClientConfig;
pub use dashboard::Dashboard;
pub use error::{LoadError, LoadResult, RelayClosed};
pub use identifier::ArtifactId;
pub use inflight::{ArtifactState, LoadSource, Loaded};
pub use loader::ArtifactLoader;
pub use registry::ModelRegistryLoader;
pub use relay::{Event, Layout, Notification, NotificationRelay, RelayHandle};
pub use service::{DataService, HttpDataService, RawResponse};
pub use store::{ModelSet, Selection, SelectionContext, SelectionState, StateStore};
