//! Lazy loading of model configs, co-clusters and statistics
//!
//! Each `ensure_*` operation either resolves from the store, joins a pending
//! fetch for the same key, or issues exactly one new fetch and writes its
//! result into the store. Reading the store afterwards is done through the
//! synchronous accessors on [`StateStore`].

use crate::artifact::{
    Artifact, CoCluster, CoClusterRequest, ModelConfig, StateStatistics, StatisticsKey,
    StatisticsRequest,
};
use crate::error::{LoadError, LoadResult};
use crate::identifier::ArtifactId;
use crate::inflight::{ArtifactState, InFlight, Loaded};
use crate::metrics;
use crate::registry::ModelRegistryLoader;
use crate::service::DataService;
use crate::store::{ModelSet, StateStore};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Orchestrates fetches against the backend on behalf of a [`StateStore`]
pub struct ArtifactLoader {
    service: Arc<dyn DataService>,
    store: Arc<StateStore>,
    registry: Arc<ModelRegistryLoader>,
    configs: InFlight<String, Arc<ModelConfig>>,
    co_clusters: InFlight<ArtifactId, Arc<CoCluster>>,
    statistics: InFlight<ArtifactId, Arc<StateStatistics>>,
}

impl ArtifactLoader {
    pub fn new(service: Arc<dyn DataService>, store: Arc<StateStore>) -> Self {
        let registry = Arc::new(ModelRegistryLoader::new(service.clone(), store.clone()));

        Self {
            service,
            store,
            registry,
            configs: InFlight::new("model_config"),
            co_clusters: InFlight::new(CoCluster::KIND),
            statistics: InFlight::new(StateStatistics::KIND),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub async fn ensure_models_loaded(&self) -> LoadResult<Loaded<ModelSet>> {
        self.registry.ensure_models_loaded().await
    }

    /// Load a model's config once and keep it for the store's lifetime
    pub async fn ensure_model_config_loaded(&self, model: &str) -> LoadResult<Loaded<ModelConfig>> {
        require("model name", model)?;

        let service = self.service.clone();
        let store = self.store.clone();
        let name = model.to_string();

        let (source, config) = self
            .configs
            .load_or_join(
                model.to_string(),
                || self.store.model_config(model),
                move || fetch_model_config(service, store, name).boxed(),
            )
            .await?;

        Ok(Loaded::new(config, source))
    }

    /// Load a co-cluster, gated on the model being known to the registry
    pub async fn ensure_co_cluster_loaded(
        &self,
        request: &CoClusterRequest,
    ) -> LoadResult<Loaded<CoCluster>> {
        require("model name", &request.model)?;
        require("state name", &request.state)?;

        let id = CoCluster::identifier(request);
        let store = self.store.clone();
        let commit_id = id.clone();

        let (source, co_cluster) = self
            .co_clusters
            .load_or_join(
                id.clone(),
                || self.store.cached_co_cluster(&id),
                || {
                    self.load_artifact::<CoCluster>(request.clone(), move |co_cluster| {
                        let stored = store.insert_co_cluster(commit_id, co_cluster);
                        metrics::update_co_cluster_count(store.co_cluster_count());
                        stored
                    })
                },
            )
            .await?;

        Ok(Loaded::new(co_cluster, source))
    }

    /// Load statistics for one layer of a model's state
    ///
    /// The model must be in the registry. Its config is then loaded on
    /// demand and every layer, explicit or `Last`, is resolved against it.
    /// Nothing is written to the store until the fetch succeeds.
    pub async fn ensure_statistics_loaded(
        &self,
        request: &StatisticsRequest,
    ) -> LoadResult<Loaded<StateStatistics>> {
        require("model name", &request.model)?;
        require("state name", &request.state)?;
        self.registry
            .ensure_known(&request.model, StateStatistics::KIND)
            .await?;

        let key = self.resolve_statistics_key(request).await?;
        let id = StateStatistics::identifier(&key);
        let store = self.store.clone();
        let commit_key = key.clone();

        let (source, statistics) = self
            .statistics
            .load_or_join(
                id,
                || self.store.cached_statistics(&key),
                || {
                    self.load_artifact::<StateStatistics>(key.clone(), move |statistics| {
                        store.insert_statistics(&commit_key, statistics)
                    })
                },
            )
            .await?;

        Ok(Loaded::new(statistics, source))
    }

    pub fn co_cluster_state(&self, request: &CoClusterRequest) -> ArtifactState {
        let id = CoCluster::identifier(request);
        if self.store.cached_co_cluster(&id).is_some() {
            ArtifactState::Loaded
        } else if self.co_clusters.is_pending(&id) {
            ArtifactState::Pending
        } else {
            ArtifactState::Empty
        }
    }

    /// `Layer::Last` reads as `Empty` while the model config is not cached
    pub fn statistics_state(&self, request: &StatisticsRequest) -> ArtifactState {
        let Some(layer) = self.store.resolve_layer(&request.model, request.layer) else {
            return ArtifactState::Empty;
        };
        let key = request.resolve(layer);
        if self.store.cached_statistics(&key).is_some() {
            ArtifactState::Loaded
        } else if self.statistics.is_pending(&key.identifier()) {
            ArtifactState::Pending
        } else {
            ArtifactState::Empty
        }
    }

    async fn resolve_statistics_key(
        &self,
        request: &StatisticsRequest,
    ) -> LoadResult<StatisticsKey> {
        let config = self.ensure_model_config_loaded(&request.model).await?.value;
        let layer = request.layer.resolve(config.layer_count()).ok_or_else(|| {
            LoadError::invalid(format!(
                "layer {} out of range for model {} with {} layers",
                request.layer,
                request.model,
                config.layer_count()
            ))
        })?;

        Ok(request.resolve(layer))
    }

    /// Registry check, fetch, then commit into the store
    fn load_artifact<A: Artifact>(
        &self,
        request: A::Request,
        commit: impl FnOnce(Arc<A>) -> Arc<A> + Send + 'static,
    ) -> BoxFuture<'static, LoadResult<Arc<A>>> {
        let service = self.service.clone();
        let registry = self.registry.clone();

        async move {
            registry.ensure_known(A::model_name(&request), A::KIND).await?;

            let artifact = A::load(&request, service.as_ref()).await?;

            tracing::debug!(
                id = %A::identifier(&request),
                artifact = A::KIND,
                "Artifact loaded"
            );

            Ok(commit(Arc::new(artifact)))
        }
        .boxed()
    }
}

fn require(what: &str, value: &str) -> LoadResult<()> {
    if value.trim().is_empty() {
        return Err(LoadError::invalid(format!("{} is required", what)));
    }
    Ok(())
}

async fn fetch_model_config(
    service: Arc<dyn DataService>,
    store: Arc<StateStore>,
    model: String,
) -> LoadResult<Arc<ModelConfig>> {
    tracing::debug!(model = %model, "Fetching model config");

    let response = service
        .get_model_config(&model)
        .await
        .map_err(LoadError::transport)?;
    let config: ModelConfig = response.into_data(&format!("config of {}", model))?;

    tracing::info!(
        model = %model,
        cell_type = %config.cell_type(),
        layers = config.layer_count(),
        "Model config loaded"
    );

    Ok(store.insert_model_config(&model, Arc::new(config)))
}
