//! Memoized loading of the backend's model registry

use crate::error::{LoadError, LoadResult};
use crate::inflight::{InFlight, Loaded};
use crate::service::{DataService, ModelList};
use crate::store::{ModelSet, StateStore};
use futures::FutureExt;
use std::sync::Arc;

/// Loads the list of valid model names at most once per store
pub struct ModelRegistryLoader {
    service: Arc<dyn DataService>,
    store: Arc<StateStore>,
    inflight: InFlight<(), Arc<ModelSet>>,
}

impl ModelRegistryLoader {
    pub fn new(service: Arc<dyn DataService>, store: Arc<StateStore>) -> Self {
        Self {
            service,
            store,
            inflight: InFlight::new("models"),
        }
    }

    /// Make sure the registry is populated
    ///
    /// Resolves with `LoadSource::Cache` when it already is. Concurrent
    /// callers share a single fetch. Failures are not cached, so a later
    /// call tries again.
    pub async fn ensure_models_loaded(&self) -> LoadResult<Loaded<ModelSet>> {
        let service = self.service.clone();
        let store = self.store.clone();

        let (source, models) = self
            .inflight
            .load_or_join(
                (),
                || self.store.models(),
                move || fetch_models(service, store).boxed(),
            )
            .await?;

        Ok(Loaded::new(models, source))
    }

    /// Fail with `UnknownModel` unless the registry lists `model`
    pub async fn ensure_known(&self, model: &str, artifact: &'static str) -> LoadResult<()> {
        let models = self.ensure_models_loaded().await?.value;
        if !models.contains(model) {
            tracing::warn!(model = %model, artifact, "Rejecting request for unknown model");
            return Err(LoadError::UnknownModel(model.to_string()));
        }
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.inflight.is_pending(&())
    }
}

async fn fetch_models(
    service: Arc<dyn DataService>,
    store: Arc<StateStore>,
) -> LoadResult<Arc<ModelSet>> {
    tracing::debug!("Fetching model registry");

    let response = service.get_models().await.map_err(LoadError::transport)?;

    if !response.is_success() {
        tracing::warn!(status = response.status, "Model registry request failed");
        return Err(LoadError::RegistryLoad(response));
    }

    let list: ModelList = response.decode("model list")?;
    let models = store.set_models(ModelSet::new(list.models));

    if models.is_empty() {
        tracing::warn!("Model registry is empty; every artifact request will be rejected");
    } else {
        tracing::info!(count = models.len(), "Model registry loaded");
    }

    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflight::LoadSource;
    use crate::service::RawResponse;
    use crate::service::mocks::{Endpoint, MockDataService, model_config_json};
    use serde_json::json;
    use std::time::Duration;

    fn loader(service: Arc<MockDataService>) -> ModelRegistryLoader {
        ModelRegistryLoader::new(service, Arc::new(StateStore::new()))
    }

    #[tokio::test]
    async fn test_first_call_fetches() {
        let service = Arc::new(
            MockDataService::lstm().with_model("gru-imdb", model_config_json("GRU", &[64])),
        );
        let registry = loader(service.clone());

        let loaded = registry.ensure_models_loaded().await.unwrap();
        assert_eq!(loaded.source, LoadSource::Fetched);
        assert_eq!(loaded.value.names(), ["M", "gru-imdb"]);
        assert!(loaded.value.contains("gru-imdb"));
        assert_eq!(service.calls(Endpoint::Models), 1);
    }

    #[tokio::test]
    async fn test_second_call_is_noop() {
        let service = Arc::new(MockDataService::lstm());
        let registry = loader(service.clone());

        registry.ensure_models_loaded().await.unwrap();
        let again = registry.ensure_models_loaded().await.unwrap();

        assert!(again.was_cached());
        assert_eq!(service.calls(Endpoint::Models), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_coalesce() {
        let service = Arc::new(MockDataService::lstm().with_latency(Duration::from_millis(30)));
        let registry = loader(service.clone());

        let results =
            futures::future::join_all((0..4).map(|_| registry.ensure_models_loaded())).await;

        assert_eq!(service.calls(Endpoint::Models), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(&first.value, &result.as_ref().unwrap().value));
        }
        assert!(!registry.is_loading());
    }

    #[tokio::test]
    async fn test_non_success_is_registry_error_and_retried() {
        let service = Arc::new(MockDataService::lstm());
        service
            .fail_next(Endpoint::Models, RawResponse::new(502, json!("bad gateway")))
            .await;
        let registry = loader(service.clone());

        let err = registry.ensure_models_loaded().await.unwrap_err();
        match err {
            LoadError::RegistryLoad(response) => {
                assert_eq!(response.status, 502);
                assert_eq!(response.data, json!("bad gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let loaded = registry.ensure_models_loaded().await.unwrap();
        assert_eq!(loaded.source, LoadSource::Fetched);
        assert_eq!(service.calls(Endpoint::Models), 2);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let service = Arc::new(MockDataService::lstm());
        service
            .disconnect_next(Endpoint::Models, "connection refused")
            .await;
        let registry = loader(service);

        let err = registry.ensure_models_loaded().await.unwrap_err();
        assert!(matches!(err, LoadError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_registry_rejects_every_model() {
        let service = Arc::new(MockDataService::new());
        let registry = loader(service.clone());

        let loaded = registry.ensure_models_loaded().await.unwrap();
        assert!(loaded.value.is_empty());

        let err = registry.ensure_known("M", "co_cluster").await.unwrap_err();
        assert!(matches!(err, LoadError::UnknownModel(ref m) if m == "M"));
        assert_eq!(service.calls(Endpoint::Models), 1);
    }

    #[tokio::test]
    async fn test_ensure_known_accepts_listed_model() {
        let registry = loader(Arc::new(MockDataService::lstm()));

        registry.ensure_known("M", "state_statistics").await.unwrap();
        assert!(registry.ensure_known("m", "state_statistics").await.is_err());
    }
}
