//! Selection state and artifact caches
//!
//! The store is an explicit object shared via `Arc`; nothing in the crate
//! reaches it through a global. Loaders write into it, accessors only read.

use crate::artifact::{
    CellType, CoCluster, CoClusterRequest, Layer, ModelConfig, SentenceRecord, StateStatistics,
    StatisticsKey, StatisticsRequest,
};
use crate::error::{LoadError, LoadResult};
use crate::identifier::ArtifactId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Whether a selection targets the main view or the comparison view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionContext {
    #[default]
    Primary,
    Comparison,
}

impl From<bool> for SelectionContext {
    fn from(compare: bool) -> Self {
        if compare {
            Self::Comparison
        } else {
            Self::Primary
        }
    }
}

/// Model, state and layer picked in one view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub model: Option<String>,
    pub state: Option<String>,
    pub layer: Option<usize>,
}

impl Selection {
    pub fn require_model(&self) -> LoadResult<&str> {
        self.model
            .as_deref()
            .ok_or_else(|| LoadError::invalid("no model selected"))
    }

    pub fn require_state(&self) -> LoadResult<&str> {
        self.state
            .as_deref()
            .ok_or_else(|| LoadError::invalid("no state selected"))
    }

    /// Selected layer, defaulting to the last one
    pub fn layer(&self) -> Layer {
        self.layer.map_or(Layer::Last, Layer::Index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub primary: Selection,
    pub comparison: Selection,
}

impl SelectionState {
    pub fn get(&self, context: SelectionContext) -> &Selection {
        match context {
            SelectionContext::Primary => &self.primary,
            SelectionContext::Comparison => &self.comparison,
        }
    }

    fn get_mut(&mut self, context: SelectionContext) -> &mut Selection {
        match context {
            SelectionContext::Primary => &mut self.primary,
            SelectionContext::Comparison => &mut self.comparison,
        }
    }
}

/// Names of the models the backend serves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSet {
    names: Vec<String>,
    lookup: HashSet<String>,
}

impl ModelSet {
    pub fn new(names: Vec<String>) -> Self {
        let lookup = names.iter().cloned().collect();
        Self { names, lookup }
    }

    pub fn contains(&self, model: &str) -> bool {
        self.lookup.contains(model)
    }

    /// Names in backend order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Loaded statistics of one layer, by top_k
type LayerSlot = BTreeMap<u32, Arc<StateStatistics>>;

/// Process-wide selection record and artifact caches
pub struct StateStore {
    selection: watch::Sender<SelectionState>,
    models: OnceLock<Arc<ModelSet>>,
    model_configs: DashMap<String, Arc<ModelConfig>>,
    co_clusters: DashMap<ArtifactId, Arc<CoCluster>>,
    /// model -> state -> layer-indexed slots
    statistics: DashMap<String, HashMap<String, BTreeMap<usize, LayerSlot>>>,
    sentence_records: DashMap<String, Vec<Arc<SentenceRecord>>>,
    next_record_id: AtomicU64,
}

impl StateStore {
    pub fn new() -> Self {
        let (selection, _) = watch::channel(SelectionState::default());

        Self {
            selection,
            models: OnceLock::new(),
            model_configs: DashMap::new(),
            co_clusters: DashMap::new(),
            statistics: DashMap::new(),
            sentence_records: DashMap::new(),
            next_record_id: AtomicU64::new(1),
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Snapshot of both selections
    pub fn selection(&self) -> SelectionState {
        self.selection.borrow().clone()
    }

    /// Receive every subsequent selection change
    pub fn subscribe_selection(&self) -> watch::Receiver<SelectionState> {
        self.selection.subscribe()
    }

    pub fn select_model(&self, context: SelectionContext, model: impl Into<String>) {
        let model = model.into();
        self.selection
            .send_modify(|s| s.get_mut(context).model = Some(model));
    }

    pub fn select_state(&self, context: SelectionContext, state: impl Into<String>) {
        let state = state.into();
        self.selection
            .send_modify(|s| s.get_mut(context).state = Some(state));
    }

    pub fn select_layer(&self, context: SelectionContext, layer: usize) {
        self.selection
            .send_modify(|s| s.get_mut(context).layer = Some(layer));
    }

    // ------------------------------------------------------------------
    // Model registry
    // ------------------------------------------------------------------

    pub fn models(&self) -> Option<Arc<ModelSet>> {
        self.models.get().cloned()
    }

    /// Populate the registry; the first value written wins
    pub(crate) fn set_models(&self, models: ModelSet) -> Arc<ModelSet> {
        self.models.get_or_init(|| Arc::new(models)).clone()
    }

    // ------------------------------------------------------------------
    // Model configs and derived accessors
    // ------------------------------------------------------------------

    pub fn model_config(&self, model: &str) -> Option<Arc<ModelConfig>> {
        self.model_configs.get(model).map(|entry| entry.clone())
    }

    pub(crate) fn insert_model_config(
        &self,
        model: &str,
        config: Arc<ModelConfig>,
    ) -> Arc<ModelConfig> {
        self.model_configs
            .entry(model.to_string())
            .or_insert(config)
            .clone()
    }

    pub fn model_cell_type(&self, model: &str) -> Option<CellType> {
        self.model_config(model).map(|config| config.cell_type())
    }

    /// Internal state names of the model's cell type
    pub fn available_states(&self, model: &str) -> Option<&'static [&'static str]> {
        self.model_cell_type(model).map(CellType::states)
    }

    pub fn layer_num(&self, model: &str) -> Option<usize> {
        self.model_config(model).map(|config| config.layer_count())
    }

    pub fn layer_size(&self, model: &str, layer: Layer) -> Option<usize> {
        let config = self.model_config(model)?;
        let index = layer.resolve(config.layer_count())?;
        config.layer_units(index)
    }

    // ------------------------------------------------------------------
    // Co-clusters
    // ------------------------------------------------------------------

    /// Cached co-cluster; call `ensure_co_cluster_loaded` first
    pub fn get_co_cluster(&self, request: &CoClusterRequest) -> Option<Arc<CoCluster>> {
        let id = request.identifier();
        let found = self.cached_co_cluster(&id);
        if found.is_none() {
            tracing::debug!(id = %id, "Co-cluster not loaded yet, load it before reading");
        }
        found
    }

    pub(crate) fn cached_co_cluster(&self, id: &ArtifactId) -> Option<Arc<CoCluster>> {
        self.co_clusters.get(id).map(|entry| entry.clone())
    }

    pub(crate) fn insert_co_cluster(
        &self,
        id: ArtifactId,
        co_cluster: Arc<CoCluster>,
    ) -> Arc<CoCluster> {
        self.co_clusters.entry(id).or_insert(co_cluster).clone()
    }

    pub fn co_cluster_count(&self) -> usize {
        self.co_clusters.len()
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Cached statistics; `Layer::Last` needs the model config to be cached
    pub fn get_statistics(&self, request: &StatisticsRequest) -> Option<Arc<StateStatistics>> {
        let found = self
            .resolve_layer(&request.model, request.layer)
            .and_then(|layer| self.cached_statistics(&request.resolve(layer)));

        if found.is_none() {
            tracing::debug!(
                model = %request.model,
                state = %request.state,
                layer = %request.layer,
                top_k = request.top_k,
                "Unable to get statistics, load them before reading"
            );
        }
        found
    }

    /// Resolve a layer selector against the cached config
    ///
    /// Explicit indices pass through unchecked when no config is cached.
    pub(crate) fn resolve_layer(&self, model: &str, layer: Layer) -> Option<usize> {
        match (layer, self.layer_num(model)) {
            (_, Some(count)) => layer.resolve(count),
            (Layer::Index(index), None) => Some(index),
            (Layer::Last, None) => None,
        }
    }

    pub(crate) fn cached_statistics(&self, key: &StatisticsKey) -> Option<Arc<StateStatistics>> {
        let by_state = self.statistics.get(&key.model)?;
        by_state
            .get(&key.state)?
            .get(&key.layer)?
            .get(&key.top_k)
            .cloned()
    }

    pub(crate) fn insert_statistics(
        &self,
        key: &StatisticsKey,
        statistics: Arc<StateStatistics>,
    ) -> Arc<StateStatistics> {
        let mut by_state = self.statistics.entry(key.model.clone()).or_default();
        by_state
            .entry(key.state.clone())
            .or_default()
            .entry(key.layer)
            .or_default()
            .entry(key.top_k)
            .or_insert(statistics)
            .clone()
    }

    /// Number of layers of a model's state with any statistics loaded
    pub fn statistics_layers(&self, model: &str, state: &str) -> usize {
        self.statistics
            .get(model)
            .and_then(|by_state| by_state.get(state).map(BTreeMap::len))
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Sentence evaluation
    // ------------------------------------------------------------------

    /// Record a new evaluation of `sentence`; identical sentences are not merged
    pub fn eval_sentence(&self, sentence: &str, model: &str) -> Arc<SentenceRecord> {
        let id = self.next_record_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(SentenceRecord::new(id, sentence, model));

        self.sentence_records
            .entry(model.to_string())
            .or_default()
            .push(record.clone());

        tracing::debug!(model = %model, record_id = id, "Sentence record created");

        record
    }

    pub fn sentence_records(&self, model: &str) -> Vec<Arc<SentenceRecord>> {
        self.sentence_records
            .get(model)
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{CellSpec, ModelArchitecture, StatisticsData};

    fn lstm_config() -> Arc<ModelConfig> {
        Arc::new(ModelConfig {
            model: ModelArchitecture {
                cell_type: CellType::BasicLstm,
                cells: [128, 256, 64]
                    .into_iter()
                    .map(|num_units| CellSpec { num_units })
                    .collect(),
            },
        })
    }

    fn store_with_model() -> StateStore {
        let store = StateStore::new();
        store.insert_model_config("M", lstm_config());
        store
    }

    fn statistics(key: &StatisticsKey) -> Arc<StateStatistics> {
        Arc::new(StateStatistics {
            key: key.clone(),
            data: StatisticsData::default(),
        })
    }

    #[test]
    fn test_config_derived_accessors() {
        let store = store_with_model();

        assert_eq!(store.model_cell_type("M"), Some(CellType::BasicLstm));
        assert_eq!(store.available_states("M"), Some(&["state_c", "state_h"][..]));
        assert_eq!(store.layer_num("M"), Some(3));
        assert_eq!(store.layer_size("M", Layer::Last), Some(64));
        assert_eq!(store.layer_size("M", Layer::Index(1)), Some(256));
        assert_eq!(store.layer_size("M", Layer::from_signed(-1)), Some(64));
    }

    #[test]
    fn test_accessors_unavailable_without_config() {
        let store = store_with_model();

        assert_eq!(store.model_cell_type("other"), None);
        assert_eq!(store.available_states("other"), None);
        assert_eq!(store.layer_num("other"), None);
        assert_eq!(store.layer_size("other", Layer::Last), None);
        assert_eq!(store.layer_size("M", Layer::Index(3)), None);
    }

    #[test]
    fn test_model_config_first_insert_wins() {
        let store = store_with_model();
        let first = store.model_config("M").unwrap();
        let kept = store.insert_model_config("M", lstm_config());
        assert!(Arc::ptr_eq(&first, &kept));
    }

    #[test]
    fn test_selection_contexts() {
        let store = StateStore::new();
        store.select_model(SelectionContext::Primary, "M");
        store.select_model(SelectionContext::Comparison, "N");
        store.select_layer(SelectionContext::Primary, 1);

        let selection = store.selection();
        assert_eq!(selection.primary.model.as_deref(), Some("M"));
        assert_eq!(selection.comparison.model.as_deref(), Some("N"));
        assert_eq!(selection.primary.layer(), Layer::Index(1));
        assert_eq!(selection.comparison.layer(), Layer::Last);
        assert!(selection.comparison.require_state().is_err());
    }

    #[tokio::test]
    async fn test_selection_subscription() {
        let store = StateStore::new();
        let mut rx = store.subscribe_selection();

        store.select_state(SelectionContext::Primary, "state_h");

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().primary.state.as_deref(), Some("state_h"));
    }

    #[test]
    fn test_model_set() {
        let store = StateStore::new();
        assert!(store.models().is_none());

        let models = store.set_models(ModelSet::new(vec!["b".into(), "a".into()]));
        assert!(models.contains("a"));
        assert!(!models.contains("c"));
        assert_eq!(models.names(), ["b", "a"]);

        // Registry is populated once
        let again = store.set_models(ModelSet::new(vec![]));
        assert!(Arc::ptr_eq(&models, &again));
    }

    #[test]
    fn test_statistics_slots() {
        let store = store_with_model();
        let key = StatisticsRequest::new("M", "state_c").resolve(2);

        assert!(store.cached_statistics(&key).is_none());
        store.insert_statistics(&key, statistics(&key));

        assert_eq!(store.statistics_layers("M", "state_c"), 1);
        assert!(store.cached_statistics(&key).is_some());
        // Lower layers stay empty
        let lower = StatisticsRequest::new("M", "state_c").resolve(0);
        assert!(store.cached_statistics(&lower).is_none());
        // Different top_k is a different artifact
        let other_top_k = StatisticsRequest::new("M", "state_c").with_top_k(10).resolve(2);
        assert!(store.cached_statistics(&other_top_k).is_none());
    }

    #[test]
    fn test_statistics_sparse_layers() {
        let store = StateStore::new();
        let high = StatisticsRequest::new("M", "state_c").resolve(usize::MAX);
        let low = StatisticsRequest::new("M", "state_c").resolve(1);

        let stored = store.insert_statistics(&high, statistics(&high));
        store.insert_statistics(&low, statistics(&low));

        assert_eq!(store.statistics_layers("M", "state_c"), 2);
        assert!(Arc::ptr_eq(&store.cached_statistics(&high).unwrap(), &stored));
        assert!(store.cached_statistics(&low).is_some());
    }

    #[test]
    fn test_get_statistics_resolves_last_layer() {
        let store = store_with_model();
        let key = StatisticsRequest::new("M", "state_c").resolve(2);
        let stored = store.insert_statistics(&key, statistics(&key));

        let last = store.get_statistics(&StatisticsRequest::new("M", "state_c")).unwrap();
        let explicit = store
            .get_statistics(&StatisticsRequest::new("M", "state_c").with_layer(Layer::Index(2)))
            .unwrap();
        assert!(Arc::ptr_eq(&last, &stored));
        assert!(Arc::ptr_eq(&explicit, &stored));
    }

    #[test]
    fn test_get_statistics_unavailable() {
        let store = StateStore::new();
        assert!(store.get_statistics(&StatisticsRequest::new("M", "state_c")).is_none());
    }

    #[test]
    fn test_eval_sentence_never_deduplicates() {
        let store = StateStore::new();
        let first = store.eval_sentence("hello", "M");
        let second = store.eval_sentence("hello", "M");

        assert_ne!(first.id, second.id);
        let records = store.sentence_records("M");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sentence, "hello");
        assert_eq!(records[1].sentence, "hello");
        assert!(store.sentence_records("N").is_empty());
    }
}
