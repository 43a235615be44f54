//! Per-layer hidden state statistics

use super::Artifact;
use super::cocluster::DEFAULT_TOP_K;
use crate::error::{LoadError, LoadResult};
use crate::identifier::{ArtifactId, statistics_id};
use crate::service::DataService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Layer selector; `Last` stands for the model's output-most layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layer {
    #[default]
    Last,
    Index(usize),
}

impl Layer {
    /// Map a signed layer index, treating any negative value as `Last`
    pub fn from_signed(layer: i64) -> Self {
        usize::try_from(layer).map_or(Self::Last, Self::Index)
    }

    /// Concrete index for a model with `layer_count` layers
    pub fn resolve(self, layer_count: usize) -> Option<usize> {
        match self {
            Self::Last => layer_count.checked_sub(1),
            Self::Index(index) => (index < layer_count).then_some(index),
        }
    }
}

impl From<usize> for Layer {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Last => write!(f, "last"),
            Self::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Statistics request as issued by callers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatisticsRequest {
    pub model: String,
    pub state: String,
    pub layer: Layer,
    pub top_k: u32,
}

impl StatisticsRequest {
    pub fn new(model: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            state: state.into(),
            layer: Layer::Last,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_layer(mut self, layer: impl Into<Layer>) -> Self {
        self.layer = layer.into();
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    /// Pin the layer to a concrete index
    pub fn resolve(&self, layer: usize) -> StatisticsKey {
        StatisticsKey {
            model: self.model.clone(),
            state: self.state.clone(),
            layer,
            top_k: self.top_k,
        }
    }
}

/// Statistics request with a concrete layer index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatisticsKey {
    pub model: String,
    pub state: String,
    pub layer: usize,
    pub top_k: u32,
}

impl StatisticsKey {
    pub fn identifier(&self) -> ArtifactId {
        statistics_id(self)
    }
}

/// Statistics payload; every series is indexed by word then unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsData {
    pub words: Vec<String>,
    pub freqs: Vec<u64>,
    pub mean: Vec<Vec<f32>>,
    pub low1: Vec<Vec<f32>>,
    pub high1: Vec<Vec<f32>>,
    pub low2: Vec<Vec<f32>>,
    pub high2: Vec<Vec<f32>>,
    pub sort_idx: Vec<Vec<usize>>,
}

/// Loaded statistics for one (model, state, layer, top_k)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateStatistics {
    pub key: StatisticsKey,
    pub data: StatisticsData,
}

impl StateStatistics {
    pub fn word_count(&self) -> usize {
        self.data.words.len()
    }

    /// Mean activation of every unit for a given word
    pub fn mean_of(&self, word: &str) -> Option<&[f32]> {
        let index = self.data.words.iter().position(|w| w == word)?;
        self.data.mean.get(index).map(Vec::as_slice)
    }
}

#[async_trait]
impl Artifact for StateStatistics {
    type Request = StatisticsKey;
    const KIND: &'static str = "statistics";

    fn identifier(key: &StatisticsKey) -> ArtifactId {
        statistics_id(key)
    }

    fn model_name(key: &StatisticsKey) -> &str {
        &key.model
    }

    async fn load(key: &StatisticsKey, service: &dyn DataService) -> LoadResult<Self> {
        let resource = format!("statistics {}", Self::identifier(key));

        tracing::debug!(
            model = %key.model,
            state = %key.state,
            layer = key.layer,
            top_k = key.top_k,
            "Fetching state statistics"
        );

        let response = service
            .get_statistics(key)
            .await
            .map_err(LoadError::transport)?;
        let data: StatisticsData = response.into_data(&resource)?;

        Ok(Self {
            key: key.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layer_from_signed() {
        assert_eq!(Layer::from_signed(-1), Layer::Last);
        assert_eq!(Layer::from_signed(-7), Layer::Last);
        assert_eq!(Layer::from_signed(0), Layer::Index(0));
        assert_eq!(Layer::from_signed(2), Layer::Index(2));
    }

    #[test]
    fn test_layer_resolve() {
        assert_eq!(Layer::Last.resolve(3), Some(2));
        assert_eq!(Layer::Last.resolve(0), None);
        assert_eq!(Layer::Index(1).resolve(3), Some(1));
        assert_eq!(Layer::Index(3).resolve(3), None);
    }

    #[test]
    fn test_request_resolve() {
        let key = StatisticsRequest::new("m", "state_c").with_top_k(50).resolve(2);
        assert_eq!(key.layer, 2);
        assert_eq!(key.top_k, 50);
        assert_eq!(key.model, "m");
    }

    #[test]
    fn test_partial_payload_defaults() {
        let data: StatisticsData = serde_json::from_value(json!({
            "words": ["the", "a"],
            "mean": [[0.5, -0.5], [0.1, 0.2]]
        }))
        .unwrap();
        let stats = StateStatistics {
            key: StatisticsRequest::new("m", "s").resolve(0),
            data,
        };

        assert_eq!(stats.word_count(), 2);
        assert_eq!(stats.mean_of("a"), Some(&[0.1, 0.2][..]));
        assert_eq!(stats.mean_of("zebra"), None);
        assert!(stats.data.freqs.is_empty());
    }
}
