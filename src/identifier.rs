//! Canonical cache keys for artifact requests
//!
//! A key has the shape `kind:field/field/...`. Free-text fields (model and
//! state names) are percent-encoded so they can never contain the `/`
//! separator, which keeps distinct requests from mapping to the same key.

use crate::artifact::{CoClusterRequest, StatisticsKey};
use serde::{Deserialize, Serialize};
use urlencoding::encode;

/// Deterministic identifier of an artifact request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a co-cluster request
pub fn co_cluster_id(request: &CoClusterRequest) -> ArtifactId {
    ArtifactId(format!(
        "co_cluster:{}/{}/{}/top_k={}&mode={}",
        encode(&request.model),
        encode(&request.state),
        request.n_cluster,
        request.params.top_k,
        request.params.mode
    ))
}

/// Key of a statistics request with a resolved layer
pub fn statistics_id(key: &StatisticsKey) -> ArtifactId {
    ArtifactId(format!(
        "statistics:{}/{}/{}/top_k={}",
        encode(&key.model),
        encode(&key.state),
        key.layer,
        key.top_k
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ClusterMode, CoClusterParams, StatisticsRequest};

    #[test]
    fn test_co_cluster_id_format() {
        let id = co_cluster_id(&CoClusterRequest::new("lstm-ptb", "state_c"));
        assert_eq!(id.as_str(), "co_cluster:lstm-ptb/state_c/10/top_k=300&mode=positive");
    }

    #[test]
    fn test_statistics_id_format() {
        let key = StatisticsRequest::new("gru", "state").resolve(1);
        assert_eq!(statistics_id(&key).to_string(), "statistics:gru/state/1/top_k=300");
    }

    #[test]
    fn test_params_compared_by_value() {
        let a = CoClusterRequest::new("m", "s").with_params(CoClusterParams {
            top_k: 100,
            mode: ClusterMode::Abs,
        });
        let b = CoClusterRequest::new("m", "s").with_params(CoClusterParams {
            top_k: 100,
            mode: ClusterMode::Abs,
        });
        assert_eq!(co_cluster_id(&a), co_cluster_id(&b));
    }

    #[test]
    fn test_each_field_changes_key() {
        let base = CoClusterRequest::new("m", "s");
        let base_id = co_cluster_id(&base);

        let variants = [
            CoClusterRequest::new("m2", "s"),
            CoClusterRequest::new("m", "s2"),
            base.clone().with_clusters(11),
            base.clone().with_params(CoClusterParams {
                top_k: 301,
                ..Default::default()
            }),
            base.clone().with_params(CoClusterParams {
                mode: ClusterMode::Negative,
                ..Default::default()
            }),
        ];

        for variant in &variants {
            assert_ne!(co_cluster_id(variant), base_id, "{:?}", variant);
        }
    }

    #[test]
    fn test_separator_in_names_does_not_collide() {
        let a = co_cluster_id(&CoClusterRequest::new("a/b", "c"));
        let b = co_cluster_id(&CoClusterRequest::new("a", "b/c"));
        assert_ne!(a, b);
        assert!(a.as_str().contains("a%2Fb"));
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let stats = statistics_id(&StatisticsRequest::new("m", "s").resolve(10));
        let cluster = co_cluster_id(&CoClusterRequest::new("m", "s"));
        assert_ne!(stats, cluster);
    }
}
