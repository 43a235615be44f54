//! Prometheus metrics

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Setup Prometheus metrics recorder
/// Returns a handle that can be used to render the current snapshot
pub fn setup_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    tracing::info!("Prometheus metrics recorder installed");

    Ok(handle)
}

/// Record a request answered from cache
pub fn record_cache_hit(artifact: &'static str) {
    metrics::counter!("rnnvis_cache_hits_total", "artifact" => artifact).increment(1);
}

/// Record a fetch issued to the backend
pub fn record_fetch(artifact: &'static str) {
    metrics::counter!("rnnvis_fetches_total", "artifact" => artifact).increment(1);
}

/// Record a request that awaited another caller's fetch
pub fn record_joined(artifact: &'static str) {
    metrics::counter!("rnnvis_joined_requests_total", "artifact" => artifact).increment(1);
}

/// Record a failed fetch
pub fn record_fetch_failure(artifact: &'static str) {
    metrics::counter!("rnnvis_fetch_failures_total", "artifact" => artifact).increment(1);
}

/// Update the number of cached co-clusters
pub fn update_co_cluster_count(count: usize) {
    metrics::gauge!("rnnvis_cached_co_clusters").set(count as f64);
}
