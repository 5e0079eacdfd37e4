// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides global metrics using the default Prometheus registry via macros, and a text
//! encoder for whichever collaborator exposes them over HTTP.

use std::sync::LazyLock;

use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec, register_int_gauge_vec,
};
use shared_types::ChainId;

use crate::{
    catalog::EndpointCatalogs,
    error::{ResolverError, ResolverResult},
};

/// Endpoint selections, labeled by `chain_id` and `outcome`.
pub static SELECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rpc_resolver_selections_total",
        "Total number of endpoint selections, labeled by chain_id and outcome",
        &["chain_id", "outcome"]
    )
    .expect("Failed to create rpc_resolver_selections_total counter vec")
});

/// Proxied requests, labeled by `chain_id` and `outcome`.
pub static PROXY_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rpc_resolver_proxy_requests_total",
        "Total number of proxied JSON-RPC requests, labeled by chain_id and outcome",
        &["chain_id", "outcome"]
    )
    .expect("Failed to create rpc_resolver_proxy_requests_total counter vec")
});

/// Histogram for probe and forward durations in seconds.
pub static PROBE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "rpc_resolver_probe_duration_seconds",
        "Probe and forward durations in seconds",
        &["kind", "result"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create probe duration histogram")
});

/// Endpoints marked failed, labeled by `chain_id`.
pub static ENDPOINT_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rpc_resolver_endpoint_failures_total",
        "Total number of endpoints marked failed, labeled by chain_id",
        &["chain_id"]
    )
    .expect("Failed to create endpoint failures counter vec")
});

/// Cache hit/miss/store/expiry/eviction counters
pub static CACHE_OPERATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "rpc_resolver_cache_operations_total",
        "Total number of cache operations",
        &["cache", "operation"]
    )
    .expect("Failed to create cache operations counter vec")
});

/// Cache size gauge
pub static CACHE_ENTRIES: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "rpc_resolver_cache_entries",
        "Current number of entries per cache",
        &["cache"]
    )
    .expect("Failed to create cache entries gauge")
});

/// `chain_id` label for chains without configured endpoints
pub const UNCONFIGURED_CHAIN: &str = "unconfigured";

/// `chain_id` label value for a chain
///
/// Chain ids come from callers, so only chains listed in a catalog get their own series.
pub fn chain_label<'a>(catalogs: &EndpointCatalogs, chain_id: &'a ChainId) -> &'a str {
    if catalogs.is_configured(chain_id) {
        chain_id.as_str()
    } else {
        UNCONFIGURED_CHAIN
    }
}

/// Count a selection outcome
pub fn inc_selection(chain_label: &str, outcome: &str) {
    SELECTIONS.with_label_values(&[chain_label, outcome]).inc();
}

/// Count a proxy outcome
pub fn inc_proxy_request(chain_label: &str, outcome: &str) {
    PROXY_REQUESTS
        .with_label_values(&[chain_label, outcome])
        .inc();
}

/// Observe the duration of a probe or forward
///
/// # Arguments
/// * `kind` - `availability`, `capability`, `call` or `forward`
/// * `result` - `ok` or a [`rpc_client::ProbeError::kind`] label
/// * `duration_secs` - The duration of the call in seconds
pub fn observe_probe_duration(kind: &str, result: &str, duration_secs: f64) {
    PROBE_DURATION
        .with_label_values(&[kind, result])
        .observe(duration_secs);
}

/// Count an endpoint being marked failed
pub fn inc_endpoint_failure(chain_label: &str) {
    ENDPOINT_FAILURES.with_label_values(&[chain_label]).inc();
}

/// Count a cache operation
pub fn inc_cache_operation(cache: &str, operation: &str) {
    CACHE_OPERATIONS
        .with_label_values(&[cache, operation])
        .inc();
}

/// Record the current size of a cache
pub fn set_cache_entries(cache: &str, entries: usize) {
    CACHE_ENTRIES
        .with_label_values(&[cache])
        .set(i64::try_from(entries).unwrap_or(i64::MAX));
}

/// Render every registered metric in the Prometheus text exposition format
pub fn encode_metrics() -> ResolverResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ResolverError::Metrics {
            message: format!("failed to encode metrics: {e}"),
        })?;
    String::from_utf8(buffer).map_err(|e| ResolverError::Metrics {
        message: format!("metrics output is not UTF-8: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_metrics_include_recorded_series() {
        inc_selection("1", "selected");
        inc_cache_operation("health", "hit");
        observe_probe_duration("availability", "ok", 0.02);

        let output = encode_metrics().unwrap();
        assert!(output.contains("rpc_resolver_selections_total"));
        assert!(output.contains("rpc_resolver_cache_operations_total"));
        assert!(output.contains("rpc_resolver_probe_duration_seconds"));
    }

    #[test]
    fn chain_label_is_bounded_by_catalogs() {
        let catalogs = EndpointCatalogs::new();
        let listed = ChainId::from(10);
        let unknown = ChainId::new("not-a-chain").unwrap();
        catalogs.set_general_chain(
            listed.clone(),
            vec![shared_types::Endpoint::parse("https://op.rpc").unwrap()],
        );

        assert_eq!(chain_label(&catalogs, &listed), "10");
        assert_eq!(chain_label(&catalogs, &unknown), UNCONFIGURED_CHAIN);
    }
}
