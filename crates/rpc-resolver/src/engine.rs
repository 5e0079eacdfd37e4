// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Selection engine
//!
//! Orchestrates alias normalization, candidate ordering, health filtering and probing to pick
//! one endpoint per request, or to forward a request with failover. Candidates are tried one at
//! a time; every per-candidate failure is absorbed and only exhaustion reaches the caller.

use std::sync::atomic::{AtomicUsize, Ordering};

use rpc_client::{CapabilityProbe, ProbeError, RpcProbe, is_hex_quantity};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared_types::{ChainId, Endpoint};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    aliases::{AliasRegistry, AliasTable},
    cache::{CacheStats, TtlCache},
    capability::{CapabilityCache, CapabilityRecord},
    catalog::EndpointCatalogs,
    config::{ResolverConfig, SelectionPolicy},
    error::{ResolverError, ResolverResult},
    health::{HealthCache, HealthRecord},
    http_probe::HttpProbeClient,
    metrics,
};

/// Capability requirements of a selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptions {
    /// The endpoint must accept `eth_sendRawTransaction`
    pub require_tx_support: bool,
    /// The endpoint must serve the common read methods
    pub require_methods: bool,
}

impl SelectOptions {
    /// Require transaction submission support
    pub fn with_tx_support(mut self) -> Self {
        self.require_tx_support = true;
        self
    }

    /// Require the common read methods
    pub fn with_methods(mut self) -> Self {
        self.require_methods = true;
        self
    }

    /// Capability probes implied by these options
    pub fn capability_probes(&self) -> Vec<CapabilityProbe> {
        let mut probes = Vec::new();
        if self.require_tx_support {
            probes.extend(CapabilityProbe::transaction_support());
        }
        if self.require_methods {
            probes.extend(CapabilityProbe::standard_methods());
        }
        probes
    }
}

/// Upstream answer to a proxied request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    /// Endpoint that answered
    pub endpoint: Endpoint,
    /// Upstream HTTP status
    pub status: u16,
    /// Upstream body, untouched
    pub body: Value,
}

/// Gas price reported by a selected endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPriceQuote {
    /// Endpoint the price came from
    pub endpoint: Endpoint,
    /// Raw hex quantity in wei
    pub gas_price: String,
    /// Whether the value was served from the gas price cache
    pub cached: bool,
}

/// Endpoint resolution and failover engine
///
/// Owns every cache it consults, so independent engines never share state.
#[derive(Debug)]
pub struct SelectionEngine<P = HttpProbeClient> {
    config: ResolverConfig,
    probe: P,
    aliases: AliasRegistry,
    catalogs: EndpointCatalogs,
    health: HealthCache,
    capabilities: CapabilityCache,
    gas_prices: TtlCache<Endpoint, String>,
    cursor: AtomicUsize,
}

impl SelectionEngine<HttpProbeClient> {
    /// Create an engine that probes over HTTP
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Config` if the configuration is invalid.
    pub fn new(config: ResolverConfig) -> ResolverResult<Self> {
        config
            .validate()
            .map_err(|e| ResolverError::config(format!("invalid resolver configuration: {e}")))?;
        let probe = HttpProbeClient::from_config(&config)?;
        Ok(Self::with_probe(config, probe))
    }
}

impl<P: RpcProbe> SelectionEngine<P> {
    /// Create an engine with a custom probe implementation and the default alias table
    pub fn with_probe(config: ResolverConfig, probe: P) -> Self {
        let capacity = config.cache_max_entries;
        Self {
            health: HealthCache::with_capacity(config.retry_timeout, capacity),
            capabilities: CapabilityCache::with_capacity(config.retry_timeout, capacity),
            gas_prices: TtlCache::with_settings(
                "gas_price",
                config.gas_price_cache_timeout,
                capacity,
            ),
            aliases: AliasRegistry::with_defaults(),
            catalogs: EndpointCatalogs::new(),
            cursor: AtomicUsize::new(0),
            probe,
            config,
        }
    }

    /// Pick an endpoint that is up and serves the methods `options` ask for
    ///
    /// # Errors
    ///
    /// Returns `InvalidChainId`, `NoEndpointsConfigured`, `AllEndpointsExcluded` or
    /// `AllEndpointsUnavailable`.
    pub async fn select(&self, chain: &str, options: SelectOptions) -> ResolverResult<Endpoint> {
        self.select_with(chain, &options.capability_probes()).await
    }

    /// Pick an endpoint that is up and serves every method in `required`
    ///
    /// # Errors
    ///
    /// Returns `InvalidChainId`, `NoEndpointsConfigured`, `AllEndpointsExcluded` or
    /// `AllEndpointsUnavailable`.
    #[instrument(skip(self, required), fields(required = required.len()))]
    pub async fn select_with(
        &self,
        chain: &str,
        required: &[CapabilityProbe],
    ) -> ResolverResult<Endpoint> {
        let chain_id = self.aliases.normalize(chain)?;
        let result = self.select_for_chain(&chain_id, required).await;
        metrics::inc_selection(
            metrics::chain_label(&self.catalogs, &chain_id),
            outcome(&result),
        );
        result
    }

    /// [`select`](Self::select) that gives up as soon as `token` is cancelled
    ///
    /// An abandoned probe records nothing in any cache.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Cancelled` on cancellation, otherwise as `select`.
    pub async fn select_cancellable(
        &self,
        chain: &str,
        options: SelectOptions,
        token: &CancellationToken,
    ) -> ResolverResult<Endpoint> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(chain, "selection cancelled by caller");
                Err(ResolverError::Cancelled)
            }
            result = self.select(chain, options) => result,
        }
    }

    async fn select_for_chain(
        &self,
        chain_id: &ChainId,
        required: &[CapabilityProbe],
    ) -> ResolverResult<Endpoint> {
        let candidates = self.eligible_candidates(chain_id)?;
        let mut attempts = Vec::with_capacity(candidates.len());

        for endpoint in candidates {
            if let Some(probe) = required
                .iter()
                .find(|probe| self.capabilities.is_known_unsupported(&endpoint, probe.method()))
            {
                debug!(
                    endpoint = %endpoint,
                    method = probe.method(),
                    "skipping candidate with cached unsupported method"
                );
                attempts.push(format!("{endpoint}: {} unsupported", probe.method()));
                continue;
            }

            if let Err(e) = self.probe.check_availability(&endpoint).await {
                self.record_failure(chain_id, &endpoint, &e);
                attempts.push(format!("{endpoint}: {e}"));
                continue;
            }

            match self.verify_capabilities(&endpoint, required).await {
                Ok(()) => {
                    info!(chain_id = %chain_id, endpoint = %endpoint, "selected endpoint");
                    return Ok(endpoint);
                }
                Err(e) if e.is_method_unsupported() => {
                    debug!(endpoint = %endpoint, error = %e, "candidate lacks a required method");
                    attempts.push(format!("{endpoint}: {e}"));
                }
                Err(e) => {
                    self.record_failure(chain_id, &endpoint, &e);
                    attempts.push(format!("{endpoint}: {e}"));
                }
            }
        }

        error!(
            chain_id = %chain_id,
            attempts = attempts.len(),
            "no available endpoint"
        );
        Err(ResolverError::AllEndpointsUnavailable {
            chain_id: chain_id.clone(),
            attempts,
        })
    }

    /// Check each required method, probing only when no fresh verdict is cached
    async fn verify_capabilities(
        &self,
        endpoint: &Endpoint,
        required: &[CapabilityProbe],
    ) -> Result<(), ProbeError> {
        for probe in required {
            match self.capabilities.check(endpoint, probe.method()) {
                Some(true) => continue,
                Some(false) => {
                    return Err(ProbeError::MethodUnsupported {
                        method: probe.method().to_string(),
                        message: "cached verdict".to_string(),
                    });
                }
                None => {}
            }

            match self.probe.check_capability(endpoint, probe).await {
                Ok(()) => self.capabilities.record(endpoint, probe.method(), true),
                Err(e) if e.is_method_unsupported() => {
                    self.capabilities.record(endpoint, probe.method(), false);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Forward a JSON-RPC body to the first candidate that answers
    ///
    /// The upstream status and body are returned untouched. A non-2xx answer counts as a
    /// failure of that endpoint, including a 4xx rejecting a malformed `body`, so a bad request
    /// can exclude every endpoint of the chain for the retry timeout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChainId`, `NoEndpointsConfigured`, `AllEndpointsExcluded` or
    /// `AllEndpointsUnavailable`.
    #[instrument(skip(self, body))]
    pub async fn proxy(&self, chain: &str, body: &Value) -> ResolverResult<ProxyResponse> {
        let chain_id = self.aliases.normalize(chain)?;
        let result = self.proxy_for_chain(&chain_id, body).await;
        metrics::inc_proxy_request(
            metrics::chain_label(&self.catalogs, &chain_id),
            outcome(&result),
        );
        result
    }

    /// [`proxy`](Self::proxy) that gives up as soon as `token` is cancelled
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Cancelled` on cancellation, otherwise as `proxy`.
    pub async fn proxy_cancellable(
        &self,
        chain: &str,
        body: &Value,
        token: &CancellationToken,
    ) -> ResolverResult<ProxyResponse> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(chain, "proxy request cancelled by caller");
                Err(ResolverError::Cancelled)
            }
            result = self.proxy(chain, body) => result,
        }
    }

    async fn proxy_for_chain(
        &self,
        chain_id: &ChainId,
        body: &Value,
    ) -> ResolverResult<ProxyResponse> {
        let candidates = self.eligible_candidates(chain_id)?;
        let mut attempts = Vec::with_capacity(candidates.len());

        for endpoint in candidates {
            match self.probe.forward(&endpoint, body).await {
                Ok(response) => {
                    debug!(
                        chain_id = %chain_id,
                        endpoint = %endpoint,
                        status = response.status,
                        "forwarded request"
                    );
                    return Ok(ProxyResponse {
                        endpoint,
                        status: response.status,
                        body: response.body,
                    });
                }
                Err(e) => {
                    self.record_failure(chain_id, &endpoint, &e);
                    attempts.push(format!("{endpoint}: {e}"));
                }
            }
        }

        error!(
            chain_id = %chain_id,
            attempts = attempts.len(),
            "no endpoint accepted the forwarded request"
        );
        Err(ResolverError::AllEndpointsUnavailable {
            chain_id: chain_id.clone(),
            attempts,
        })
    }

    /// Current gas price from an available endpoint
    ///
    /// Prices are cached per endpoint for the gas price cache timeout.
    ///
    /// # Errors
    ///
    /// Returns any `select` error, or `EndpointCallFailed` if the selected endpoint does not
    /// answer with a hex quantity.
    #[instrument(skip(self))]
    pub async fn gas_price(&self, chain: &str) -> ResolverResult<GasPriceQuote> {
        let endpoint = self.select(chain, SelectOptions::default()).await?;

        if let Some(gas_price) = self.gas_prices.get(&endpoint) {
            return Ok(GasPriceQuote {
                endpoint,
                gas_price,
                cached: true,
            });
        }

        let result = self.probe.call(&endpoint, "eth_gasPrice", json!([])).await;
        let gas_price = match result {
            Ok(Value::String(price)) if is_hex_quantity(&price) => price,
            Ok(other) => {
                return Err(ResolverError::EndpointCallFailed {
                    endpoint,
                    message: format!("eth_gasPrice returned {other}"),
                });
            }
            Err(e) => {
                if e.is_endpoint_unavailable() {
                    let chain_id = self.aliases.normalize(chain)?;
                    self.record_failure(&chain_id, &endpoint, &e);
                }
                return Err(ResolverError::EndpointCallFailed {
                    endpoint,
                    message: e.to_string(),
                });
            }
        };

        self.gas_prices.insert(endpoint.clone(), gas_price.clone());
        Ok(GasPriceQuote {
            endpoint,
            gas_price,
            cached: false,
        })
    }

    /// Aliases of one chain, or of every chain when `chain` is `None`
    ///
    /// # Errors
    ///
    /// Returns `InvalidChainId` for empty input, or `AliasesNotFound` if the chain has none.
    pub fn list_aliases(&self, chain: Option<&str>) -> ResolverResult<AliasTable> {
        let Some(chain) = chain else {
            return Ok(self.aliases.all_aliases());
        };

        let chain_id = self.aliases.normalize(chain)?;
        let aliases = self.aliases.aliases_for(&chain_id);
        if aliases.is_empty() {
            return Err(ResolverError::AliasesNotFound { chain_id });
        }
        Ok(AliasTable::from([(chain_id, aliases)]))
    }

    /// Health-filtered candidates in probing order
    fn eligible_candidates(&self, chain_id: &ChainId) -> ResolverResult<Vec<Endpoint>> {
        let candidates = self.catalogs.candidates(chain_id);
        if candidates.is_empty() {
            warn!(chain_id = %chain_id, "no endpoints configured");
            return Err(ResolverError::NoEndpointsConfigured {
                chain_id: chain_id.clone(),
            });
        }

        let total = candidates.len();
        let mut eligible: Vec<Endpoint> = candidates
            .into_iter()
            .filter(|endpoint| self.health.is_eligible(endpoint))
            .collect();
        if eligible.is_empty() {
            warn!(chain_id = %chain_id, excluded = total, "every endpoint failed recently");
            return Err(ResolverError::AllEndpointsExcluded {
                chain_id: chain_id.clone(),
                excluded: total,
            });
        }

        if self.config.selection_policy == SelectionPolicy::RoundRobin {
            let offset = self.cursor.fetch_add(1, Ordering::Relaxed) % eligible.len();
            eligible.rotate_left(offset);
        }
        debug!(
            chain_id = %chain_id,
            eligible = eligible.len(),
            excluded = total - eligible.len(),
            "built candidate list"
        );
        Ok(eligible)
    }

    fn record_failure(&self, chain_id: &ChainId, endpoint: &Endpoint, error: &ProbeError) {
        warn!(chain_id = %chain_id, endpoint = %endpoint, error = %error, "endpoint failed");
        self.health.mark_failed(endpoint, error.to_string());
        metrics::inc_endpoint_failure(metrics::chain_label(&self.catalogs, chain_id));
    }

    /// Snapshot of endpoints inside their failure window
    pub fn health_records(&self) -> Vec<HealthRecord> {
        self.health.records()
    }

    /// Snapshot of cached capability verdicts
    pub fn capability_records(&self) -> Vec<CapabilityRecord> {
        self.capabilities.records()
    }

    /// Statistics of every cache the engine owns
    pub fn stats(&self) -> Vec<CacheStats> {
        vec![
            self.health.cache().stats(),
            self.capabilities.cache().stats(),
            self.gas_prices.stats(),
        ]
    }

    /// Alias registry, for table refreshes
    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    /// Endpoint catalogs, for snapshot refreshes
    pub fn catalogs(&self) -> &EndpointCatalogs {
        &self.catalogs
    }

    /// Health cache
    pub fn health_cache(&self) -> &HealthCache {
        &self.health
    }

    /// Capability cache
    pub fn capability_cache(&self) -> &CapabilityCache {
        &self.capabilities
    }

    /// Gas price cache
    pub fn gas_price_cache(&self) -> &TtlCache<Endpoint, String> {
        &self.gas_prices
    }

    /// Probe implementation
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Active configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

fn outcome<T>(result: &ResolverResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_options_map_to_probes() {
        assert!(SelectOptions::default().capability_probes().is_empty());

        let methods: Vec<String> = SelectOptions::default()
            .with_tx_support()
            .with_methods()
            .capability_probes()
            .iter()
            .map(|probe| probe.method().to_string())
            .collect();
        assert_eq!(
            methods,
            ["eth_sendRawTransaction", "eth_getBalance", "eth_gasPrice", "eth_estimateGas"]
        );
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = ResolverConfig {
            proxy_timeout_multiplier: 0,
            ..ResolverConfig::for_testing()
        };
        assert!(matches!(
            SelectionEngine::new(config),
            Err(ResolverError::Config { .. })
        ));
    }

    #[test]
    fn list_aliases_for_chain_and_all() {
        let engine = SelectionEngine::new(ResolverConfig::for_testing()).unwrap();

        let table = engine.list_aliases(Some("ETH")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[&ChainId::from(1)].len(), 3);

        assert!(engine.list_aliases(None).unwrap().len() >= 7);
        assert!(matches!(
            engine.list_aliases(Some("31337")),
            Err(ResolverError::AliasesNotFound { .. })
        ));
        assert!(matches!(
            engine.list_aliases(Some(" ")),
            Err(ResolverError::InvalidChainId { .. })
        ));
    }
}
