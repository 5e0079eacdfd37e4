// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Failover-aware JSON-RPC endpoint resolution
//!
//! Given a chain id or alias, this crate picks a currently healthy RPC endpoint for it, or
//! forwards a JSON-RPC body to one, favoring operator-supplied priority endpoints and avoiding
//! endpoints that failed recently.
//!
//! # Architecture
//!
//! - **Alias normalization**: [`aliases::AliasRegistry`] maps aliases to canonical chain ids
//! - **Candidate ordering**: [`catalog::EndpointCatalogs`] merges priority and general catalogs
//! - **Circuit breaker**: [`health::HealthCache`] excludes failed endpoints for `retry_timeout`
//! - **Method support**: [`capability::CapabilityCache`] remembers per-method verdicts
//! - **Probing**: [`http_probe::HttpProbeClient`] implements [`rpc_client::RpcProbe`]
//! - **Orchestration**: [`engine::SelectionEngine`] runs the failover loop
//! - **Recovery**: [`sweep::HealthSweeper`] optionally re-probes endpoints in the background
//!
//! All caches share the generic [`cache::TtlCache`] and expire lazily at read time. No state is
//! persisted; every engine starts empty.

pub mod aliases;
pub mod cache;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod http_probe;
pub mod metrics;
pub mod sweep;

pub use aliases::{AliasRegistry, AliasTable, default_alias_table, parse_alias_table};
pub use cache::{CacheStats, CachedEntry, TtlCache};
pub use capability::{CapabilityCache, CapabilityRecord};
pub use catalog::{CandidateList, Catalog, EndpointCatalogs, parse_catalog};
pub use config::{ResolverConfig, SelectionPolicy};
pub use engine::{GasPriceQuote, ProxyResponse, SelectOptions, SelectionEngine};
pub use error::{ResolverError, ResolverResult};
pub use health::{HealthCache, HealthRecord};
pub use http_probe::{HttpProbeClient, HttpProbeConfig};
pub use sweep::{HealthSweeper, SweepReport};
