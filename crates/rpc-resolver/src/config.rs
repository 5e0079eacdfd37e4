// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Resolver configuration
//!
//! Settings are layered: built-in defaults, then an optional `resolver.json` file, then process
//! environment variables. Environment variables are matched by their lower-cased name, so
//! `RETRY_TIMEOUT` sets `retry_timeout`. Durations are given in milliseconds.

use std::{fmt, time::Duration};

use anyhow::{Result, ensure};
use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use rpc_client::{DEFAULT_UNSUPPORTED_PHRASES, ErrorClassifier};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::info;

use crate::{
    cache::DEFAULT_MAX_ENTRIES,
    error::{ResolverError, ResolverResult},
};

/// Longest accepted probe deadline
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Optional configuration file, relative to the working directory
pub const CONFIG_FILE: &str = "resolver.json";

/// Default HTTP user agent for outbound probes
pub const DEFAULT_USER_AGENT: &str = concat!("rpc-resolver/", env!("CARGO_PKG_VERSION"));

/// How the eligible candidates of a chain are ordered before probing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Always start from the first candidate (priority first)
    #[default]
    Ordered,
    /// Rotate the starting candidate on every call
    RoundRobin,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Ordered => write!(f, "ordered"),
            SelectionPolicy::RoundRobin => write!(f, "round_robin"),
        }
    }
}

/// Resolution engine settings
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// How long a failure excludes an endpoint, and how long capability verdicts are trusted
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_timeout: Duration,
    /// Period of the optional background health sweep
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub check_interval: Duration,
    /// Deadline for a single probe
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    /// Forward deadline as a multiple of the probe deadline
    pub proxy_timeout_multiplier: u32,
    /// How long a fetched gas price is reused
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub gas_price_cache_timeout: Duration,
    /// Whether the embedding service should run the background health sweep
    pub sweep_enabled: bool,
    /// Candidate ordering policy
    pub selection_policy: SelectionPolicy,
    /// Error message fragments that mean "method unsupported"
    pub unsupported_phrases: Vec<String>,
    /// Capacity bound of every cache
    pub cache_max_entries: usize,
    /// HTTP user agent for probes and forwards
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            retry_timeout: Duration::from_millis(300_000),
            check_interval: Duration::from_millis(900_000),
            request_timeout: Duration::from_millis(5_000),
            proxy_timeout_multiplier: 2,
            gas_price_cache_timeout: Duration::from_millis(60_000),
            sweep_enabled: false,
            selection_policy: SelectionPolicy::Ordered,
            unsupported_phrases: DEFAULT_UNSUPPORTED_PHRASES
                .iter()
                .map(ToString::to_string)
                .collect(),
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Create configuration from environment variables and the optional configuration file
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Config` if configuration is invalid or cannot be loaded.
    pub fn from_env() -> ResolverResult<Self> {
        Self::load().map_err(|e| ResolverError::config(format!("failed to load configuration: {e}")))
    }

    /// Load configuration using the config crate with hierarchical sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. Configuration file (`resolver.json`)
    /// 3. Environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Self::environment());
        let config = Self::from_builder(builder)?;

        info!(
            retry_timeout_ms = config.retry_timeout.as_millis(),
            check_interval_ms = config.check_interval.as_millis(),
            request_timeout_ms = config.request_timeout.as_millis(),
            proxy_timeout_ms = config.proxy_timeout().as_millis(),
            selection_policy = %config.selection_policy,
            sweep_enabled = config.sweep_enabled,
            "resolver configuration loaded"
        );
        Ok(config)
    }

    /// Unprefixed environment variables, with `UNSUPPORTED_PHRASES` split on commas
    fn environment() -> Environment {
        Environment::default()
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("unsupported_phrases")
    }

    fn from_builder(builder: config::ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid resolver configuration: {e}")))?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.request_timeout.is_zero(),
            "request_timeout must be greater than 0"
        );
        ensure!(
            self.request_timeout <= MAX_REQUEST_TIMEOUT,
            "request_timeout cannot exceed {} ms",
            MAX_REQUEST_TIMEOUT.as_millis()
        );
        ensure!(
            !self.retry_timeout.is_zero(),
            "retry_timeout must be greater than 0"
        );
        ensure!(
            !self.check_interval.is_zero(),
            "check_interval must be greater than 0"
        );
        ensure!(
            self.proxy_timeout_multiplier >= 1,
            "proxy_timeout_multiplier must be at least 1"
        );
        ensure!(
            self.unsupported_phrases
                .iter()
                .any(|phrase| !phrase.trim().is_empty()),
            "unsupported_phrases must contain at least one phrase"
        );
        ensure!(
            self.cache_max_entries > 0,
            "cache_max_entries must be greater than 0"
        );
        Ok(())
    }

    /// Deadline for forwarding a client request
    pub fn proxy_timeout(&self) -> Duration {
        self.request_timeout
            .saturating_mul(self.proxy_timeout_multiplier)
    }

    /// Error classifier built from the configured phrases
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Config` if the phrase set cannot be compiled.
    pub fn classifier(&self) -> ResolverResult<ErrorClassifier> {
        ErrorClassifier::new(&self.unsupported_phrases)
            .map_err(|e| ResolverError::config(format!("invalid unsupported_phrases: {e}")))
    }

    /// Create configuration optimized for testing
    pub fn for_testing() -> Self {
        Self {
            retry_timeout: Duration::from_secs(60),
            check_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
            gas_price_cache_timeout: Duration::from_secs(60),
            cache_max_entries: 1_000,
            user_agent: "rpc-resolver-test".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_json(json: &str) -> Result<ResolverConfig, ConfigError> {
        ResolverConfig::from_builder(
            Config::builder().add_source(File::from_str(json, FileFormat::Json)),
        )
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ResolverConfig::default();
        assert_eq!(config.retry_timeout, Duration::from_millis(300_000));
        assert_eq!(config.check_interval, Duration::from_millis(900_000));
        assert_eq!(config.request_timeout, Duration::from_millis(5_000));
        assert_eq!(config.proxy_timeout(), Duration::from_millis(10_000));
        assert_eq!(config.selection_policy, SelectionPolicy::Ordered);
        assert!(!config.sweep_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_source_yields_defaults() {
        assert_eq!(from_json("{}").unwrap(), ResolverConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_json(
            r#"{
                "retry_timeout": 1000,
                "request_timeout": 250,
                "proxy_timeout_multiplier": 4,
                "selection_policy": "round_robin",
                "unsupported_phrases": ["unknown method"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.retry_timeout, Duration::from_secs(1));
        assert_eq!(config.proxy_timeout(), Duration::from_secs(1));
        assert_eq!(config.selection_policy, SelectionPolicy::RoundRobin);
        assert_eq!(config.unsupported_phrases, ["unknown method"]);
        assert_eq!(config.check_interval, Duration::from_millis(900_000));
    }

    #[test]
    fn environment_values_override_file() {
        let env = config::Map::from([
            ("RETRY_TIMEOUT".to_string(), "1234".to_string()),
            ("SELECTION_POLICY".to_string(), "round_robin".to_string()),
            ("SWEEP_ENABLED".to_string(), "true".to_string()),
            ("UNSUPPORTED_PHRASES".to_string(), "foo bar,baz".to_string()),
        ]);
        let config = ResolverConfig::from_builder(
            Config::builder()
                .add_source(File::from_str(
                    r#"{"retry_timeout": 1000, "request_timeout": 250}"#,
                    FileFormat::Json,
                ))
                .add_source(ResolverConfig::environment().source(Some(env))),
        )
        .unwrap();

        assert_eq!(config.retry_timeout, Duration::from_millis(1234));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.selection_policy, SelectionPolicy::RoundRobin);
        assert!(config.sweep_enabled);
        assert_eq!(config.unsupported_phrases, ["foo bar", "baz"]);
    }

    #[test]
    fn invalid_environment_value_is_rejected() {
        let env = config::Map::from([("REQUEST_TIMEOUT".to_string(), "0".to_string())]);
        let result = ResolverConfig::from_builder(
            Config::builder().add_source(ResolverConfig::environment().source(Some(env))),
        );
        assert!(result.is_err());
    }

    #[test]
    fn request_timeout_validation() {
        assert!(from_json(r#"{"request_timeout": 0}"#).is_err());
        assert!(from_json(r#"{"request_timeout": 300001}"#).is_err());
        assert!(from_json(r#"{"request_timeout": 1}"#).is_ok());
        assert!(from_json(r#"{"request_timeout": 300000}"#).is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        for json in [
            r#"{"retry_timeout": 0}"#,
            r#"{"check_interval": 0}"#,
            r#"{"proxy_timeout_multiplier": 0}"#,
            r#"{"unsupported_phrases": []}"#,
            r#"{"unsupported_phrases": ["  "]}"#,
            r#"{"cache_max_entries": 0}"#,
            r#"{"selection_policy": "random"}"#,
        ] {
            assert!(from_json(json).is_err(), "{json} should be rejected");
        }
    }

    #[test]
    fn classifier_uses_configured_phrases() {
        let config = ResolverConfig {
            unsupported_phrases: vec!["unknown method".to_string()],
            ..ResolverConfig::for_testing()
        };
        let classifier = config.classifier().unwrap();
        assert_eq!(
            classifier.classify("Unknown method eth_foo"),
            rpc_client::RpcErrorClass::Unsupported
        );
        assert_eq!(
            classifier.classify("method not found"),
            rpc_client::RpcErrorClass::Rejected
        );
    }

    #[test]
    fn selection_policy_display() {
        assert_eq!(SelectionPolicy::Ordered.to_string(), "ordered");
        assert_eq!(SelectionPolicy::RoundRobin.to_string(), "round_robin");
    }

    #[test]
    fn testing_config_is_valid() {
        assert!(ResolverConfig::for_testing().validate().is_ok());
    }
}
