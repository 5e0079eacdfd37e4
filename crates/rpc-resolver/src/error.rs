// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! Request-level failures of the resolution engine. Per-candidate failures
//! ([`rpc_client::ProbeError`]) never surface here directly: they are absorbed by the failover
//! loop, and only exhaustion of the candidate list is reported to the caller.

use reqwest::StatusCode;
use shared_types::{ChainId, ChainIdError, Endpoint};
use thiserror::Error;

/// Errors surfaced to callers of the resolution engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// The chain id or alias was empty
    #[error("Invalid chain id {input:?}: {source}")]
    InvalidChainId {
        /// Raw input as received
        input: String,
        /// Underlying validation error
        #[source]
        source: ChainIdError,
    },

    /// Neither catalog lists any endpoint for the chain
    #[error("No RPC endpoints configured for chain {chain_id}")]
    NoEndpointsConfigured {
        /// Normalized chain id
        chain_id: ChainId,
    },

    /// Every configured endpoint is inside its failure window
    #[error("All {excluded} RPC endpoints for chain {chain_id} failed recently")]
    AllEndpointsExcluded {
        /// Normalized chain id
        chain_id: ChainId,
        /// Number of excluded endpoints
        excluded: usize,
    },

    /// Every eligible endpoint was tried and none succeeded
    #[error("No available RPC endpoint for chain {chain_id} after {} attempts: {}", attempts.len(), attempts.join("; "))]
    AllEndpointsUnavailable {
        /// Normalized chain id
        chain_id: ChainId,
        /// One line per attempted candidate
        attempts: Vec<String>,
    },

    /// A follow-up call on the selected endpoint failed
    #[error("Call to {endpoint} failed: {message}")]
    EndpointCallFailed {
        /// Endpoint that was called
        endpoint: Endpoint,
        /// Failure description
        message: String,
    },

    /// No aliases are registered for the chain
    #[error("No aliases found for chain {chain_id}")]
    AliasesNotFound {
        /// Normalized chain id
        chain_id: ChainId,
    },

    /// The caller abandoned the request before it completed
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Metrics could not be rendered
    #[error("Metrics error: {message}")]
    Metrics {
        /// Error message
        message: String,
    },
}

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, ResolverError>;

impl ResolverError {
    /// Build an `InvalidChainId` error for the given input
    pub fn invalid_chain_id(input: impl Into<String>, source: ChainIdError) -> Self {
        Self::InvalidChainId {
            input: input.into(),
            source,
        }
    }

    /// Build a `Config` error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// HTTP status a front end should answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidChainId { .. } => StatusCode::BAD_REQUEST,
            Self::AliasesNotFound { .. } => StatusCode::NOT_FOUND,
            Self::NoEndpointsConfigured { .. }
            | Self::AllEndpointsExcluded { .. }
            | Self::AllEndpointsUnavailable { .. }
            | Self::EndpointCallFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Self::Config { .. } | Self::Metrics { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidChainId { .. } => "invalid_chain_id",
            Self::NoEndpointsConfigured { .. } => "no_endpoints",
            Self::AllEndpointsExcluded { .. } => "all_excluded",
            Self::AllEndpointsUnavailable { .. } => "all_unavailable",
            Self::EndpointCallFailed { .. } => "call_failed",
            Self::AliasesNotFound { .. } => "aliases_not_found",
            Self::Cancelled => "cancelled",
            Self::Config { .. } => "config",
            Self::Metrics { .. } => "metrics",
        }
    }

    /// Whether the caller sent bad input
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Whether no viable candidate was found
    pub fn is_service_unavailable(&self) -> bool {
        self.status_code() == StatusCode::SERVICE_UNAVAILABLE
    }

    /// JSON error body in the `{"error", "status"}` shape
    pub fn to_json_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "status": self.status_code().as_u16(),
        })
    }
}
