// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! JSON-RPC probe abstractions for endpoint resolution
//!
//! This crate defines the seam between the resolution engine and the network: the
//! [`RpcProbe`] trait, the per-candidate [`ProbeError`] taxonomy, JSON-RPC wire types, the
//! capability probe catalogue and the unsupported-method heuristic.
//!
//! # Core Abstractions
//!
//! - **`RpcProbe` Trait**: availability probe, capability probe, plain calls and raw
//!   forwarding against a single endpoint
//! - **Error Classification**: [`ProbeError::is_method_unsupported`] separates a
//!   method-scoped failure from an endpoint-scoped one
//! - **Heuristic**: [`classify_rpc_error`] decides "unsupported" vs. "rejected input"
//!
//! Implementations are stateless; any caching of probe outcomes belongs to the caller.

use serde_json::Value;
use shared_types::Endpoint;
use thiserror::Error;

pub mod capability;
pub mod classify;
pub mod jsonrpc;

pub use capability::CapabilityProbe;
pub use classify::{
    DEFAULT_UNSUPPORTED_PHRASES, ErrorClassifier, RpcErrorClass, classify_rpc_error,
};
pub use jsonrpc::*;

/// Network-facing operations against a single RPC endpoint
///
/// All operations carry their own deadline. Dropping a returned future abandons the call and
/// leaves no trace, which is what request cancellation relies on.
pub trait RpcProbe: Send + Sync {
    /// Check that the endpoint answers a cheap read call with a well-formed result
    ///
    /// Returns the reported block number as a hex quantity.
    ///
    /// # Errors
    ///
    /// Returns any [`ProbeError`] other than `MethodUnsupported` if the endpoint is unavailable.
    fn check_availability(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<String, ProbeError>> + Send;

    /// Check that the endpoint serves the method exercised by `probe`
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::MethodUnsupported`] if the error message classifies as
    /// unsupported, or another variant if the endpoint itself failed.
    fn check_capability(
        &self,
        endpoint: &Endpoint,
        probe: &CapabilityProbe,
    ) -> impl Future<Output = Result<(), ProbeError>> + Send;

    /// Perform a single JSON-RPC call and return its result
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Rpc`] if the endpoint answered with an error object, or another
    /// variant on transport failure.
    fn call(
        &self,
        endpoint: &Endpoint,
        method: &str,
        params: Value,
    ) -> impl Future<Output = Result<Value, ProbeError>> + Send;

    /// Forward an opaque request body and return the upstream answer untouched
    ///
    /// Any non-success status is an error, even a 4xx whose body is a JSON-RPC error caused by
    /// the request itself. Callers that fail over on errors will therefore exclude an endpoint
    /// for a client's malformed request; the body is never inspected to tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, timeout, non-success status, or a body that is
    /// not JSON.
    fn forward(
        &self,
        endpoint: &Endpoint,
        body: &Value,
    ) -> impl Future<Output = Result<ForwardResponse, ProbeError>> + Send;

    /// Get the name/identifier of this probe implementation
    fn name(&self) -> &'static str;
}

/// Failure of a single probe or forward against one endpoint
///
/// Every variant except [`ProbeError::MethodUnsupported`] means the endpoint is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ProbeError {
    /// Transport-level failure (connection refused, TLS, DNS, ...)
    #[error("HTTP request failed: {message}")]
    Http { message: String },

    /// Deadline exceeded
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Non-success HTTP status without a usable JSON-RPC body
    #[error("upstream returned HTTP status {status}")]
    Status { status: u16 },

    /// Body was not a well-formed JSON-RPC response, or the result failed validation
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Endpoint answered with a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Endpoint is up but does not serve the method
    #[error("method {method} is not supported: {message}")]
    MethodUnsupported { method: String, message: String },
}

impl ProbeError {
    /// Whether this failure is scoped to a method rather than the whole endpoint
    pub fn is_method_unsupported(&self) -> bool {
        matches!(self, Self::MethodUnsupported { .. })
    }

    /// Whether this failure means the endpoint itself is unavailable
    pub fn is_endpoint_unavailable(&self) -> bool {
        !self.is_method_unsupported()
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Rpc { .. } => "rpc_error",
            Self::MethodUnsupported { .. } => "unsupported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_scoping() {
        let unsupported = ProbeError::MethodUnsupported {
            method: "eth_sendRawTransaction".to_string(),
            message: "method not found".to_string(),
        };
        assert!(unsupported.is_method_unsupported());
        assert!(!unsupported.is_endpoint_unavailable());

        for error in [
            ProbeError::Http {
                message: "connection refused".to_string(),
            },
            ProbeError::Timeout { timeout_ms: 5000 },
            ProbeError::Status { status: 502 },
            ProbeError::InvalidResponse {
                message: "missing result".to_string(),
            },
            ProbeError::Rpc {
                code: -32000,
                message: "header not found".to_string(),
            },
        ] {
            assert!(error.is_endpoint_unavailable(), "{error} should be endpoint-scoped");
        }
    }

    #[test]
    fn probe_error_display() {
        let error = ProbeError::Timeout { timeout_ms: 5000 };
        assert_eq!(error.to_string(), "request timed out after 5000 ms");

        let error = ProbeError::Rpc {
            code: -32601,
            message: "method not found".to_string(),
        };
        assert_eq!(error.to_string(), "JSON-RPC error -32601: method not found");
        assert_eq!(error.kind(), "rpc_error");
    }
}
