// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! JSON-RPC 2.0 wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version string sent with every request
pub const JSONRPC_VERSION: &str = "2.0";

/// A single JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Method name, e.g. `eth_blockNumber`
    pub method: String,
    /// Positional parameters
    pub params: Value,
    /// Request id echoed back by the server
    pub id: u64,
}

impl JsonRpcRequest {
    /// Create a request with the given id
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// Error object carried in a failed JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code; providers are not consistent about these
    #[serde(default)]
    pub code: i64,
    /// Human-readable message, the only field the unsupported-method heuristic looks at
    #[serde(default)]
    pub message: String,
    /// Optional provider-specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A single JSON-RPC response
///
/// Servers disagree on whether `result` is omitted or `null` on error, so both fields are
/// optional and callers inspect `error` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, usually `"2.0"`
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Echoed request id
    #[serde(default)]
    pub id: Option<Value>,
    /// Call result on success
    #[serde(default)]
    pub result: Option<Value>,
    /// Error object on failure
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    /// Returns the result as a hex quantity string, if it is one
    pub fn hex_result(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(Value::as_str)
            .filter(|value| is_hex_quantity(value))
    }
}

/// Raw upstream answer to a forwarded request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardResponse {
    /// HTTP status code returned by the upstream node
    pub status: u16,
    /// Response body, passed back untouched
    pub body: Value,
}

/// Returns `true` for a `0x`-prefixed string with at least one hex digit
pub fn is_hex_quantity(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serialization() {
        let request = JsonRpcRequest::new(7, "eth_blockNumber", json!([]));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "eth_blockNumber", "params": [], "id": 7})
        );
    }

    #[test]
    fn response_with_error_object() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "the method eth_foo does not exist"}
        }))
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert!(response.result.is_none());
    }

    #[test]
    fn response_with_null_result_and_error() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "id": 1,
            "result": null,
            "error": {"message": "rate limited"}
        }))
        .unwrap();
        assert_eq!(response.hex_result(), None);
        assert_eq!(response.error.unwrap().code, 0);
    }

    #[test]
    fn hex_quantity_detection() {
        assert!(is_hex_quantity("0x1"));
        assert!(is_hex_quantity("0x12a05f200"));
        assert!(is_hex_quantity("0XFF"));
        assert!(!is_hex_quantity("0x"));
        assert!(!is_hex_quantity("12"));
        assert!(!is_hex_quantity("0xzz"));
        assert!(!is_hex_quantity(""));
    }

    #[test]
    fn hex_result_requires_string() {
        let response = JsonRpcResponse {
            jsonrpc: Some("2.0".to_string()),
            id: Some(json!(1)),
            result: Some(json!(12)),
            error: None,
        };
        assert_eq!(response.hex_result(), None);

        let response = JsonRpcResponse {
            result: Some(json!("0x10")),
            ..response
        };
        assert_eq!(response.hex_result(), Some("0x10"));
    }
}
