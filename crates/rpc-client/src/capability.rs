// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Capability probe payloads
//!
//! A capability probe exercises one RPC method with a controlled payload that cannot change
//! chain state. State-changing methods get a deliberately malformed input: an endpoint that
//! serves the method answers with a decoding error, which [`crate::classify`] reads as
//! "supported".

use alloy_primitives::Address;
use serde_json::{Value, json};

/// Deliberately undecodable raw transaction
const MALFORMED_RAW_TRANSACTION: &str = "0x0123";

/// A single capability probe: a method and the payload used to exercise it
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityProbe {
    method: String,
    params: Value,
    expects_quantity: bool,
}

impl CapabilityProbe {
    /// Create a probe for an arbitrary method
    ///
    /// When `expects_quantity` is set, a successful response must carry a hex quantity result
    /// or the endpoint is treated as malfunctioning.
    pub fn new(method: impl Into<String>, params: Value, expects_quantity: bool) -> Self {
        Self {
            method: method.into(),
            params,
            expects_quantity,
        }
    }

    /// `eth_sendRawTransaction` with an undecodable payload
    pub fn send_raw_transaction() -> Self {
        Self::new(
            "eth_sendRawTransaction",
            json!([MALFORMED_RAW_TRANSACTION]),
            false,
        )
    }

    /// `eth_getBalance` of the zero address at the latest block
    pub fn get_balance() -> Self {
        Self::new(
            "eth_getBalance",
            json!([Address::ZERO.to_string(), "latest"]),
            true,
        )
    }

    /// `eth_gasPrice`
    pub fn gas_price() -> Self {
        Self::new("eth_gasPrice", json!([]), false)
    }

    /// `eth_estimateGas` for a one-wei transfer between zero addresses
    pub fn estimate_gas() -> Self {
        let zero = Address::ZERO.to_string();
        Self::new(
            "eth_estimateGas",
            json!([{ "from": zero, "to": zero, "value": "0x1" }]),
            false,
        )
    }

    /// Probes required before an endpoint is handed out for transaction submission
    pub fn transaction_support() -> Vec<Self> {
        vec![Self::send_raw_transaction()]
    }

    /// Probes covering the common read methods wallets rely on
    pub fn standard_methods() -> Vec<Self> {
        vec![Self::get_balance(), Self::gas_price(), Self::estimate_gas()]
    }

    /// Method name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request parameters
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Whether a successful response must carry a hex quantity
    pub fn expects_quantity(&self) -> bool {
        self.expects_quantity
    }
}
