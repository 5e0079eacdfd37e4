// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the RPC resolver workspace
//!
//! This crate provides the value types that are shared across the other crates in the
//! workspace (chain identifiers, aliases and endpoint URLs), avoiding circular dependencies.

pub mod chains;
pub mod endpoint;

pub use chains::{Alias, ChainId, ChainIdError, DEFAULT_ALIASES};
pub use endpoint::{Endpoint, EndpointParseError};
