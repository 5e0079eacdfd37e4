// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Blockchain chain identifiers and aliases
//!
//! Chain identifiers are open: any non-empty string is accepted as a canonical id once it has
//! been trimmed and lower-cased. Human-friendly aliases ("eth", "MATIC", ...) are resolved to a
//! canonical id by the alias registry in `rpc-resolver`; this module only defines the value
//! types and the built-in default alias table.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Built-in alias table, keyed by canonical chain id
///
/// Ordering within each entry is preserved for display and reverse lookup.
pub const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("1", &["ethereum", "eth", "mainnet"]),
    ("56", &["binance", "bsc", "bnb"]),
    ("137", &["polygon", "matic"]),
    ("42161", &["arbitrum", "arb"]),
    ("10", &["optimism", "op"]),
    ("8453", &["base"]),
    ("43114", &["avalanche", "avax"]),
];

/// Canonical identifier of a blockchain network (e.g. `"1"` for Ethereum mainnet)
///
/// A `ChainId` is always trimmed, lower-cased and non-empty. It does not assert that the chain
/// exists; unknown identifiers are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(Box<str>);

impl ChainId {
    /// Create a canonical chain id from raw input
    ///
    /// # Errors
    ///
    /// Returns [`ChainIdError::Empty`] if the input is empty or whitespace only.
    pub fn new(input: &str) -> Result<Self, ChainIdError> {
        let normalized = normalize_key(input)?;
        Ok(Self(normalized.into_boxed_str()))
    }

    /// Returns the canonical id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric chain id, if the canonical form is a decimal number
    pub fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id.to_string().into_boxed_str())
    }
}

impl AsRef<str> for ChainId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ChainIdVisitor;

        impl serde::de::Visitor<'_> for ChainIdVisitor {
            type Value = ChainId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "a non-empty chain id as a number (137) or string (\"137\")"
                )
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ChainId::from(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                ChainId::new(value).map_err(|_| {
                    E::invalid_value(serde::de::Unexpected::Str(value), &"a non-empty chain id")
                })
            }
        }

        deserializer.deserialize_any(ChainIdVisitor)
    }
}

/// Human-friendly alternate name for a chain
///
/// Aliases keep their original spelling for display; lookups go through [`Alias::key`], which
/// is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Alias {
    display: Box<str>,
    key: Box<str>,
}

impl Alias {
    /// Create an alias from raw input
    ///
    /// # Errors
    ///
    /// Returns [`ChainIdError::Empty`] if the input is empty or whitespace only.
    pub fn new(input: &str) -> Result<Self, ChainIdError> {
        let key = normalize_key(input)?;
        Ok(Self {
            display: input.trim().into(),
            key: key.into_boxed_str(),
        })
    }

    /// Returns the alias as supplied, trimmed
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Returns the lower-cased lookup key
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for Alias {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Alias {}

impl std::hash::Hash for Alias {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl TryFrom<String> for Alias {
    type Error = ChainIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Alias> for String {
    fn from(alias: Alias) -> Self {
        alias.display.into_string()
    }
}

/// Error type for chain id and alias construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainIdError {
    /// Input was empty after trimming
    #[error("chain id must not be empty")]
    Empty,
}

fn normalize_key(input: &str) -> Result<String, ChainIdError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ChainIdError::Empty);
    }
    Ok(trimmed.to_lowercase())
}
