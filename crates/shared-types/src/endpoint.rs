// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! RPC endpoint identity
//!
//! An [`Endpoint`] is the URL of a JSON-RPC node. It has no mutable state; two endpoints are the
//! same endpoint exactly when their URL strings are equal, so the value is cheap to clone and is
//! used directly as a cache key.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use url::Url;

/// URL of a JSON-RPC node serving one chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    /// Parse and validate an endpoint URL
    ///
    /// The input is trimmed; identity is the trimmed string as supplied, not a re-serialized
    /// form of the parsed URL.
    ///
    /// # Errors
    ///
    /// Returns an [`EndpointParseError`] if the input is empty, is not a URL, or does not use
    /// the `http`/`https` scheme.
    pub fn parse(input: &str) -> Result<Self, EndpointParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EndpointParseError::Empty);
        }

        let url = Url::parse(trimmed).map_err(|source| EndpointParseError::InvalidUrl {
            url: trimmed.to_string(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => Ok(Self(Arc::from(trimmed))),
            scheme => Err(EndpointParseError::UnsupportedScheme {
                url: trimmed.to_string(),
                scheme: scheme.to_string(),
            }),
        }
    }

    /// Returns the endpoint URL
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the host portion of the URL, for log output that should not leak API keys
    /// embedded in paths
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.0)
            .ok()
            .and_then(|url| url.host_str().map(ToString::to_string))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0.to_string()
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error type for endpoint parsing
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum EndpointParseError {
    /// Empty input
    #[error("endpoint URL must not be empty")]
    Empty,

    /// Input is not a URL
    #[error("invalid endpoint URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Scheme other than http/https
    #[error("unsupported scheme '{scheme}' in endpoint URL {url}")]
    UnsupportedScheme { url: String, scheme: String },
}
