// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Method capability cache
//!
//! Remembers, per endpoint and RPC method, whether the method is served. Verdicts share the
//! health cache's retry timeout: once stale they are forgotten and the method is probed again.
//! An unsupported method only disqualifies the endpoint for requests that need that method.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::Endpoint;
use tracing::debug;

use crate::cache::{DEFAULT_MAX_ENTRIES, TtlCache};

/// Cache key: endpoint plus method name
pub type CapabilityKey = (Endpoint, String);

/// Capability verdict for one endpoint and method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    /// Endpoint that was probed
    pub endpoint: Endpoint,
    /// Method that was probed
    pub method: String,
    /// Whether the method is served
    pub supported: bool,
    /// When the verdict was recorded
    pub checked_at: DateTime<Utc>,
}

/// Per-(endpoint, method) support verdicts
#[derive(Debug)]
pub struct CapabilityCache {
    verdicts: TtlCache<CapabilityKey, bool>,
}

impl CapabilityCache {
    /// Create a capability cache whose verdicts live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    /// Create a capability cache with a custom capacity bound
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            verdicts: TtlCache::with_settings("capability", ttl, max_entries),
        }
    }

    /// Known verdict, or `None` if unknown or stale
    pub fn check(&self, endpoint: &Endpoint, method: &str) -> Option<bool> {
        self.verdicts
            .get(&(endpoint.clone(), method.to_string()))
    }

    /// Whether the verdict is a fresh "unsupported", without counting as a cache read
    pub fn is_known_unsupported(&self, endpoint: &Endpoint, method: &str) -> bool {
        self.verdicts.peek(&(endpoint.clone(), method.to_string())) == Some(false)
    }

    /// Store a verdict, replacing any earlier one
    pub fn record(&self, endpoint: &Endpoint, method: &str, supported: bool) {
        debug!(endpoint = %endpoint, method, supported, "recorded method capability");
        self.verdicts
            .insert((endpoint.clone(), method.to_string()), supported);
    }

    /// All current verdicts, sorted by endpoint then method
    pub fn records(&self) -> Vec<CapabilityRecord> {
        let mut records: Vec<CapabilityRecord> = self
            .verdicts
            .snapshot()
            .into_iter()
            .map(|((endpoint, method), entry)| CapabilityRecord {
                endpoint,
                method,
                supported: entry.value,
                checked_at: entry.recorded_at,
            })
            .collect();
        records.sort_by(|a, b| (&a.endpoint, &a.method).cmp(&(&b.endpoint, &b.method)));
        records
    }

    /// Drop expired verdicts
    pub fn cleanup_expired(&self) -> usize {
        self.verdicts.cleanup_expired()
    }

    /// Underlying cache, for statistics
    pub fn cache(&self) -> &TtlCache<CapabilityKey, bool> {
        &self.verdicts
    }
}
