// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Endpoint health cache
//!
//! A per-endpoint circuit breaker with a single open/closed state. An endpoint that failed is
//! excluded from selection until strictly more than the retry timeout has elapsed since the
//! failure; after that it is tried again as if nothing had happened. There is no half-open
//! state beyond that natural retry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::Endpoint;
use tracing::{debug, info};

use crate::cache::{DEFAULT_MAX_ENTRIES, TtlCache};

/// Most recent failure of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Endpoint that failed
    pub endpoint: Endpoint,
    /// When the failure was recorded
    pub failed_at: DateTime<Utc>,
    /// Failure description
    pub reason: String,
}

/// Failure window per endpoint
#[derive(Debug)]
pub struct HealthCache {
    failures: TtlCache<Endpoint, String>,
}

impl HealthCache {
    /// Create a health cache whose failure window is `retry_timeout`
    pub fn new(retry_timeout: Duration) -> Self {
        Self::with_capacity(retry_timeout, DEFAULT_MAX_ENTRIES)
    }

    /// Create a health cache with a custom capacity bound
    ///
    /// Reaching the bound only triggers a cleanup of expired records. A fresh failure is never
    /// evicted, so an endpoint stays excluded for its whole window; the number of records is
    /// bounded by the catalog size instead.
    pub fn with_capacity(retry_timeout: Duration, max_entries: usize) -> Self {
        Self {
            failures: TtlCache::with_settings("health", retry_timeout, max_entries)
                .without_fresh_eviction(),
        }
    }

    /// Whether the endpoint may be selected now
    pub fn is_eligible(&self, endpoint: &Endpoint) -> bool {
        !self.failures.contains_fresh(endpoint)
    }

    /// Record a failure, replacing any earlier record for the same endpoint
    pub fn mark_failed(&self, endpoint: &Endpoint, reason: impl Into<String>) {
        let reason = reason.into();
        info!(
            endpoint = %endpoint,
            reason = %reason,
            retry_after_ms = self.failures.ttl().as_millis(),
            "endpoint marked as failed"
        );
        self.failures.insert(endpoint.clone(), reason);
    }

    /// Forget a failure, making the endpoint eligible immediately
    ///
    /// Returns `true` if a record was removed.
    pub fn clear(&self, endpoint: &Endpoint) -> bool {
        let removed = self.failures.remove(endpoint).is_some();
        if removed {
            debug!(endpoint = %endpoint, "endpoint failure cleared");
        }
        removed
    }

    /// The current failure record, if the endpoint is excluded
    pub fn record(&self, endpoint: &Endpoint) -> Option<HealthRecord> {
        self.failures
            .get_entry(endpoint)
            .map(|entry| HealthRecord {
                endpoint: endpoint.clone(),
                failed_at: entry.recorded_at,
                reason: entry.value,
            })
    }

    /// All current failure records
    pub fn records(&self) -> Vec<HealthRecord> {
        let mut records: Vec<HealthRecord> = self
            .failures
            .snapshot()
            .into_iter()
            .map(|(endpoint, entry)| HealthRecord {
                endpoint,
                failed_at: entry.recorded_at,
                reason: entry.value,
            })
            .collect();
        records.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        records
    }

    /// Drop expired records
    pub fn cleanup_expired(&self) -> usize {
        self.failures.cleanup_expired()
    }

    /// Failure window length
    pub fn retry_timeout(&self) -> Duration {
        self.failures.ttl()
    }

    /// Underlying cache, for statistics
    pub fn cache(&self) -> &TtlCache<Endpoint, String> {
        &self.failures
    }
}
