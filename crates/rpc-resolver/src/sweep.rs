// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Background health sweep
//!
//! Lazy expiry already keeps selection correct; the sweep only speeds recovery up. Every
//! `check_interval` it re-probes each endpoint listed in either catalog, clears the failure
//! record of endpoints that answer again, marks the ones that do not, and prunes expired cache
//! entries.

use std::{collections::HashSet, sync::Arc, time::Duration};

use rpc_client::RpcProbe;
use serde::{Deserialize, Serialize};
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{engine::SelectionEngine, metrics};

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Endpoints probed
    pub probed: usize,
    /// Previously failed endpoints that answered again
    pub recovered: usize,
    /// Endpoints that failed their probe
    pub failed: usize,
    /// Expired entries removed from the caches
    pub expired_pruned: usize,
}

/// Periodic re-probe of every catalogued endpoint
#[derive(Debug)]
pub struct HealthSweeper<P> {
    engine: Arc<SelectionEngine<P>>,
    interval: Duration,
}

impl<P: RpcProbe + 'static> HealthSweeper<P> {
    /// Create a sweeper running every `check_interval` of the engine's configuration
    pub fn new(engine: Arc<SelectionEngine<P>>) -> Self {
        let interval = engine.config().check_interval;
        Self { engine, interval }
    }

    /// Override the sweep period
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one pass over every endpoint in either catalog
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut seen = HashSet::new();

        for (chain_id, candidates) in self.engine.catalogs().all_candidates() {
            for endpoint in candidates {
                if !seen.insert(endpoint.clone()) {
                    continue;
                }
                report.probed += 1;

                match self.engine.probe().check_availability(&endpoint).await {
                    Ok(block) => {
                        if self.engine.health_cache().clear(&endpoint) {
                            info!(endpoint = %endpoint, block = %block, "endpoint recovered");
                            report.recovered += 1;
                        }
                    }
                    Err(e) => {
                        warn!(chain_id = %chain_id, endpoint = %endpoint, error = %e, "sweep probe failed");
                        self.engine
                            .health_cache()
                            .mark_failed(&endpoint, e.to_string());
                        metrics::inc_endpoint_failure(chain_id.as_str());
                        report.failed += 1;
                    }
                }
            }
        }

        report.expired_pruned = self.engine.health_cache().cleanup_expired()
            + self.engine.capability_cache().cleanup_expired()
            + self.engine.gas_price_cache().cleanup_expired();

        debug!(
            probed = report.probed,
            recovered = report.recovered,
            failed = report.failed,
            expired_pruned = report.expired_pruned,
            "health sweep finished"
        );
        report
    }

    /// Sweep on every tick until `token` is cancelled
    ///
    /// The first pass runs immediately. A pass in progress is abandoned on cancellation.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.interval.as_millis(),
            "health sweep started"
        );

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                () = token.cancelled() => break,
                report = self.sweep_once() => {
                    if report.recovered > 0 || report.failed > 0 {
                        info!(
                            recovered = report.recovered,
                            failed = report.failed,
                            "health sweep changed endpoint state"
                        );
                    }
                }
            }
        }

        info!("health sweep stopped");
    }

    /// Run the sweep on a background task
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }
}
