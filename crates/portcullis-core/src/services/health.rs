//! Per-upstream health aggregation, refreshed by a background prober.
//!
//! One probe per upstream runs concurrently via `buffer_unordered` on each
//! tick of an interval loop owned by [`HealthAggregator`] itself
//! (`tokio::spawn` + `tokio::time::interval`), since the gateway has exactly
//! one fixed set of upstreams for its whole lifetime.

use crate::models::route_rule::Services;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Probe timed out, connection refused, or otherwise unreachable — not a
    /// confirmed failure response, so this is the softer of the two
    /// non-healthy states. This Healthy/Degraded/Unhealthy split (rather than
    /// a flat healthy/unhealthy boolean) is the implementer's resolution of
    /// an underspecified distinction; see DESIGN.md.
    Degraded,
    /// The upstream responded, but not with a healthy status code.
    Unhealthy,
}

impl HealthStatus {
    fn worse_of(a: HealthStatus, b: HealthStatus) -> HealthStatus {
        use HealthStatus::*;
        match (a, b) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Healthy,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthSnapshot {
    pub upstream: String,
    pub status: HealthStatus,
    pub last_checked: chrono::DateTime<chrono::Utc>,
}

pub struct HealthAggregator {
    client: reqwest::Client,
    services: Services,
    snapshots: DashMap<String, HealthSnapshot>,
    unhealthy_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(services: Services, unhealthy_timeout: Duration) -> Arc<Self> {
        let client = reqwest::Client::builder()
            .timeout(unhealthy_timeout)
            .build()
            .unwrap_or_default();

        let snapshots = DashMap::new();
        let now = chrono::Utc::now();
        for name in services.keys() {
            snapshots.insert(
                name.clone(),
                HealthSnapshot { upstream: name.clone(), status: HealthStatus::Healthy, last_checked: now },
            );
        }

        Arc::new(Self { client, services, snapshots, unhealthy_timeout })
    }

    /// Spawns the background prober, looping every `check_interval` for the
    /// life of the process.
    pub fn spawn_background_prober(self: &Arc<Self>, check_interval: Duration) {
        let aggregator = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_interval);
            loop {
                interval.tick().await;
                aggregator.probe_all().await;
            }
        });
    }

    /// Runs one synchronous round of probes across every configured
    /// upstream, concurrency-bounded via `buffer_unordered`.
    pub async fn probe_all(&self) {
        let concurrency = self.services.len().max(1);
        stream::iter(self.services.iter())
            .map(|(name, base_url)| {
                let client = self.client.clone();
                let timeout = self.unhealthy_timeout;
                async move { (name.clone(), probe_one(&client, base_url, timeout).await) }
            })
            .buffer_unordered(concurrency)
            .for_each(|(name, status)| {
                self.snapshots.insert(
                    name.clone(),
                    HealthSnapshot { upstream: name.clone(), status, last_checked: chrono::Utc::now() },
                );
                if status != HealthStatus::Healthy {
                    debug!("upstream '{}' probed as {:?}", name, status);
                }
                futures_util::future::ready(())
            })
            .await;
    }

    pub fn snapshot(&self, upstream: &str) -> Option<HealthSnapshot> {
        self.snapshots.get(upstream).map(|s| s.clone())
    }

    pub fn all_snapshots(&self) -> Vec<HealthSnapshot> {
        self.snapshots.iter().map(|s| s.value().clone()).collect()
    }

    /// Worst status across every upstream, or `Healthy` if there are none.
    pub fn aggregate_status(&self) -> HealthStatus {
        self.snapshots
            .iter()
            .map(|s| s.status)
            .fold(HealthStatus::Healthy, HealthStatus::worse_of)
    }

    /// `true` unless at least one upstream is `Unhealthy`; `Degraded`
    /// upstreams don't fail readiness, only liveness-adjacent aggregate health.
    pub fn is_ready(&self) -> bool {
        !self.snapshots.iter().any(|s| s.status == HealthStatus::Unhealthy)
    }
}

async fn probe_one(client: &reqwest::Client, base_url: &str, timeout: Duration) -> HealthStatus {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    match client.get(&url).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => HealthStatus::Healthy,
        Ok(response) => {
            warn!("upstream health probe to '{}' returned {}", url, response.status());
            HealthStatus::Unhealthy
        }
        Err(e) => {
            debug!("upstream health probe to '{}' unreachable: {}", url, e);
            HealthStatus::Degraded
        }
    }
}
