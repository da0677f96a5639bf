//! Two-phase scan over a /24 prefix.

use std::net::Ipv4Addr;

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::DiscoveryError;
use crate::liveness::LivenessProbe;
use crate::network::{host_addresses, parse_prefix};
use crate::probe::DeviceProbe;
use crate::types::DiscoveredDevice;

/// Discovers units by sweeping a prefix, then probing live hosts.
///
/// Every probe within a phase runs concurrently; a failure on one address
/// never affects another. Concurrency is unbounded (at most 254 probes per
/// phase).
pub struct Scanner<L, P> {
    liveness: L,
    probe: P,
}

impl<L: LivenessProbe, P: DeviceProbe> Scanner<L, P> {
    pub fn new(liveness: L, probe: P) -> Self {
        Self { liveness, probe }
    }

    /// Runs both phases and returns the units that completed the handshake,
    /// ordered by address.
    pub async fn scan(&self, ip_prefix: &str) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let prefix = parse_prefix(ip_prefix)?;
        info!(prefix = %ip_prefix, "network scan started");

        let live = self.sweep(&host_addresses(prefix)).await;
        info!(live = live.len(), "liveness sweep finished");

        let devices = self.identify(&live).await;
        info!(found = devices.len(), "network scan finished");
        Ok(devices)
    }

    /// Phase A: returns the addresses that answered, in input order.
    pub async fn sweep(&self, hosts: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
        let results = join_all(hosts.iter().map(|&ip| async move {
            self.liveness.is_alive(ip).await.then_some(ip)
        }))
        .await;
        results.into_iter().flatten().collect()
    }

    /// Phase B: probes each live address; failures are dropped.
    pub async fn identify(&self, live: &[Ipv4Addr]) -> Vec<DiscoveredDevice> {
        let results = join_all(live.iter().map(|&ip| self.probe.probe(ip))).await;

        let mut devices: Vec<DiscoveredDevice> = results
            .into_iter()
            .zip(live)
            .filter_map(|(result, ip)| match result {
                Ok(dev) => Some(dev),
                Err(e) => {
                    debug!(%ip, error = %e, "address excluded");
                    None
                }
            })
            .collect();
        devices.sort_by_key(|d| d.ip);
        devices
    }
}
