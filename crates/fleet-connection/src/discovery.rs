//! Network discovery methods for [`FleetManager`].

use std::collections::HashSet;

use tracing::{info, warn};

use holofleet_discovery::{DeviceProbe, DiscoveredDevice, DiscoveryError, LivenessProbe, Scanner};
use holofleet_protocol::DeviceRecord;

use crate::error::RegistryError;
use crate::manager::FleetManager;
use crate::ws_client::Connector;

impl<C: Connector> FleetManager<C> {
    /// Scans `ip_prefix` and counts the units found.
    ///
    /// The registry is not touched; see [`adopt`](Self::adopt).
    pub async fn discover<L: LivenessProbe, P: DeviceProbe>(
        &self,
        scanner: &Scanner<L, P>,
        ip_prefix: &str,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let devices = scanner.scan(ip_prefix).await?;
        self.stats.record_discovered(devices.len() as u64);
        Ok(devices)
    }

    /// Registers discovered units that are not yet known, using their
    /// identifier as nickname.
    ///
    /// A unit is known when its identifier or nickname is already in the
    /// registry. Returns the records that were added.
    pub async fn adopt(&self, devices: &[DiscoveredDevice]) -> Vec<DeviceRecord> {
        let known: HashSet<String> = self
            .list()
            .await
            .into_iter()
            .flat_map(|r| [r.nickname, r.device_id])
            .collect();

        let mut added = Vec::new();
        for dev in devices.iter().filter(|d| !known.contains(&d.device_id)) {
            match self
                .add(&dev.device_id, &dev.device_id, &dev.ip.to_string(), dev.port)
                .await
            {
                Ok(record) => added.push(record),
                Err(RegistryError::DuplicateNickname(_)) => {}
                Err(e) => warn!(ip = %dev.ip, error = %e, "could not register discovered unit"),
            }
        }
        info!(found = devices.len(), added = added.len(), "discovered units adopted");
        added
    }
}
