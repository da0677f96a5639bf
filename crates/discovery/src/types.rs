use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use holofleet_protocol::constants::{
    DEFAULT_PORT, IDENTIFY_TIMEOUT, LIVENESS_TIMEOUT, PROBE_TIMEOUT,
};
use serde::{Deserialize, Serialize};

/// A unit that completed the protocol handshake during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub device_id: String,
    pub id_source: IdSource,
}

impl DiscoveredDevice {
    /// Returns `ip:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Where a discovered identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    /// The unit answered `GET_ID`.
    Reported,
    /// `GET_ID` timed out; the identifier was derived from the address.
    Synthesized,
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSource::Reported => write!(f, "reported"),
            IdSource::Synthesized => write!(f, "synthesized"),
        }
    }
}

/// Timeouts and port used by a scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Port probed in phase B.
    pub port: u16,
    /// Bound on a single liveness probe (T1).
    pub liveness_timeout: Duration,
    /// Connect and `PING` reply timeout (T2).
    pub probe_timeout: Duration,
    /// `GET_ID` reply timeout (T3).
    pub identify_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            liveness_timeout: LIVENESS_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
            identify_timeout: IDENTIFY_TIMEOUT,
        }
    }
}
