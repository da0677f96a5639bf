//! Network discovery for display units.
//!
//! A scan runs in two phases over a /24 prefix: a liveness sweep of every
//! host suffix, then a protocol handshake against each live address.

pub mod liveness;
pub mod network;
pub mod probe;
pub mod scanner;
pub mod types;

pub use liveness::{Liveness, LivenessProbe, PingProbe, TcpProbe};
pub use network::{default_ip_prefix, get_local_ips, host_addresses, parse_prefix};
pub use probe::{DeviceProbe, ProbeError, ProbeStage, WsProbe};
pub use scanner::Scanner;
pub use types::{DiscoveredDevice, IdSource, ScanConfig};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("invalid IP prefix {0:?}: expected three octets like 192.168.1")]
    InvalidPrefix(String),
}
