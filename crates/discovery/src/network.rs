//! Local interface inspection and prefix handling.

use std::net::{IpAddr, Ipv4Addr};

use holofleet_protocol::constants::{DEFAULT_IP_PREFIX, HOST_SUFFIXES};

use crate::DiscoveryError;

/// Returns the local IPv4 addresses usable for scanning.
pub fn get_local_ips() -> Vec<Ipv4Addr> {
    let mut ips = Vec::new();

    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        return ips;
    };

    for iface in interfaces {
        if iface.is_loopback() {
            continue;
        }
        if let IpAddr::V4(ipv4) = iface.ip() {
            if ipv4.is_loopback() {
                continue;
            }
            // Skip link-local (169.254.x.x / APIPA)
            if ipv4.is_link_local() {
                continue;
            }
            ips.push(ipv4);
        }
    }

    ips
}

/// Returns the /24 prefix of the first usable interface, or
/// `192.168.1` when none is found.
pub fn default_ip_prefix() -> String {
    get_local_ips()
        .first()
        .map(|ip| {
            let [a, b, c, _] = ip.octets();
            format!("{a}.{b}.{c}")
        })
        .unwrap_or_else(|| DEFAULT_IP_PREFIX.to_string())
}

/// Parses a prefix such as `192.168.1` (a trailing dot is tolerated).
pub fn parse_prefix(prefix: &str) -> Result<[u8; 3], DiscoveryError> {
    let invalid = || DiscoveryError::InvalidPrefix(prefix.to_string());
    let trimmed = prefix.trim().trim_end_matches('.');

    let mut octets = [0u8; 3];
    let mut parts = trimmed.split('.');
    for slot in &mut octets {
        let part = parts.next().ok_or_else(invalid)?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = part.parse().map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(octets)
}

/// Every host address swept under a prefix (`.1` to `.254`).
pub fn host_addresses(prefix: [u8; 3]) -> Vec<Ipv4Addr> {
    let [a, b, c] = prefix;
    HOST_SUFFIXES.map(|d| Ipv4Addr::new(a, b, c, d)).collect()
}
