//! Builders for the text frames exchanged with a unit.

use std::fmt::Display;

use crate::constants::{FALLBACK_ID_PREFIX, HEARTBEAT_PREFIX, WS_PATH};

/// Steady-state heartbeat: `PING <device_id>`.
pub fn heartbeat(device_id: &str) -> String {
    format!("{HEARTBEAT_PREFIX} {device_id}")
}

/// Command delivery frame: `<device_id> <command-text>`.
pub fn command(device_id: &str, command: impl Display) -> String {
    format!("{device_id} {command}")
}

/// Deterministic identifier for a unit that did not answer `GET_ID`.
///
/// `10.0.0.5` becomes `DEVICE_10_0_0_5`.
pub fn fallback_device_id(ip: &str) -> String {
    format!("{FALLBACK_ID_PREFIX}{}", ip.replace('.', "_"))
}

/// Extracts the identifier from a `GET_ID` reply.
///
/// Returns `None` for blank replies so callers fall back to
/// [`fallback_device_id`].
pub fn parse_identity(reply: &str) -> Option<String> {
    let id = reply.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// WebSocket URL of a unit.
pub fn websocket_url(ip: &str, port: u16) -> String {
    format!("ws://{ip}:{port}{WS_PATH}")
}
