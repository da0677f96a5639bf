use std::time::Duration;

/// Default port units listen on.
pub const DEFAULT_PORT: u16 = 8080;

/// Path of the WebSocket endpoint on every unit.
pub const WS_PATH: &str = "/ws";

/// Liveness literal sent during the discovery handshake.
pub const PROBE_PING: &str = "PING";

/// Identity request sent after a successful `PING` during discovery.
pub const PROBE_GET_ID: &str = "GET_ID";

/// Prefix of the steady-state heartbeat (`PING <device_id>`).
pub const HEARTBEAT_PREFIX: &str = "PING";

/// Prefix of identifiers synthesized when a unit does not answer `GET_ID`.
pub const FALLBACK_ID_PREFIX: &str = "DEVICE_";

/// Phase A: bound on a single reachability probe.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Phase B: connect timeout and `PING` reply timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Phase B: `GET_ID` reply timeout.
pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(1);

/// Delay before the first reconnect attempt.
pub const RECONNECT_DELAY_BASE: Duration = Duration::from_secs(3);

/// Upper bound for the reconnect delay.
pub const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(30);

/// How often a connected supervisor sends `PING <device_id>`.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Host suffixes swept under a /24 prefix.
pub const HOST_SUFFIXES: std::ops::RangeInclusive<u8> = 1..=254;

/// Fallback prefix when no usable interface address is found.
pub const DEFAULT_IP_PREFIX: &str = "192.168.1";

/// Maximum inbound frame size accepted from a unit (64 KiB).
///
/// Units only send short acknowledgements and identifiers.
pub const WS_MAX_MESSAGE_SIZE: usize = 64 * 1024;
