//! Public types for the fleet connection layer.

use std::fmt;
use std::time::Duration;

use holofleet_protocol::DeviceRecord;
use holofleet_protocol::constants::{
    HEARTBEAT_INTERVAL, RECONNECT_DELAY_BASE, RECONNECT_DELAY_MAX,
};

/// Lifecycle phase of a device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// No connection; initial phase and the phase after the supervisor exits.
    Disconnected,
    /// Socket open in progress.
    Connecting,
    /// Socket open; heartbeats flowing.
    Connected,
    /// Waiting `reconnect_delay` before the next attempt.
    Backoff,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Disconnected => write!(f, "disconnected"),
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
            ConnectionPhase::Backoff => write!(f, "backoff"),
        }
    }
}

/// Connection state of one device, written only by its supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub reconnect_delay: Duration,
    pub last_error: Option<String>,
}

impl ConnectionState {
    pub(crate) fn initial(base_delay: Duration) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            reconnect_delay: base_delay,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }
}

/// A registered device together with its current connection state.
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub record: DeviceRecord,
    pub state: ConnectionState,
}

/// Events emitted by supervisors.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A device changed phase.
    StateChanged {
        nickname: String,
        state: ConnectionState,
    },
    /// A supervisor terminated after its device left the registry.
    Stopped { nickname: String },
}

/// Exponential reconnect backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay used after a successful connection and before the first retry.
    pub base: Duration,
    /// Backoff cap.
    pub max: Duration,
    /// Multiplier applied after each failure.
    pub factor: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base: RECONNECT_DELAY_BASE,
            max: RECONNECT_DELAY_MAX,
            factor: 2,
        }
    }
}

impl ReconnectConfig {
    /// Delay after `failures` consecutive failures: `min(base * factor^n, max)`.
    pub fn delay_after_failures(&self, failures: u32) -> Duration {
        let mut delay = self.base.min(self.max);
        for _ in 0..failures {
            if delay >= self.max {
                break;
            }
            delay = self.next_delay(delay);
        }
        delay
    }

    /// The delay that follows `current`, capped at `max`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(self.factor).min(self.max)
    }
}

/// Settings shared by every supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub reconnect: ReconnectConfig,
    /// Period between `PING <device_id>` frames while connected.
    pub heartbeat_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }
}

/// Aggregate result of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastOutcome {
    pub success: usize,
    pub total: usize,
}

impl fmt::Display for BroadcastOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.success, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_config_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base, Duration::from_secs(3));
        assert_eq!(config.max, Duration::from_secs(30));
        assert_eq!(config.factor, 2);
    }

    #[test]
    fn backoff_sequence_doubles_to_cap() {
        let config = ReconnectConfig::default();
        let secs: Vec<u64> = (0..8)
            .map(|n| config.delay_after_failures(n).as_secs())
            .collect();
        assert_eq!(secs, vec![3, 6, 12, 24, 30, 30, 30, 30]);
    }

    #[test]
    fn backoff_matches_closed_form() {
        let config = ReconnectConfig::default();
        for n in 0..40u32 {
            let expected = 3u64.saturating_mul(1u64.checked_shl(n).unwrap_or(u64::MAX)).min(30);
            assert_eq!(config.delay_after_failures(n).as_secs(), expected, "n = {n}");
        }
    }

    #[test]
    fn next_delay_caps() {
        let config = ReconnectConfig::default();
        assert_eq!(config.next_delay(Duration::from_secs(24)), Duration::from_secs(30));
        assert_eq!(config.next_delay(Duration::from_secs(30)), Duration::from_secs(30));
    }

    #[test]
    fn phase_display() {
        assert_eq!(ConnectionPhase::Backoff.to_string(), "backoff");
        assert_eq!(ConnectionPhase::Connected.to_string(), "connected");
    }

    #[test]
    fn broadcast_outcome_display() {
        let outcome = BroadcastOutcome {
            success: 2,
            total: 3,
        };
        assert_eq!(outcome.to_string(), "2/3");
    }
}
