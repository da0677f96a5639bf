//! Fleet-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Monotonic counters updated by dispatch and discovery.
#[derive(Debug)]
pub struct Stats {
    messages_sent: AtomicU64,
    devices_discovered: AtomicU64,
    commands_executed: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub messages_sent: u64,
    pub devices_discovered: u64,
    pub commands_executed: u64,
    pub started_at: DateTime<Utc>,
    #[serde(with = "secs")]
    pub uptime: Duration,
}

mod secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            devices_discovered: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn record_messages(&self, n: u64) {
        self.messages_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_discovered(&self, n: u64) {
        self.devices_discovered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            devices_discovered: self.devices_discovered.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.record_messages(3);
        stats.record_messages(2);
        stats.record_discovered(4);
        stats.record_command();

        let snap = stats.snapshot();
        assert_eq!(snap.messages_sent, 5);
        assert_eq!(snap.devices_discovered, 4);
        assert_eq!(snap.commands_executed, 1);
        assert!(snap.started_at <= Utc::now());
    }

    #[test]
    fn snapshot_serializes_uptime_in_seconds() {
        let snap = StatsSnapshot {
            messages_sent: 1,
            devices_discovered: 0,
            commands_executed: 1,
            started_at: Utc::now(),
            uptime: Duration::from_millis(90_500),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["uptime"], 90);
        assert_eq!(json["messages_sent"], 1);
    }
}
