//! Front-end configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/holofleet/holofleet.toml`
//! - Windows: `%APPDATA%/holofleet/holofleet.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use holofleet_connection::{ReconnectConfig, SupervisorConfig};
use holofleet_discovery::{Liveness, PingProbe, ScanConfig, TcpProbe};
use holofleet_protocol::constants::{
    DEFAULT_PORT, HEARTBEAT_INTERVAL, IDENTIFY_TIMEOUT, LIVENESS_TIMEOUT, PROBE_TIMEOUT,
    RECONNECT_DELAY_BASE, RECONNECT_DELAY_MAX,
};

/// How Phase A decides a host is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessMethod {
    #[default]
    Ping,
    Tcp,
}

/// Fleet configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Port units listen on.
    pub default_port: u16,

    /// Connect and `PING` reply timeout during a scan.
    pub scan_timeout_secs: u64,

    pub reconnect_delay_base_secs: u64,
    pub reconnect_delay_max_secs: u64,
    pub heartbeat_interval_secs: u64,

    /// Prefix scanned when none is given. Empty derives it from the local
    /// interfaces.
    pub default_ip_prefix: String,

    pub liveness: LivenessMethod,

    /// Fleet file. Empty uses the platform default.
    pub store_path: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            scan_timeout_secs: PROBE_TIMEOUT.as_secs(),
            reconnect_delay_base_secs: RECONNECT_DELAY_BASE.as_secs(),
            reconnect_delay_max_secs: RECONNECT_DELAY_MAX.as_secs(),
            heartbeat_interval_secs: HEARTBEAT_INTERVAL.as_secs(),
            default_ip_prefix: String::new(),
            liveness: LivenessMethod::default(),
            store_path: String::new(),
        }
    }
}

impl FleetConfig {
    /// Loads configuration from `path`, or writes the defaults there if the
    /// file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: FleetConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = FleetConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        let base = Duration::from_secs(self.reconnect_delay_base_secs.max(1));
        SupervisorConfig {
            reconnect: ReconnectConfig {
                base,
                max: Duration::from_secs(self.reconnect_delay_max_secs).max(base),
                factor: 2,
            },
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            port: self.default_port,
            liveness_timeout: LIVENESS_TIMEOUT,
            probe_timeout: Duration::from_secs(self.scan_timeout_secs.max(1)),
            identify_timeout: IDENTIFY_TIMEOUT,
        }
    }

    pub fn liveness(&self) -> Liveness {
        match self.liveness {
            LivenessMethod::Ping => Liveness::Ping(PingProbe::new(LIVENESS_TIMEOUT)),
            LivenessMethod::Tcp => Liveness::Tcp(TcpProbe::new(self.default_port, LIVENESS_TIMEOUT)),
        }
    }

    /// Prefix to scan: the explicit one, the configured one, or one derived
    /// from the local interfaces.
    pub fn ip_prefix(&self, explicit: Option<&str>) -> String {
        match explicit {
            Some(p) => p.to_string(),
            None if !self.default_ip_prefix.trim().is_empty() => self.default_ip_prefix.clone(),
            None => holofleet_discovery::default_ip_prefix(),
        }
    }

    /// Fleet file location.
    pub fn store_path(&self) -> anyhow::Result<PathBuf> {
        if !self.store_path.trim().is_empty() {
            return Ok(PathBuf::from(&self.store_path));
        }
        holofleet_connection::default_store_path()
            .ok_or_else(|| anyhow::anyhow!("no config directory; set store_path"))
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    holofleet_connection::store::config_dir()
        .map(|d| d.join("holofleet").join("holofleet.toml"))
        .ok_or_else(|| anyhow::anyhow!("no config directory; pass --config"))
}
