//! Persistence of the device registry and shortcut table.
//!
//! The fleet file is a single JSON document:
//!
//! ```json
//! { "devices": { "<nickname>": { ... } }, "shortcuts": { "<keyword>": { ... } } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use holofleet_protocol::{DeviceRecord, ShortcutRecord};

use crate::error::StoreError;

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceRecord>,
    #[serde(default)]
    pub shortcuts: BTreeMap<String, ShortcutRecord>,
}

/// Load/save hook invoked by the fleet manager after every mutation.
pub trait FleetStore: Send + Sync {
    fn load(&self) -> Result<FleetSnapshot, StoreError>;
    fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError>;
}

/// Stores the fleet as pretty-printed JSON on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FleetStore for JsonFileStore {
    /// A missing file is an empty fleet.
    fn load(&self) -> Result<FleetSnapshot, StoreError> {
        if !self.path.exists() {
            return Ok(FleetSnapshot::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let snapshot: FleetSnapshot = serde_json::from_str(&data)?;
        debug!(
            devices = snapshot.devices.len(),
            shortcuts = snapshot.shortcuts.len(),
            "loaded fleet from {:?}",
            self.path
        );
        Ok(snapshot)
    }

    fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!(devices = snapshot.devices.len(), "persisted fleet to {:?}", self.path);
        Ok(())
    }
}

/// Keeps the fleet in memory. Useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<FleetSnapshot>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(snapshot: FleetSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            saves: Mutex::new(0),
        }
    }

    /// Number of completed saves.
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl FleetStore for MemoryStore {
    fn load(&self) -> Result<FleetSnapshot, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, snapshot: &FleetSnapshot) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

/// Returns the default fleet file path.
pub fn default_store_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("holofleet").join("fleet.json"))
}

/// Returns the platform-specific config directory.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
