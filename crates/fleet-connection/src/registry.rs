//! Device registry and shortcut table.
//!
//! Both are plain data. Persistence and supervisor lifecycle are layered on
//! top by [`FleetManager`](crate::FleetManager).

use std::collections::BTreeMap;

use holofleet_protocol::types::normalize_keyword;
use holofleet_protocol::{DeviceRecord, ShortcutRecord};

use crate::error::RegistryError;

/// Registered devices keyed by nickname.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    devices: BTreeMap<String, DeviceRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from stored records keyed by nickname.
    ///
    /// The map key wins over the nickname stored inside the record.
    pub fn from_map(devices: BTreeMap<String, DeviceRecord>) -> Self {
        let devices = devices
            .into_iter()
            .map(|(nickname, mut record)| {
                record.nickname = nickname.clone();
                (nickname, record)
            })
            .collect();
        Self { devices }
    }

    /// Inserts a record; an existing nickname is left untouched.
    pub fn add(&mut self, record: DeviceRecord) -> Result<(), RegistryError> {
        validate_nickname(&record.nickname)?;
        if self.devices.contains_key(&record.nickname) {
            return Err(RegistryError::DuplicateNickname(record.nickname));
        }
        self.devices.insert(record.nickname.clone(), record);
        Ok(())
    }

    /// Removes and returns a record.
    pub fn remove(&mut self, nickname: &str) -> Result<DeviceRecord, RegistryError> {
        self.devices
            .remove(nickname)
            .ok_or_else(|| RegistryError::NotFound(nickname.to_string()))
    }

    /// Moves a record to a new nickname.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<DeviceRecord, RegistryError> {
        if !self.devices.contains_key(old) {
            return Err(RegistryError::NotFound(old.to_string()));
        }
        validate_nickname(new)?;
        if self.devices.contains_key(new) {
            return Err(RegistryError::DuplicateNickname(new.to_string()));
        }
        let mut record = self.remove(old)?;
        record.nickname = new.to_string();
        self.devices.insert(new.to_string(), record.clone());
        Ok(record)
    }

    pub fn get(&self, nickname: &str) -> Option<&DeviceRecord> {
        self.devices.get(nickname)
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.devices.contains_key(nickname)
    }

    /// Snapshot of every record, ordered by nickname.
    pub fn list(&self) -> Vec<DeviceRecord> {
        self.devices.values().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, DeviceRecord> {
        self.devices.clone()
    }
}

fn validate_nickname(nickname: &str) -> Result<(), RegistryError> {
    if nickname.trim().is_empty() || nickname.trim() != nickname {
        return Err(RegistryError::InvalidNickname(nickname.to_string()));
    }
    Ok(())
}

/// Keyword shortcuts keyed by lowercase keyword.
#[derive(Debug, Clone, Default)]
pub struct ShortcutTable {
    entries: BTreeMap<String, ShortcutRecord>,
}

impl ShortcutTable {
    pub fn from_map(entries: BTreeMap<String, ShortcutRecord>) -> Self {
        let entries = entries
            .into_values()
            .map(|mut s| {
                s.keyword = normalize_keyword(&s.keyword);
                (s.keyword.clone(), s)
            })
            .collect();
        Self { entries }
    }

    /// Inserts or replaces a shortcut. Returns the replaced entry.
    pub fn upsert(&mut self, shortcut: ShortcutRecord) -> Option<ShortcutRecord> {
        self.entries.insert(shortcut.keyword.clone(), shortcut)
    }

    pub fn remove(&mut self, keyword: &str) -> Result<ShortcutRecord, RegistryError> {
        let key = normalize_keyword(keyword);
        self.entries
            .remove(&key)
            .ok_or(RegistryError::ShortcutNotFound(key))
    }

    /// Case-insensitive lookup.
    pub fn get(&self, keyword: &str) -> Option<&ShortcutRecord> {
        self.entries.get(&normalize_keyword(keyword))
    }

    pub fn list(&self) -> Vec<ShortcutRecord> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, ShortcutRecord> {
        self.entries.clone()
    }
}
