use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::DEFAULT_PORT;
use crate::frame;

/// A registered display unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub nickname: String,
    pub device_id: String,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl DeviceRecord {
    /// Builds a record stamped with the current time.
    ///
    /// `ip` must be a dotted IPv4 address and `device_id` must not be blank.
    pub fn new(
        nickname: impl Into<String>,
        device_id: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
    ) -> Result<Self, ProtocolError> {
        let ip = ip.into();
        if ip.parse::<Ipv4Addr>().is_err() {
            return Err(ProtocolError::InvalidAddress(ip));
        }
        let device_id = device_id.into().trim().to_string();
        if device_id.is_empty() {
            return Err(ProtocolError::EmptyDeviceId);
        }
        Ok(Self {
            nickname: nickname.into(),
            device_id,
            ip,
            port,
            added_at: Utc::now(),
        })
    }

    /// Returns `ip:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Returns the WebSocket URL for the unit.
    pub fn websocket_url(&self) -> String {
        frame::websocket_url(&self.ip, self.port)
    }
}

/// Keyword shortcut resolved by front-ends into a model URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutRecord {
    pub keyword: String,
    pub target_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl ShortcutRecord {
    /// Builds a shortcut; the keyword is stored lowercase.
    pub fn new(
        keyword: &str,
        target_url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            keyword: normalize_keyword(keyword),
            target_url: target_url.into(),
            description: description.into(),
            added_at: Utc::now(),
        }
    }
}

/// Lowercases and trims a shortcut keyword.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}
