//! Error types for the fleet connection layer.

use holofleet_protocol::ProtocolError;

/// Errors from registry and shortcut mutations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("device {0:?} is already registered")]
    DuplicateNickname(String),

    #[error("device {0:?} not found")]
    NotFound(String),

    #[error("invalid nickname {0:?}")]
    InvalidNickname(String),

    #[error("invalid device record: {0}")]
    InvalidRecord(#[from] ProtocolError),

    #[error("shortcut {0:?} not found")]
    ShortcutNotFound(String),
}

/// Errors from delivering a command to one device.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("device {0:?} not found")]
    NotFound(String),

    #[error("device not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Errors from the persistence hook.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors opening a fleet.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("failed to load fleet: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_display() {
        assert_eq!(
            RegistryError::DuplicateNickname("holo1".into()).to_string(),
            "device \"holo1\" is already registered"
        );
        assert_eq!(
            RegistryError::InvalidRecord(ProtocolError::EmptyDeviceId).to_string(),
            "invalid device record: empty device identifier"
        );
    }

    #[test]
    fn dispatch_error_display() {
        assert_eq!(DispatchError::NotConnected.to_string(), "device not connected");
        assert_eq!(
            DispatchError::SendFailed("broken pipe".into()).to_string(),
            "send failed: broken pipe"
        );
    }
}
