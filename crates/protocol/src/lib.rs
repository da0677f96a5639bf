//! Wire protocol for holofleet display units.
//!
//! Units speak a plaintext protocol: one WebSocket text frame per message
//! on `ws://<ip>:<port>/ws`. This crate owns the literals, the frame
//! builders and the records shared between discovery and the connection
//! layer.

pub mod command;
pub mod constants;
pub mod frame;
pub mod types;

pub use command::DeviceCommand;
pub use types::{DeviceRecord, ShortcutRecord};

/// Errors for protocol-level validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("empty device identifier")]
    EmptyDeviceId,
}
