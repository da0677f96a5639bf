//! Fleet connection layer for holofleet display units.
//!
//! Keeps a registry of units, runs one self-healing connection supervisor
//! per registered unit and fans commands out to every connected unit.

mod discovery;
pub(crate) mod dispatch;
pub mod error;
pub mod manager;
pub mod registry;
pub mod stats;
pub mod store;
pub(crate) mod supervisor;
pub mod types;
pub mod ws_client;

#[cfg(test)]
mod test_support;

pub use error::{DispatchError, FleetError, RegistryError, StoreError};
pub use manager::FleetManager;
pub use registry::{Registry, ShortcutTable};
pub use stats::{Stats, StatsSnapshot};
pub use store::{FleetSnapshot, FleetStore, JsonFileStore, MemoryStore, default_store_path};
pub use types::{
    BroadcastOutcome, ConnectionEvent, ConnectionPhase, ConnectionState, DeviceStatus,
    ReconnectConfig, SupervisorConfig,
};
pub use ws_client::{Connector, DeviceLink, LinkError, WsConnector, WsLink};
