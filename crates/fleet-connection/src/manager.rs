//! Fleet manager tying the registry, persistence and supervisors together.
//!
//! Every registered nickname has exactly one running supervisor. Adding a
//! device spawns it, removing a device stops it and waits for the socket to
//! close before returning. The fleet lock is never held across that wait. Dispatch only reads supervisor channels; it never
//! opens or closes connections.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, info, warn};

use holofleet_protocol::{DeviceRecord, ShortcutRecord, frame};

use crate::dispatch;
use crate::error::{DispatchError, FleetError, RegistryError};
use crate::registry::{Registry, ShortcutTable};
use crate::stats::{Stats, StatsSnapshot};
use crate::store::{FleetSnapshot, FleetStore};
use crate::supervisor::SupervisorHandle;
use crate::types::{
    BroadcastOutcome, ConnectionEvent, ConnectionState, DeviceStatus, SupervisorConfig,
};
use crate::ws_client::{Connector, WsConnector};

const EVENT_CAPACITY: usize = 256;

pub(crate) struct FleetInner {
    pub(crate) registry: Registry,
    pub(crate) shortcuts: ShortcutTable,
    pub(crate) supervisors: HashMap<String, SupervisorHandle>,
}

impl FleetInner {
    fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            devices: self.registry.to_map(),
            shortcuts: self.shortcuts.to_map(),
        }
    }
}

/// Registry, shortcuts and one supervisor per registered device.
pub struct FleetManager<C: Connector = WsConnector> {
    pub(crate) connector: Arc<C>,
    pub(crate) config: SupervisorConfig,
    pub(crate) store: Arc<dyn FleetStore>,
    pub(crate) inner: RwLock<FleetInner>,
    pub(crate) stats: Arc<Stats>,
    pub(crate) events: broadcast::Sender<ConnectionEvent>,
}

impl<C: Connector> FleetManager<C> {
    /// Loads the fleet from `store` and starts a supervisor for every record.
    pub async fn open(
        config: SupervisorConfig,
        connector: Arc<C>,
        store: Arc<dyn FleetStore>,
    ) -> Result<Self, FleetError> {
        let snapshot = store.load()?;
        let registry = Registry::from_map(snapshot.devices);
        let shortcuts = ShortcutTable::from_map(snapshot.shortcuts);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let supervisors = registry
            .records()
            .map(|record| {
                let handle = SupervisorHandle::spawn(
                    record.clone(),
                    connector.clone(),
                    config.clone(),
                    events.clone(),
                );
                (record.nickname.clone(), handle)
            })
            .collect();

        info!(
            devices = registry.len(),
            shortcuts = shortcuts.len(),
            "fleet opened"
        );

        Ok(Self {
            connector,
            config,
            store,
            inner: RwLock::new(FleetInner {
                registry,
                shortcuts,
                supervisors,
            }),
            stats: Arc::new(Stats::new()),
            events,
        })
    }

    /// Subscribes to supervisor events.
    ///
    /// A lagging subscriber misses events; it never slows a supervisor.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Registers a device and starts its supervisor.
    ///
    /// An existing nickname is left untouched and reported as
    /// [`RegistryError::DuplicateNickname`].
    pub async fn add(
        &self,
        nickname: &str,
        device_id: &str,
        ip: &str,
        port: u16,
    ) -> Result<DeviceRecord, RegistryError> {
        let record = DeviceRecord::new(nickname, device_id, ip, port)?;

        let mut inner = self.inner.write().await;
        inner.registry.add(record.clone())?;
        self.persist(&inner);

        let handle = self.spawn_supervisor(record.clone());
        inner.supervisors.insert(record.nickname.clone(), handle);
        info!(device = %record.nickname, device_id = %record.device_id, address = %record.address(), "device added");
        Ok(record)
    }

    /// Unregisters a device. Returns once its supervisor has exited.
    pub async fn remove(&self, nickname: &str) -> Result<DeviceRecord, RegistryError> {
        let (record, handle) = {
            let mut inner = self.inner.write().await;
            let record = inner.registry.remove(nickname)?;
            self.persist(&inner);
            (record, inner.supervisors.remove(nickname))
        };

        // The socket closes outside the lock so other devices stay usable.
        if let Some(handle) = handle {
            handle.stop().await;
        }
        info!(device = %nickname, "device removed");
        Ok(record)
    }

    /// Moves a device to a new nickname, restarting its supervisor.
    pub async fn rename(&self, old: &str, new: &str) -> Result<DeviceRecord, RegistryError> {
        let (record, previous) = {
            let mut inner = self.inner.write().await;
            let record = inner.registry.rename(old, new)?;
            self.persist(&inner);

            let previous = inner.supervisors.remove(old);
            let handle = self.spawn_supervisor(record.clone());
            inner.supervisors.insert(record.nickname.clone(), handle);
            (record, previous)
        };

        if let Some(handle) = previous {
            handle.stop().await;
        }
        info!(from = %old, to = %new, "device renamed");
        Ok(record)
    }

    /// Snapshot of every record, ordered by nickname.
    pub async fn list(&self) -> Vec<DeviceRecord> {
        self.inner.read().await.registry.list()
    }

    pub async fn get(&self, nickname: &str) -> Option<DeviceRecord> {
        self.inner.read().await.registry.get(nickname).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.registry.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.registry.is_empty()
    }

    /// Current state of one device; `None` once it has left the registry.
    pub async fn state(&self, nickname: &str) -> Option<ConnectionState> {
        self.inner
            .read()
            .await
            .supervisors
            .get(nickname)
            .map(|h| h.channel().state())
    }

    /// A receiver observing one device's state changes.
    pub async fn watch(&self, nickname: &str) -> Option<watch::Receiver<ConnectionState>> {
        self.inner
            .read()
            .await
            .supervisors
            .get(nickname)
            .map(|h| h.channel().watch())
    }

    /// Every record with its current connection state.
    pub async fn status(&self) -> Vec<DeviceStatus> {
        let inner = self.inner.read().await;
        inner
            .registry
            .records()
            .filter_map(|record| {
                let state = inner.supervisors.get(&record.nickname)?.channel().state();
                Some(DeviceStatus {
                    record: record.clone(),
                    state,
                })
            })
            .collect()
    }

    pub async fn connected_count(&self) -> usize {
        self.inner
            .read()
            .await
            .supervisors
            .values()
            .filter(|h| h.channel().state().is_connected())
            .count()
    }

    /// Waits until every registered device is connected or `timeout` passes.
    ///
    /// Returns the number of connected devices.
    pub async fn wait_until_connected(&self, timeout: Duration) -> usize {
        let mut events = self.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.connected_count().await >= self.len().await {
                break;
            }
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) | Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Ok(_) => continue,
            }
        }
        self.connected_count().await
    }

    /// Sends `"<device_id> <command>"` to one connected device.
    pub async fn send_to(
        &self,
        nickname: &str,
        command: impl Display,
    ) -> Result<(), DispatchError> {
        let (channel, line) = {
            let inner = self.inner.read().await;
            let record = inner
                .registry
                .get(nickname)
                .ok_or_else(|| DispatchError::NotFound(nickname.to_string()))?;
            let handle = inner
                .supervisors
                .get(nickname)
                .ok_or(DispatchError::NotConnected)?;
            (
                handle.channel().clone(),
                frame::command(&record.device_id, &command),
            )
        };

        self.stats.record_command();
        let result = dispatch::send_to(&channel, line).await;
        match &result {
            Ok(()) => self.stats.record_messages(1),
            Err(e) => debug!(device = %nickname, error = %e, "command not delivered"),
        }
        result
    }

    /// Sends a command to every registered device concurrently.
    ///
    /// `total` is the registry size; devices that are not connected count as
    /// failures.
    pub async fn send_to_all(&self, command: impl Display) -> BroadcastOutcome {
        let text = command.to_string();
        let (targets, total) = {
            let inner = self.inner.read().await;
            let targets: Vec<_> = inner
                .registry
                .records()
                .filter_map(|record| {
                    let handle = inner.supervisors.get(&record.nickname)?;
                    Some((
                        handle.channel().clone(),
                        frame::command(&record.device_id, &text),
                    ))
                })
                .collect();
            (targets, inner.registry.len())
        };

        let delivered = dispatch::send_to_all(targets).await;
        let outcome = BroadcastOutcome {
            success: delivered.success,
            total,
        };

        self.stats.record_command();
        self.stats.record_messages(outcome.success as u64);
        info!(command = %text, success = outcome.success, total = outcome.total, "command broadcast");
        outcome
    }

    /// Inserts or replaces a shortcut. Returns the replaced entry.
    pub async fn add_shortcut(
        &self,
        keyword: &str,
        target_url: &str,
        description: &str,
    ) -> Option<ShortcutRecord> {
        let mut inner = self.inner.write().await;
        let previous = inner
            .shortcuts
            .upsert(ShortcutRecord::new(keyword, target_url, description));
        self.persist(&inner);
        previous
    }

    pub async fn remove_shortcut(&self, keyword: &str) -> Result<ShortcutRecord, RegistryError> {
        let mut inner = self.inner.write().await;
        let removed = inner.shortcuts.remove(keyword)?;
        self.persist(&inner);
        Ok(removed)
    }

    /// Case-insensitive shortcut lookup.
    pub async fn shortcut(&self, keyword: &str) -> Option<ShortcutRecord> {
        self.inner.read().await.shortcuts.get(keyword).cloned()
    }

    pub async fn shortcuts(&self) -> Vec<ShortcutRecord> {
        self.inner.read().await.shortcuts.list()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops every supervisor. The registry itself is kept.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = {
            let mut inner = self.inner.write().await;
            inner.supervisors.drain().map(|(_, h)| h).collect()
        };
        let count = handles.len();
        join_all(handles.into_iter().map(SupervisorHandle::stop)).await;
        info!(supervisors = count, "fleet shut down");
    }

    fn spawn_supervisor(&self, record: DeviceRecord) -> SupervisorHandle {
        SupervisorHandle::spawn(
            record,
            self.connector.clone(),
            self.config.clone(),
            self.events.clone(),
        )
    }

    /// Saves the current tables. Failures are logged and never undo the
    /// in-memory mutation.
    fn persist(&self, inner: &FleetInner) {
        if let Err(e) = self.store.save(&inner.snapshot()) {
            warn!(error = %e, "failed to persist fleet");
        }
    }
}
