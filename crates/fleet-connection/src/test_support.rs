//! Scripted connector and link used by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use holofleet_protocol::DeviceRecord;

use crate::ws_client::{Connector, DeviceLink, LinkError};

/// Test side of a link handed out by [`MockConnector`].
pub(crate) struct MockPeer {
    pub nickname: String,
    pub sent: mpsc::UnboundedReceiver<String>,
    pub close: Option<oneshot::Sender<()>>,
    pub fail_sends: Arc<AtomicBool>,
}

impl MockPeer {
    /// Simulates the unit dropping the connection.
    pub fn hang_up(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }

    /// Collects frames until the link is gone.
    pub async fn drain(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = self.sent.recv().await {
            frames.push(frame);
        }
        frames
    }
}

pub(crate) struct MockLink {
    sent: mpsc::UnboundedSender<String>,
    close: oneshot::Receiver<()>,
    fail_sends: Arc<AtomicBool>,
    close_delay: Duration,
}

impl DeviceLink for MockLink {
    async fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(LinkError::SendFailed("broken pipe".into()));
        }
        self.sent
            .send(text)
            .map_err(|_| LinkError::SendFailed("peer gone".into()))
    }

    async fn closed(&mut self) -> LinkError {
        let _ = (&mut self.close).await;
        LinkError::Closed
    }

    async fn close(self) {
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
    }
}

/// Succeeds or fails connection attempts according to a script.
///
/// Once the script runs out every attempt succeeds when `default_ok` is set
/// and fails otherwise.
pub(crate) struct MockConnector {
    script: Mutex<VecDeque<bool>>,
    default_ok: bool,
    attempts: AtomicUsize,
    close_delay_ms: AtomicU64,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    pub fn new(
        script: &[bool],
        default_ok: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Mutex::new(script.iter().copied().collect()),
            default_ok,
            attempts: AtomicUsize::new(0),
            close_delay_ms: AtomicU64::new(0),
            peers,
        };
        (Arc::new(connector), rx)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Makes links opened from now on take `delay` to close.
    pub fn set_close_delay(&self, delay: Duration) {
        self.close_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    async fn connect(&self, record: &DeviceRecord) -> Result<MockLink, LinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let ok = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_ok);
        if !ok {
            return Err(LinkError::ConnectFailure("connection refused".into()));
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        let fail_sends = Arc::new(AtomicBool::new(false));
        let _ = self.peers.send(MockPeer {
            nickname: record.nickname.clone(),
            sent: sent_rx,
            close: Some(close_tx),
            fail_sends: fail_sends.clone(),
        });
        Ok(MockLink {
            sent: sent_tx,
            close: close_rx,
            fail_sends,
            close_delay: Duration::from_millis(self.close_delay_ms.load(Ordering::SeqCst)),
        })
    }
}

pub(crate) fn record(nickname: &str, device_id: &str) -> DeviceRecord {
    DeviceRecord::new(nickname, device_id, "10.0.0.5", 8080).unwrap()
}

/// A store whose saves always fail.
pub(crate) struct FailingStore;

impl crate::store::FleetStore for FailingStore {
    fn load(&self) -> Result<crate::store::FleetSnapshot, crate::error::StoreError> {
        Ok(crate::store::FleetSnapshot::default())
    }

    fn save(&self, _: &crate::store::FleetSnapshot) -> Result<(), crate::error::StoreError> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
    }
}
