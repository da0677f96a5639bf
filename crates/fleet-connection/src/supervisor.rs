//! Per-device connection supervisor.
//!
//! Each registered device gets one task that owns its socket for the whole
//! lifetime of the registration. The task is the only writer of the device's
//! [`ConnectionState`]; everyone else reads it through a `watch` channel and
//! reaches the socket through the task's mailbox.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use holofleet_protocol::DeviceRecord;
use holofleet_protocol::frame;

use crate::error::DispatchError;
use crate::types::{ConnectionEvent, ConnectionPhase, ConnectionState, SupervisorConfig};
use crate::ws_client::{Connector, DeviceLink, LinkError};

const MAILBOX_CAPACITY: usize = 64;

/// A command line waiting to be written to the socket.
pub(crate) struct Outbound {
    pub command: String,
    pub respond_to: oneshot::Sender<Result<(), DispatchError>>,
}

/// Read side of a supervisor: its state and its mailbox.
#[derive(Clone)]
pub struct DeviceChannel {
    state: watch::Receiver<ConnectionState>,
    mailbox: mpsc::Sender<Outbound>,
}

impl DeviceChannel {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub(crate) fn mailbox(&self) -> &mpsc::Sender<Outbound> {
        &self.mailbox
    }
}

/// Owner handle for a running supervisor.
pub(crate) struct SupervisorHandle {
    channel: DeviceChannel,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl SupervisorHandle {
    pub fn spawn<C: Connector>(
        record: DeviceRecord,
        connector: Arc<C>,
        config: SupervisorConfig,
        events: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        let (state_tx, state_rx) =
            watch::channel(ConnectionState::initial(config.reconnect.base));
        let (mailbox_tx, mailbox_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            record,
            connector,
            config,
            state: state_tx,
            events,
            mailbox: mailbox_rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(supervisor.run());

        Self {
            channel: DeviceChannel {
                state: state_rx,
                mailbox: mailbox_tx,
            },
            _guard: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    pub fn channel(&self) -> &DeviceChannel {
        &self.channel
    }

    /// Cancels the supervisor and waits until its socket is closed.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "supervisor task failed");
        }
    }
}

struct Supervisor<C: Connector> {
    record: DeviceRecord,
    connector: Arc<C>,
    config: SupervisorConfig,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    mailbox: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
}

impl<C: Connector> Supervisor<C> {
    async fn run(mut self) {
        debug!(nickname = %self.record.nickname, address = %self.record.address(), "supervisor started");
        let mut delay = self.config.reconnect.base;

        loop {
            self.transition(ConnectionPhase::Connecting, delay, None);

            let attempt = reject_while(
                &mut self.mailbox,
                &self.cancel,
                self.connector.connect(&self.record),
            )
            .await;

            let error = match attempt {
                None => break,
                Some(Ok(link)) => {
                    delay = self.config.reconnect.base;
                    self.transition(ConnectionPhase::Connected, delay, None);
                    info!(nickname = %self.record.nickname, device_id = %self.record.device_id, "device connected");
                    match self.serve(link).await {
                        Some(e) => e,
                        None => break,
                    }
                }
                Some(Err(e)) => e,
            };

            warn!(
                nickname = %self.record.nickname,
                error = %error,
                retry_in = ?delay,
                "device connection failed"
            );
            self.transition(ConnectionPhase::Backoff, delay, Some(error.to_string()));

            let slept = reject_while(
                &mut self.mailbox,
                &self.cancel,
                tokio::time::sleep(delay),
            )
            .await;
            if slept.is_none() {
                break;
            }
            delay = self.config.reconnect.next_delay(delay);
        }

        self.finish();
    }

    /// Drives an open link. Returns `None` when cancelled.
    async fn serve(&mut self, mut link: C::Link) -> Option<LinkError> {
        let ping = frame::heartbeat(&self.record.device_id);
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break None,
                err = link.closed() => break Some(err),
                Some(req) = self.mailbox.recv() => {
                    match send_or_cancel(&mut link, &self.cancel, req.command).await {
                        None => {
                            let _ = req.respond_to.send(Err(DispatchError::NotConnected));
                            break None;
                        }
                        Some(Ok(())) => {
                            let _ = req.respond_to.send(Ok(()));
                        }
                        Some(Err(e)) => {
                            let _ = req.respond_to.send(Err(DispatchError::SendFailed(e.to_string())));
                            break Some(e);
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    match send_or_cancel(&mut link, &self.cancel, ping.clone()).await {
                        None => break None,
                        Some(Ok(())) => trace!(nickname = %self.record.nickname, "heartbeat sent"),
                        Some(Err(e)) => break Some(e),
                    }
                }
            }
        };

        link.close().await;
        outcome
    }

    fn finish(mut self) {
        self.mailbox.close();
        while let Ok(req) = self.mailbox.try_recv() {
            let _ = req.respond_to.send(Err(DispatchError::NotConnected));
        }
        self.transition(ConnectionPhase::Disconnected, self.config.reconnect.base, None);
        let _ = self.events.send(ConnectionEvent::Stopped {
            nickname: self.record.nickname.clone(),
        });
        debug!(nickname = %self.record.nickname, "supervisor stopped");
    }

    fn transition(&self, phase: ConnectionPhase, delay: std::time::Duration, error: Option<String>) {
        self.state.send_modify(|state| {
            state.phase = phase;
            state.reconnect_delay = delay;
            match phase {
                ConnectionPhase::Connected | ConnectionPhase::Disconnected => state.last_error = None,
                ConnectionPhase::Backoff => state.last_error = error,
                ConnectionPhase::Connecting => {}
            }
        });

        let state = self.state.borrow().clone();
        trace!(nickname = %self.record.nickname, phase = %state.phase, "state changed");
        let _ = self.events.send(ConnectionEvent::StateChanged {
            nickname: self.record.nickname.clone(),
            state,
        });
    }
}

/// Awaits `fut` while answering mailbox requests with `NotConnected`.
///
/// Returns `None` if the supervisor is cancelled first.
async fn reject_while<T>(
    mailbox: &mut mpsc::Receiver<Outbound>,
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            out = &mut fut => return Some(out),
            Some(req) = mailbox.recv() => {
                let _ = req.respond_to.send(Err(DispatchError::NotConnected));
            }
        }
    }
}

async fn send_or_cancel<L: DeviceLink>(
    link: &mut L,
    cancel: &CancellationToken,
    text: String,
) -> Option<Result<(), LinkError>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = link.send_text(text) => Some(result),
    }
}
