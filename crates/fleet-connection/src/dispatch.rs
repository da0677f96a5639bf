//! Command delivery through supervisor mailboxes.

use futures_util::future::join_all;
use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::supervisor::{DeviceChannel, Outbound};
use crate::types::BroadcastOutcome;

/// Delivers one command line to one device.
///
/// Fails fast with [`DispatchError::NotConnected`] unless the device is
/// currently connected; the write itself happens on the supervisor task.
pub async fn send_to(channel: &DeviceChannel, command: String) -> Result<(), DispatchError> {
    if !channel.state().is_connected() {
        return Err(DispatchError::NotConnected);
    }

    let (respond_to, reply) = oneshot::channel();
    channel
        .mailbox()
        .send(Outbound {
            command,
            respond_to,
        })
        .await
        .map_err(|_| DispatchError::NotConnected)?;

    reply.await.unwrap_or(Err(DispatchError::NotConnected))
}

/// Delivers commands to many devices concurrently.
///
/// Each entry is a channel and the line meant for it. A failure on one device
/// never affects another; `total` is always the number of entries.
pub async fn send_to_all(targets: Vec<(DeviceChannel, String)>) -> BroadcastOutcome {
    let total = targets.len();
    let results = join_all(
        targets
            .iter()
            .map(|(channel, command)| send_to(channel, command.clone())),
    )
    .await;

    BroadcastOutcome {
        success: results.iter().filter(|r| r.is_ok()).count(),
        total,
    }
}
