//! Phase B: protocol handshake against a live address.

use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use holofleet_protocol::constants::{PROBE_GET_ID, PROBE_PING, WS_MAX_MESSAGE_SIZE};
use holofleet_protocol::frame;

use crate::types::{DiscoveredDevice, IdSource, ScanConfig};

/// Handshake step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    Connect,
    Ping,
    Identify,
}

/// Why an address was excluded from the scan result.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out during {0:?}")]
    Timeout(ProbeStage),

    #[error("connect failed: {0}")]
    ConnectFailure(String),

    #[error("connection closed by unit")]
    Closed,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// A protocol-level check against one live address.
pub trait DeviceProbe: Send + Sync {
    fn probe(&self, ip: Ipv4Addr)
    -> impl Future<Output = Result<DiscoveredDevice, ProbeError>> + Send;
}

/// WebSocket handshake: `PING`, then `GET_ID`.
#[derive(Debug, Clone)]
pub struct WsProbe {
    port: u16,
    probe_timeout: Duration,
    identify_timeout: Duration,
}

impl WsProbe {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            port: config.port,
            probe_timeout: config.probe_timeout,
            identify_timeout: config.identify_timeout,
        }
    }

    async fn handshake<S>(&self, ws: &mut S, ip: Ipv4Addr) -> Result<DiscoveredDevice, ProbeError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>>
            + futures_util::Sink<Message, Error = tungstenite::Error>
            + Unpin,
    {
        ws.send(Message::Text(PROBE_PING.to_string().into()))
            .await
            .map_err(|e| ProbeError::ConnectFailure(e.to_string()))?;
        recv_reply(ws, self.probe_timeout, ProbeStage::Ping).await?;

        ws.send(Message::Text(PROBE_GET_ID.to_string().into()))
            .await
            .map_err(|e| ProbeError::ConnectFailure(e.to_string()))?;

        let reported = match recv_reply(ws, self.identify_timeout, ProbeStage::Identify).await {
            Ok(reply) => frame::parse_identity(&reply),
            Err(ProbeError::Timeout(_)) => None,
            Err(e) => return Err(e),
        };

        let (device_id, id_source) = match reported {
            Some(id) => (id, IdSource::Reported),
            None => (frame::fallback_device_id(&ip.to_string()), IdSource::Synthesized),
        };

        Ok(DiscoveredDevice {
            ip,
            port: self.port,
            device_id,
            id_source,
        })
    }
}

impl DeviceProbe for WsProbe {
    async fn probe(&self, ip: Ipv4Addr) -> Result<DiscoveredDevice, ProbeError> {
        let url = frame::websocket_url(&ip.to_string(), self.port);

        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

        let (mut ws, _) = tokio::time::timeout(
            self.probe_timeout,
            tokio_tungstenite::connect_async_with_config(&url, Some(ws_config), false),
        )
        .await
        .map_err(|_| ProbeError::Timeout(ProbeStage::Connect))?
        .map_err(|e| ProbeError::ConnectFailure(e.to_string()))?;

        let result = self.handshake(&mut ws, ip).await;

        // The probe socket is closed on every path.
        let _ = tokio::time::timeout(self.identify_timeout, ws.close(None)).await;

        match &result {
            Ok(dev) => debug!(%ip, device_id = %dev.device_id, source = %dev.id_source, "unit found"),
            Err(e) => debug!(%ip, error = %e, "probe failed"),
        }
        result
    }
}

/// Waits for the next data frame, skipping control frames.
async fn recv_reply<S>(ws: &mut S, wait: Duration, stage: ProbeStage) -> Result<String, ProbeError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let next = tokio::time::timeout_at(deadline, ws.next())
            .await
            .map_err(|_| ProbeError::Timeout(stage))?;

        match next {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
            Some(Ok(Message::Binary(data))) => {
                return String::from_utf8(data.to_vec()).map_err(|_| {
                    ProbeError::ProtocolViolation(format!("non-UTF-8 reply to {stage:?}"))
                });
            }
            Some(Ok(Message::Close(_))) | None => return Err(ProbeError::Closed),
            Some(Ok(_)) => continue, // Ping/Pong/raw frame
            Some(Err(e)) => return Err(ProbeError::ProtocolViolation(e.to_string())),
        }
    }
}
