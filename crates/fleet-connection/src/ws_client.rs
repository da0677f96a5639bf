//! Outbound WebSocket link to one display unit.
//!
//! [`Connector`] and [`DeviceLink`] are the seam between supervisors and the
//! transport, so supervisors can be driven by scripted links in tests.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use holofleet_protocol::DeviceRecord;
use holofleet_protocol::constants::WS_MAX_MESSAGE_SIZE;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors from a device link.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("connect failed: {0}")]
    ConnectFailure(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed")]
    Closed,
}

/// Opens links to devices.
pub trait Connector: Send + Sync + 'static {
    type Link: DeviceLink;

    fn connect(
        &self,
        record: &DeviceRecord,
    ) -> impl Future<Output = Result<Self::Link, LinkError>> + Send;
}

/// An open connection owned by exactly one supervisor.
pub trait DeviceLink: Send + 'static {
    /// Writes one text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Resolves once the peer goes away. Inbound data frames are ignored.
    ///
    /// Must be cancel-safe; it is polled inside `select!`.
    fn closed(&mut self) -> impl Future<Output = LinkError> + Send;

    /// Closes the link, bounded in time.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Connects over `ws://<ip>:<port>/ws`.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    connect_timeout: Option<Duration>,
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each connection attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    async fn connect(&self, record: &DeviceRecord) -> Result<WsLink, LinkError> {
        let url = record.websocket_url();

        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let attempt = tokio_tungstenite::connect_async_with_config(&url, Some(ws_config), false);

        let result = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| LinkError::ConnectFailure(format!("timed out connecting to {url}")))?,
            None => attempt.await,
        };

        let (stream, _) = result.map_err(|e| LinkError::ConnectFailure(e.to_string()))?;
        Ok(WsLink { stream })
    }
}

/// A live WebSocket to one unit.
pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl DeviceLink for WsLink {
    async fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| LinkError::SendFailed(e.to_string()))
    }

    async fn closed(&mut self) -> LinkError {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Close(_))) | None => return LinkError::Closed,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return LinkError::Receive(e.to_string()),
            }
        }
    }

    async fn close(mut self) {
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, self.stream.close(None)).await;
    }
}
