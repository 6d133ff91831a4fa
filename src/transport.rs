//! Transport seam between the connection manager and the network.
//!
//! The manager is generic over a [`Connector`] so tests can substitute a
//! scripted in-memory transport for the production WebSocket stack. The
//! traits deal only in text payloads; framing below that level (WebSocket
//! message types, TLS) is the implementation's concern.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use tracing::debug;

/// Socket-level failures.
///
/// Transport errors drive the reconnect path; they are never fatal until
/// the configured attempt cap is exhausted.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The WebSocket layer reported a failure.
    #[error("websocket failure: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    /// The handshake did not finish within the configured timeout.
    #[error("connection handshake timed out after {timeout:?}")]
    ConnectTimeout { timeout: Duration },
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

/// A connected bidirectional text-frame stream.
#[async_trait]
pub trait Transport: Send {
    /// Write one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the write fails or the connection is
    /// closed.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Read the next text frame. `Ok(None)` signals a clean close.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on socket-level failure.
    async fn next_text(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the stream, ignoring errors; closing is best effort.
    async fn close(&mut self);
}

/// Dials a backend and yields a connected [`Transport`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The stream type produced on success.
    type Stream: Transport + 'static;

    /// Open a connection to `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the dial or handshake fails.
    async fn connect(&self, uri: &str) -> Result<Self::Stream, TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production WebSocket transport over `tokio-tungstenite`.
pub struct WsTransport {
    inner: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        Ok(self.inner.send(Message::Text(text)).await?)
    }

    async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let Some(message) = self.inner.next().await else {
                return Ok(None);
            };
            match message? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Close(_) => return Ok(None),
                // Protocol-level ping/pong is handled by tungstenite;
                // binary frames are not part of this protocol.
                other => debug!("non-text frame skipped: {other:?}"),
            }
        }
    }

    async fn close(&mut self) { let _ = self.inner.close(None).await; }
}

/// Production connector using `tokio_tungstenite::connect_async`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self { Self }
}

#[async_trait]
impl Connector for WsConnector {
    type Stream = WsTransport;

    async fn connect(&self, uri: &str) -> Result<Self::Stream, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(uri).await?;
        Ok(WsTransport { inner: stream })
    }
}
