//! WebSocket Transport
//!
//! Remote delivery over `tokio-tungstenite`. Close frames are mapped to
//! clean/unclean transport closes so the connection manager can decide
//! whether to reconnect. Requires the `websocket` cargo feature.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::traits::{Connector, Transport, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A WebSocket-backed transport
pub struct WebSocketTransport {
    stream: WsStream,
}

impl WebSocketTransport {
    /// Connect to a `ws://` or `wss://` URL
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or WebSocket handshake fails.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(TransportEvent::Text(text)),
                Some(Ok(Message::Close(frame))) => {
                    let clean = frame
                        .as_ref()
                        .map(|f| f.code == CloseCode::Normal)
                        .unwrap_or(false);
                    let reason = frame.map(|f| f.reason.to_string());
                    return Some(TransportEvent::Closed { clean, reason });
                }
                // Control and binary frames carry no envelopes
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(TransportEvent::Error(e.to_string())),
                None => return None,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

/// Connector dialing a fixed WebSocket URL on every attempt
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Create a connector for the given URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The URL this connector dials
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let transport = WebSocketTransport::connect(&self.url).await?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_keeps_url() {
        let connector = WebSocketConnector::new("ws://127.0.0.1:8765/ws");
        assert_eq!(connector.url(), "ws://127.0.0.1:8765/ws");
    }

    #[tokio::test]
    async fn test_connect_refused_maps_to_connect_failed() {
        // Port 9 (discard) is almost certainly not a WebSocket server.
        let result = WebSocketTransport::connect("ws://127.0.0.1:9/").await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
