//! In-Process Transport
//!
//! Channel-backed transport for embedded operation and tests. The peer half
//! plays the server: it reads what the client sent and injects transport
//! events (text frames, closes, errors) back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{Connector, Transport, TransportError, TransportEvent};

/// Default channel capacity for a transport pair
const DEFAULT_CAPACITY: usize = 100;

/// Client half of an in-process transport pair
pub struct InProcessTransport {
    outbound_tx: mpsc::Sender<String>,
    event_rx: mpsc::Receiver<TransportEvent>,
    open: Arc<AtomicBool>,
}

/// Server half of an in-process transport pair
///
/// Tests and embedded hosts use this to observe client traffic and to
/// deliver envelopes, closes, and errors.
pub struct InProcessPeer {
    /// Text frames sent by the client arrive here
    pub outbound_rx: mpsc::Receiver<String>,
    /// Inject transport events toward the client
    pub event_tx: mpsc::Sender<TransportEvent>,
}

impl InProcessPeer {
    /// Deliver a text frame to the client
    ///
    /// # Errors
    ///
    /// Returns an error if the client side has been dropped.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.event_tx
            .send(TransportEvent::Text(text.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Close the connection from the server side
    ///
    /// # Errors
    ///
    /// Returns an error if the client side has been dropped.
    pub async fn close(&self, clean: bool) -> Result<(), TransportError> {
        self.event_tx
            .send(TransportEvent::Closed {
                clean,
                reason: None,
            })
            .await
            .map_err(|_| TransportError::Closed)
    }
}

impl InProcessTransport {
    /// Create a connected transport/peer pair
    #[must_use]
    pub fn pair() -> (Self, InProcessPeer) {
        Self::pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a pair with custom channel capacity
    #[must_use]
    pub fn pair_with_capacity(capacity: usize) -> (Self, InProcessPeer) {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let transport = Self {
            outbound_tx,
            event_rx,
            open: Arc::new(AtomicBool::new(true)),
        };
        let peer = InProcessPeer {
            outbound_rx,
            event_tx,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidState(
                "transport not open".to_string(),
            ));
        }
        self.outbound_tx
            .send(text)
            .await
            .map_err(|_| TransportError::SendFailed("peer dropped".to_string()))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = self.event_rx.recv().await;
        if matches!(event, Some(TransportEvent::Closed { .. }) | None) {
            self.open.store(false, Ordering::SeqCst);
        }
        event
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector producing in-process transports
///
/// Every `connect()` call creates a fresh pair and hands the peer half to
/// whoever holds the receiver, so reconnect sequences can be driven from a
/// test just like a real server accepting connections.
pub struct InProcessConnector {
    peers_tx: mpsc::Sender<InProcessPeer>,
    refuse: Arc<AtomicBool>,
}

impl InProcessConnector {
    /// Create a connector and the receiver for accepted peers
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<InProcessPeer>) {
        let (peers_tx, peers_rx) = mpsc::channel(16);
        (
            Self {
                peers_tx,
                refuse: Arc::new(AtomicBool::new(false)),
            },
            peers_rx,
        )
    }

    /// Handle that flips the connector between accepting and refusing
    #[must_use]
    pub fn refusal_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.refuse)
    }
}

#[async_trait]
impl Connector for InProcessConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed(
                "connection refused".to_string(),
            ));
        }
        let (transport, peer) = InProcessTransport::pair();
        self.peers_tx
            .send(peer)
            .await
            .map_err(|_| TransportError::ConnectFailed("acceptor gone".to_string()))?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_roundtrip() {
        let (mut transport, mut peer) = InProcessTransport::pair();

        transport.send_text("hello".to_string()).await.unwrap();
        assert_eq!(peer.outbound_rx.recv().await.unwrap(), "hello");

        peer.send_text("world").await.unwrap();
        assert_eq!(
            transport.next_event().await,
            Some(TransportEvent::Text("world".to_string()))
        );
    }

    #[tokio::test]
    async fn test_peer_close_marks_transport() {
        let (mut transport, peer) = InProcessTransport::pair();

        peer.close(true).await.unwrap();
        assert_eq!(
            transport.next_event().await,
            Some(TransportEvent::Closed {
                clean: true,
                reason: None,
            })
        );

        // Sending after close is an invalid-state error
        let result = transport.send_text("late".to_string()).await;
        assert!(matches!(result, Err(TransportError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_connector_produces_fresh_peers() {
        let (connector, mut peers_rx) = InProcessConnector::new();

        let _t1 = connector.connect().await.unwrap();
        let _t2 = connector.connect().await.unwrap();

        assert!(peers_rx.recv().await.is_some());
        assert!(peers_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_connector_refusal() {
        let (connector, _peers_rx) = InProcessConnector::new();
        connector.refusal_handle().store(true, Ordering::SeqCst);

        let result = connector.connect().await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
