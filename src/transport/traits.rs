//! Transport Traits
//!
//! The minimal surface the connection manager needs from an underlying
//! byte-stream transport: send text frames, pull the next transport event,
//! close. A [`Connector`] is the factory used for the initial connection and
//! every reconnect.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the connection failed
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Sending a frame failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The connection is no longer usable
    #[error("transport closed")]
    Closed,

    /// Operation not valid in the current state
    #[error("invalid transport state: {0}")]
    InvalidState(String),
}

/// An event observed on the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text payload from the peer
    Text(String),

    /// The peer closed the connection
    ///
    /// `clean` is true for a normal close (the peer said goodbye); an
    /// unclean close triggers the reconnect policy.
    Closed {
        /// Whether the close used a normal close code
        clean: bool,
        /// Optional close reason from the peer
        reason: Option<String>,
    },

    /// A transport-level error after the connection opened
    Error(String),
}

/// A live bidirectional text transport
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame to the peer
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be transmitted.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next transport event
    ///
    /// Returns `None` once the transport has fully terminated. Termination
    /// without a prior [`TransportEvent::Closed`] is treated as an unclean
    /// close by the connection manager.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close the transport gracefully
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Factory producing transports for connect and reconnect
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establish a fresh transport
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be established.
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::ConnectFailed("refused".to_string());
        assert!(err.to_string().contains("refused"));
        assert!(TransportError::Closed.to_string().contains("closed"));
    }

    #[test]
    fn test_transport_event_equality() {
        let a = TransportEvent::Closed {
            clean: true,
            reason: None,
        };
        let b = TransportEvent::Closed {
            clean: true,
            reason: None,
        };
        assert_eq!(a, b);
    }
}
