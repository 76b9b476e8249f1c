//! Transport Layer
//!
//! Abstraction over the byte stream carrying envelopes between server and
//! client:
//! - `InProcess`: channel-backed transport for embedded operation and tests
//! - WebSocket: remote delivery via `tokio-tungstenite` (feature `websocket`)
//!
//! The connection manager only sees the [`Transport`] and [`Connector`]
//! traits, so the reconnect and correlation logic is host-agnostic.

pub mod in_process;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use in_process::{InProcessConnector, InProcessPeer, InProcessTransport};
pub use traits::{Connector, Transport, TransportError, TransportEvent};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
