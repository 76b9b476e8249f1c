//! Client Error Taxonomy
//!
//! Every fallible operation in this crate surfaces a [`ClientError`]. The
//! variants follow the propagation policy of the delivery layer:
//!
//! - `Protocol` escalates to the caller of the affected stream
//! - `Timeout` and `ConnectionClosed` settle individual requests
//! - `UnknownEvent` and `RendererResolution` are recovered locally with a
//!   logged warning and a visible fallback node

use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced by the delivery client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed envelope or an unparseable chunk sequence
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A request exceeded its deadline
    #[error("request {id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The request id that timed out
        id: u64,
        /// The deadline that was exceeded
        timeout_ms: u64,
    },

    /// A request was outstanding when the transport tore down
    #[error("connection closed")]
    ConnectionClosed,

    /// No router or renderer match for an event name
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// A specific leaf failed to produce a node
    #[error("renderer for '{event}' failed: {reason}")]
    RendererResolution {
        /// The event name whose renderer failed
        event: String,
        /// Why the node could not be produced
        reason: String,
    },

    /// The server answered a request with an error field
    #[error("server error: {0}")]
    Server(String),

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Whether the error is recovered locally (logged, rendering continues)
    /// rather than escalated to the caller.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownEvent(_) | Self::RendererResolution { .. }
        )
    }
}
