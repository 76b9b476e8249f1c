//! Easel - Message-Driven Declarative UI Delivery
//!
//! This crate is the client half of a UI delivery protocol: a server streams
//! declarative documents (nested maps and arrays, already parsed into
//! `serde_json` values) and the client normalizes them, assembles progressive
//! chunks, and renders everything into a headless output tree. Requests and
//! server-initiated events share one bidirectional connection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Server                           │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │  envelopes (JSON text frames)
//! ┌───────────────────────────┼──────────────────────────────┐
//! │                  ConnectionManager                       │
//! │   reconnect policy · requestId correlation · lifecycle   │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │  uncorrelated envelopes
//! ┌───────────────────────────┼──────────────────────────────┐
//! │                      EventRouter                         │
//! │   classify (event / legacy command / legacy action)      │
//! └───────┬──────────────────┬───────────────────┬───────────┘
//!         │ display          │ display_chunk     │ dispatch
//! ┌───────┴──────────────────┴───────────────────┴───────────┐
//! │  normalize → Orchestrator → RendererRegistry → Node tree │
//! │             ChunkAssembler (progressive delivery)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use easel::{
//!     ClientConfig, ClientContext, ConnectionManager, EventRouter,
//!     transport::WebSocketConnector,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = WebSocketConnector::new("ws://localhost:8787/ui");
//!     let (connection, mut inbound) =
//!         ConnectionManager::new(Box::new(connector), ClientConfig::from_env());
//!
//!     let ctx = Arc::new(ClientContext::new());
//!     ctx.attach_connection(Arc::clone(&connection));
//!     let mut router = EventRouter::new();
//!     ClientContext::install_default_handlers(&mut router);
//!
//!     connection.connect().await.unwrap();
//!     while let Some(envelope) = inbound.recv().await {
//!         router.route(&ctx, &envelope);
//!         // ctx.root_snapshot() is the current output tree
//!     }
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: connection tunables, programmatic or from the environment
//! - [`connection`]: transport lifecycle, reconnect, request correlation
//! - [`context`]: explicit wiring threaded through router handlers
//! - [`document`]: shorthand normalization and canonical descriptors
//! - [`envelope`]: the wire message shape
//! - [`error`]: the client error taxonomy
//! - [`hooks`]: connection lifecycle observers
//! - [`logging`]: optional tracing subscriber setup for embedding hosts
//! - [`render`]: orchestrator, renderer registry, chunk assembly, node tree
//! - [`router`]: envelope classification and handler dispatch
//! - [`transport`]: in-process and WebSocket transports
//!
//! # No Rendering-Framework Dependencies
//!
//! The output is a plain [`render::Node`] tree behind the
//! [`render::Container`] trait. Any host (terminal, web view, native
//! toolkit, headless test) can mount it; this crate never touches a real
//! rendering surface.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod context;
pub mod document;
pub mod envelope;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod render;
pub mod router;
pub mod transport;

// Re-exports for convenience
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use context::{ClientContext, DISPLAY_CHUNK_EVENT, DISPLAY_EVENT};
pub use document::{normalize, DialogDescriptor, DialogField, EventDescriptor};
pub use envelope::Envelope;
pub use error::ClientError;
pub use hooks::{ConnectionEvent, LifecycleHook};
pub use render::{
    ChunkAssembler, ChunkMessage, Container, Node, Orchestrator, RendererRegistry, TreeContainer,
};
pub use router::{classify, EventRouter, Handler};
pub use transport::{Connector, Transport, TransportError, TransportEvent};
