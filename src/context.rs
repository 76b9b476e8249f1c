//! Client Context
//!
//! Explicit wiring for router handlers: the renderer registry, the chunk
//! assembler, the live root container, and the connection handle all travel
//! through one context value instead of module-level singletons. Handlers
//! borrow the context; nothing in the crate reaches for ambient state.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use crate::connection::ConnectionManager;
use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::render::chunks::{ChunkAssembler, ChunkMessage};
use crate::render::node::{Container, TreeContainer};
use crate::render::orchestrator::Orchestrator;
use crate::render::registry::RendererRegistry;
use crate::router::{EventRouter, DISPATCH_EVENT};

/// Event carrying a whole document
pub const DISPLAY_EVENT: &str = "display";
/// Event carrying one fragment of a progressively delivered document
pub const DISPLAY_CHUNK_EVENT: &str = "display_chunk";

/// Shared state threaded through router handlers
pub struct ClientContext {
    registry: Arc<RendererRegistry>,
    orchestrator: Orchestrator,
    assembler: Mutex<ChunkAssembler>,
    root: Mutex<TreeContainer>,
    connection: Mutex<Option<Arc<ConnectionManager>>>,
    unrouted: Mutex<Vec<Envelope>>,
    commands: Mutex<Vec<String>>,
}

impl ClientContext {
    /// Create a context with the built-in renderer registry
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Arc::new(RendererRegistry::with_builtins()))
    }

    /// Create a context over a custom registry
    #[must_use]
    pub fn with_registry(registry: Arc<RendererRegistry>) -> Self {
        let orchestrator = Orchestrator::new(Arc::clone(&registry));
        Self {
            registry,
            assembler: Mutex::new(ChunkAssembler::new(orchestrator.clone())),
            orchestrator,
            root: Mutex::new(TreeContainer::new()),
            connection: Mutex::new(None),
            unrouted: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// The renderer registry leaves resolve through
    #[must_use]
    pub fn registry(&self) -> &Arc<RendererRegistry> {
        &self.registry
    }

    /// Attach the connection handle so handlers can send
    pub fn attach_connection(&self, connection: Arc<ConnectionManager>) {
        *self.connection.lock() = Some(connection);
    }

    /// The attached connection, if any
    #[must_use]
    pub fn connection(&self) -> Option<Arc<ConnectionManager>> {
        self.connection.lock().clone()
    }

    /// Render a whole document into the root container, replacing it
    pub fn render(&self, document: &Value) {
        let mut root = self.root.lock();
        root.clear();
        self.orchestrator.render_document(document, &mut *root);
    }

    /// Render one chunk of a progressive stream into the root container
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] on an out-of-sequence chunk.
    pub fn render_chunk(&self, chunk: &ChunkMessage) -> Result<(), ClientError> {
        let mut root = self.root.lock();
        self.assembler.lock().render_chunk(chunk, &mut *root)
    }

    /// Snapshot of the current output tree
    #[must_use]
    pub fn root_snapshot(&self) -> TreeContainer {
        self.root.lock().clone()
    }

    /// Clear the output tree and forget any chunk stream in progress
    pub fn clear(&self) {
        self.root.lock().clear();
        self.assembler.lock().reset();
    }

    /// Record an envelope no handler matched
    pub fn push_unrouted(&self, envelope: Envelope) {
        self.unrouted.lock().push(envelope);
    }

    /// Drain the unrouted envelopes collected so far
    #[must_use]
    pub fn take_unrouted(&self) -> Vec<Envelope> {
        std::mem::take(&mut self.unrouted.lock())
    }

    /// Record a server-dispatched command for the host to execute
    pub fn push_command(&self, command: String) {
        self.commands.lock().push(command);
    }

    /// Drain the dispatched commands collected so far
    #[must_use]
    pub fn take_commands(&self) -> Vec<String> {
        std::mem::take(&mut self.commands.lock())
    }

    /// Register the standard handlers and fallback sink
    ///
    /// After this, routing a `display` envelope renders its document,
    /// `display_chunk` feeds the assembler, `dispatch` queues the command,
    /// and everything unmatched lands in the unrouted collection.
    pub fn install_default_handlers(router: &mut EventRouter) {
        router.register(
            DISPLAY_EVENT,
            Box::new(|ctx, envelope| {
                ctx.render(&document_of(envelope));
            }),
        );
        router.register(
            DISPLAY_CHUNK_EVENT,
            Box::new(|ctx, envelope| {
                let chunk: ChunkMessage =
                    match serde_json::from_value(Value::Object(envelope.payload.clone())) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!(error = %e, "dropping malformed chunk envelope");
                            return;
                        }
                    };
                if let Err(e) = ctx.render_chunk(&chunk) {
                    warn!(error = %e, "chunk stream aborted");
                }
            }),
        );
        router.register(
            DISPATCH_EVENT,
            Box::new(|ctx, envelope| {
                match envelope.payload.get("command").and_then(Value::as_str) {
                    Some(command) => ctx.push_command(command.to_string()),
                    None => warn!("dispatch envelope without a command"),
                }
            }),
        );
        router.set_fallback(Box::new(|ctx, envelope| {
            ctx.push_unrouted(envelope.clone());
        }));
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The document an envelope carries: its `data` field when present,
/// otherwise the whole payload.
fn document_of(envelope: &Envelope) -> Value {
    match envelope.payload.get("data") {
        Some(data) => data.clone(),
        None => Value::Object(envelope.payload.clone()),
    }
}
