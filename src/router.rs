//! Message Router
//!
//! Classifies inbound envelopes to an event name and dispatches through an
//! explicit handler table registered once at startup. Two legacy payload
//! shapes predate the `event` field and are still inferred: a payload with a
//! `command` field classifies as `dispatch`, and a payload with a bare
//! `action` field uses that action value as the event name. Unmatched
//! envelopes are never silently dropped; they go to the fallback sink with a
//! logged warning.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::context::ClientContext;
use crate::envelope::Envelope;

/// Legacy field identifying a command dispatch payload
const FIELD_COMMAND: &str = "command";
/// Legacy field carrying the event name directly
const FIELD_ACTION: &str = "action";
/// Event name inferred for command payloads
pub const DISPATCH_EVENT: &str = "dispatch";

/// A registered event handler
pub type Handler = Box<dyn Fn(&ClientContext, &Envelope) + Send + Sync>;

/// Classify a raw payload to an event name
///
/// An explicit `event` field always wins; the legacy inference chain runs
/// only in its absence, in order. Returns `None` when nothing matches.
#[must_use]
pub fn classify(payload: &Value) -> Option<String> {
    let map = payload.as_object()?;
    if let Some(Value::String(event)) = map.get(crate::envelope::FIELD_EVENT) {
        return Some(event.clone());
    }
    if map.contains_key(FIELD_COMMAND) {
        return Some(DISPATCH_EVENT.to_string());
    }
    if let Some(Value::String(action)) = map.get(FIELD_ACTION) {
        return Some(action.clone());
    }
    None
}

fn classify_envelope(envelope: &Envelope) -> Option<String> {
    if let Some(event) = &envelope.event {
        return Some(event.clone());
    }
    if envelope.payload.contains_key(FIELD_COMMAND) {
        return Some(DISPATCH_EVENT.to_string());
    }
    if let Some(Value::String(action)) = envelope.payload.get(FIELD_ACTION) {
        return Some(action.clone());
    }
    None
}

/// Explicit event-to-handler dispatch table
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Handler>,
    fallback: Option<Handler>,
}

impl EventRouter {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for an event name
    pub fn register(&mut self, event: &str, handler: Handler) {
        if self.handlers.insert(event.to_string(), handler).is_some() {
            warn!(event, "replacing previously registered handler");
        }
    }

    /// Set the sink receiving unmatched envelopes
    pub fn set_fallback(&mut self, handler: Handler) {
        self.fallback = Some(handler);
    }

    /// Whether an event name has a registered handler
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Dispatch one envelope
    ///
    /// Classification follows the same chain as [`classify`]. Envelopes with
    /// no classification or no matching handler go to the fallback sink.
    pub fn route(&self, ctx: &ClientContext, envelope: &Envelope) {
        let Some(event) = classify_envelope(envelope) else {
            warn!("envelope has no classifiable event, sending to fallback");
            self.send_to_fallback(ctx, envelope);
            return;
        };
        match self.handlers.get(&event) {
            Some(handler) => {
                debug!(event, "routing envelope");
                handler(ctx, envelope);
            }
            None => {
                warn!(event, "no handler registered, sending to fallback");
                self.send_to_fallback(ctx, envelope);
            }
        }
    }

    fn send_to_fallback(&self, ctx: &ClientContext, envelope: &Envelope) {
        if let Some(fallback) = &self.fallback {
            fallback(ctx, envelope);
        }
    }
}
