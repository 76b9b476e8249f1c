//! Wire Envelopes
//!
//! A single wire message, request or response, carrying an event name. The
//! payload stays schemaless (`serde_json` values) because the set of events
//! is open on the wire even though rendering dispatches through a closed
//! registry.
//!
//! Wire shape:
//!
//! ```text
//! { "event": "<name>", "requestId"?: <int>, ...payload }
//! { "requestId": <int>, "result"?: <any>, "error"?: <string> }
//! ```

use serde_json::{Map, Value};

use crate::error::ClientError;

/// Field carrying the canonical event name
pub const FIELD_EVENT: &str = "event";
/// Field correlating requests with responses
pub const FIELD_REQUEST_ID: &str = "requestId";
/// Successful response payload field
pub const FIELD_RESULT: &str = "result";
/// Failed response payload field
pub const FIELD_ERROR: &str = "error";

/// A single wire message
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Explicit event name, if the message carried one
    pub event: Option<String>,
    /// Request correlation id, if present
    pub request_id: Option<u64>,
    /// All remaining payload fields
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Create an outbound envelope for the given event
    #[must_use]
    pub fn new(event: &str) -> Self {
        Self {
            event: Some(event.to_string()),
            request_id: None,
            payload: Map::new(),
        }
    }

    /// Attach a payload field (builder style)
    #[must_use]
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// Parse an envelope from a decoded wire value
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, ClientError> {
        let Value::Object(mut map) = value else {
            return Err(ClientError::Protocol(
                "envelope must be a JSON object".to_string(),
            ));
        };

        let event = match map.remove(FIELD_EVENT) {
            Some(Value::String(name)) => Some(name),
            Some(other) => {
                return Err(ClientError::Protocol(format!(
                    "event field must be a string, got {other}"
                )));
            }
            None => None,
        };
        let request_id = map.remove(FIELD_REQUEST_ID).and_then(|v| v.as_u64());

        Ok(Self {
            event,
            request_id,
            payload: map,
        })
    }

    /// Serialize back to the wire shape
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.payload.clone();
        if let Some(event) = &self.event {
            map.insert(FIELD_EVENT.to_string(), Value::String(event.clone()));
        }
        if let Some(id) = self.request_id {
            map.insert(FIELD_REQUEST_ID.to_string(), Value::from(id));
        }
        Value::Object(map)
    }

    /// The `result` field of a response payload
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.payload.get(FIELD_RESULT)
    }

    /// The `error` field of a response payload
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.payload.get(FIELD_ERROR).and_then(Value::as_str)
    }
}
