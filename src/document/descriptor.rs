//! Event Descriptors
//!
//! The closed tagged union a canonical `{event, ...fields}` value decodes
//! into. Keeping the union closed gives exhaustive dispatch in the renderer
//! registry; events outside the union surface as unknown-event fallbacks
//! instead of silently vanishing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// A canonical leaf descriptor, discriminated by its `event` field
///
/// Immutable once constructed by normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventDescriptor {
    /// A heading at a given indent level (1-6)
    Header {
        /// Heading level
        indent: u8,
        /// Heading text
        label: String,
    },
    /// A paragraph of plain text
    Text {
        /// Paragraph text
        text: String,
    },
    /// Rich text rendered by the host's markdown collaborator
    Markdown {
        /// Markdown source
        text: String,
    },
    /// An ordered or unordered list
    List {
        /// Numbered when true, bulleted when false
        #[serde(default)]
        ordered: bool,
        /// List items: strings or nested canonical descriptors
        #[serde(default)]
        items: Vec<Value>,
    },
    /// A table of rows under named columns
    Table {
        /// Column headings
        #[serde(default)]
        columns: Vec<String>,
        /// Row cells, one inner vector per row
        #[serde(default)]
        rows: Vec<Vec<Value>>,
    },
    /// An image reference
    Image {
        /// Image source location
        src: String,
        /// Alternative text
        #[serde(default)]
        alt: Option<String>,
    },
    /// A hyperlink
    Link {
        /// Link target
        href: String,
        /// Visible label (target shown when absent)
        #[serde(default)]
        label: Option<String>,
    },
    /// An interactive button
    Button {
        /// Button label
        label: String,
        /// Command dispatched when activated
        #[serde(default)]
        command: Option<String>,
    },
    /// A menu of selectable entries
    Menu {
        /// Menu entries
        items: Vec<String>,
    },
    /// A dashboard of tiles
    Dashboard {
        /// Tile descriptors
        #[serde(default)]
        items: Vec<Value>,
    },
    /// A navigation bar
    Navbar {
        /// Entry labels in display order
        #[serde(default)]
        items: Vec<String>,
    },
}

impl EventDescriptor {
    /// Decode a canonical payload map into a descriptor
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownEvent`] when the `event` tag is absent
    /// or outside the closed union, and
    /// [`ClientError::RendererResolution`] when the tag matches but the
    /// fields do not decode.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, ClientError> {
        let event = map
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::UnknownEvent("<missing event field>".to_string()))?
            .to_string();

        serde_json::from_value(Value::Object(map.clone())).map_err(|e| {
            if Self::is_known_event(&event) {
                ClientError::RendererResolution {
                    event,
                    reason: e.to_string(),
                }
            } else {
                ClientError::UnknownEvent(event)
            }
        })
    }

    /// The event tag this descriptor dispatches under
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Header { .. } => "header",
            Self::Text { .. } => "text",
            Self::Markdown { .. } => "markdown",
            Self::List { .. } => "list",
            Self::Table { .. } => "table",
            Self::Image { .. } => "image",
            Self::Link { .. } => "link",
            Self::Button { .. } => "button",
            Self::Menu { .. } => "menu",
            Self::Dashboard { .. } => "dashboard",
            Self::Navbar { .. } => "navbar",
        }
    }

    /// All event tags in the closed union
    #[must_use]
    pub fn known_events() -> &'static [&'static str] {
        &[
            "header",
            "text",
            "markdown",
            "list",
            "table",
            "image",
            "link",
            "button",
            "menu",
            "dashboard",
            "navbar",
        ]
    }

    fn is_known_event(event: &str) -> bool {
        Self::known_events().contains(&event)
    }
}

/// A single input field inside a dialog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogField {
    /// Field name submitted to the server
    pub name: String,
    /// Visible label (field name shown when absent)
    #[serde(default)]
    pub label: Option<String>,
    /// Input kind hint (text, number, select, ...)
    #[serde(rename = "type", default = "DialogField::default_kind")]
    pub kind: String,
    /// Whether submission requires a value
    #[serde(default)]
    pub required: bool,
}

impl DialogField {
    fn default_kind() -> String {
        "text".to_string()
    }
}

/// A form dialog resolved through the forms collaborator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogDescriptor {
    /// Dialog title
    #[serde(default)]
    pub title: Option<String>,
    /// Input fields in display order
    #[serde(default)]
    pub fields: Vec<DialogField>,
    /// Submit button label
    #[serde(default)]
    pub submit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_header_decodes() {
        let map = as_map(json!({"event": "header", "indent": 2, "label": "Title"}));
        let desc = EventDescriptor::from_map(&map).unwrap();
        assert_eq!(
            desc,
            EventDescriptor::Header {
                indent: 2,
                label: "Title".to_string(),
            }
        );
        assert_eq!(desc.event_name(), "header");
    }

    #[test]
    fn test_unknown_event_is_surfaced() {
        let map = as_map(json!({"event": "hologram", "label": "x"}));
        let err = EventDescriptor::from_map(&map).unwrap_err();
        assert!(matches!(err, ClientError::UnknownEvent(name) if name == "hologram"));
    }

    #[test]
    fn test_missing_event_field() {
        let map = as_map(json!({"label": "x"}));
        let err = EventDescriptor::from_map(&map).unwrap_err();
        assert!(matches!(err, ClientError::UnknownEvent(_)));
    }

    #[test]
    fn test_known_event_with_bad_fields() {
        // header requires a label
        let map = as_map(json!({"event": "header", "indent": 1}));
        let err = EventDescriptor::from_map(&map).unwrap_err();
        assert!(matches!(
            err,
            ClientError::RendererResolution { event, .. } if event == "header"
        ));
    }

    #[test]
    fn test_list_defaults() {
        let map = as_map(json!({"event": "list"}));
        let desc = EventDescriptor::from_map(&map).unwrap();
        assert_eq!(
            desc,
            EventDescriptor::List {
                ordered: false,
                items: vec![],
            }
        );
    }

    #[test]
    fn test_dialog_field_kind_default() {
        let field: DialogField = serde_json::from_value(json!({"name": "email"})).unwrap();
        assert_eq!(field.kind, "text");
        assert!(!field.required);
    }

    #[test]
    fn test_dialog_decodes() {
        let dialog: DialogDescriptor = serde_json::from_value(json!({
            "title": "Sign up",
            "fields": [
                {"name": "email", "type": "email", "required": true},
                {"name": "notes"}
            ],
            "submit": "Go"
        }))
        .unwrap();
        assert_eq!(dialog.fields.len(), 2);
        assert_eq!(dialog.fields[0].kind, "email");
        assert!(dialog.fields[0].required);
    }
}
