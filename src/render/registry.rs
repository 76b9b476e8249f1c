//! Renderer Registry
//!
//! Explicit event-to-renderer table. Each renderer is a pure function from a
//! canonical descriptor payload to an output [`Node`]; the built-ins cover
//! the closed [`EventDescriptor`] union and the dialog collaborator, and are
//! installed eagerly at startup. Registering a host-specific event is purely
//! additive.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::document::descriptor::{DialogDescriptor, EventDescriptor};
use crate::error::ClientError;
use crate::render::node::Node;

/// A pure renderer from a descriptor payload to an output node
pub type RenderFn = Box<dyn Fn(&Map<String, Value>) -> Result<Node, ClientError> + Send + Sync>;

/// Event name the forms collaborator registers under
pub const DIALOG_EVENT: &str = "dialog";

/// Explicit table of leaf renderers, keyed by canonical event name
pub struct RendererRegistry {
    renderers: HashMap<String, RenderFn>,
}

impl RendererRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in renderers installed
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for event in EventDescriptor::known_events() {
            registry.register(
                event,
                Box::new(|map| {
                    let descriptor = EventDescriptor::from_map(map)?;
                    Ok(render_descriptor(&descriptor))
                }),
            );
        }
        registry.register(
            DIALOG_EVENT,
            Box::new(|map| {
                let dialog: DialogDescriptor =
                    serde_json::from_value(Value::Object(without_event(map))).map_err(|e| {
                        ClientError::RendererResolution {
                            event: DIALOG_EVENT.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                Ok(render_dialog(&dialog))
            }),
        );
        registry
    }

    /// Register (or replace) the renderer for an event name
    pub fn register(&mut self, event: &str, renderer: RenderFn) {
        if self.renderers.insert(event.to_string(), renderer).is_some() {
            tracing::warn!(event, "replacing previously registered renderer");
        }
    }

    /// Whether an event name has a registered renderer
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.renderers.contains_key(event)
    }

    /// Resolve an event through the registry and produce a node
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownEvent`] for unregistered names, or the
    /// renderer's own failure.
    pub fn render(&self, event: &str, payload: &Map<String, Value>) -> Result<Node, ClientError> {
        let renderer = self
            .renderers
            .get(event)
            .ok_or_else(|| ClientError::UnknownEvent(event.to_string()))?;
        renderer(payload)
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn without_event(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = map.clone();
    out.remove("event");
    out
}

/// Render a canonical descriptor into its output node
#[must_use]
pub fn render_descriptor(descriptor: &EventDescriptor) -> Node {
    match descriptor {
        EventDescriptor::Header { indent, label } => {
            let level = (*indent).clamp(1, 6);
            Node::new(&format!("h{level}")).with_text(label.clone())
        }
        EventDescriptor::Text { text } => Node::new("p").with_text(text.clone()),
        EventDescriptor::Markdown { text } => Node::new("markdown").with_text(text.clone()),
        EventDescriptor::List { ordered, items } => {
            let mut list = Node::new(if *ordered { "ol" } else { "ul" });
            for item in items {
                list.push_child(render_item(item, "li"));
            }
            list
        }
        EventDescriptor::Table { columns, rows } => render_table(columns, rows),
        EventDescriptor::Image { src, alt } => {
            let mut node = Node::new("img").with_attr("src", src.clone());
            if let Some(alt) = alt {
                node = node.with_attr("alt", alt.clone());
            }
            node
        }
        EventDescriptor::Link { href, label } => Node::new("a")
            .with_attr("href", href.clone())
            .with_text(label.clone().unwrap_or_else(|| href.clone())),
        EventDescriptor::Button { label, command } => {
            let mut node = Node::new("button").with_text(label.clone());
            if let Some(command) = command {
                node = node.with_attr("data-command", command.clone());
            }
            node
        }
        EventDescriptor::Menu { items } => {
            let mut menu = Node::new("menu");
            for item in items {
                menu.push_child(Node::new("li").with_class("menu-item").with_text(item.clone()));
            }
            menu
        }
        EventDescriptor::Dashboard { items } => {
            let mut dashboard = Node::new("div").with_class("dashboard");
            for item in items {
                dashboard.push_child(render_item(item, "div").with_class("tile"));
            }
            dashboard
        }
        EventDescriptor::Navbar { items } => {
            let mut nav = Node::new("nav");
            for item in items {
                nav.push_child(Node::new("a").with_class("nav-link").with_text(item.clone()));
            }
            nav
        }
    }
}

/// Render one collection entry, wrapped in the given tag
///
/// Strings become plain text entries; canonical item descriptors render
/// recursively; a failing entry degrades to an inline error indicator so the
/// rest of the collection still renders.
fn render_item(item: &Value, wrapper_tag: &str) -> Node {
    let mut wrapper = Node::new(wrapper_tag);
    match item {
        Value::String(text) => wrapper.text = Some(text.clone()),
        Value::Object(map) if map.contains_key("event") => {
            match EventDescriptor::from_map(map) {
                Ok(descriptor) => wrapper.push_child(render_descriptor(&descriptor)),
                Err(e) => {
                    tracing::warn!(error = %e, "collection entry failed to render");
                    wrapper.push_child(error_indicator(&e));
                }
            }
        }
        other => wrapper.text = Some(other.to_string()),
    }
    wrapper
}

fn render_table(columns: &[String], rows: &[Vec<Value>]) -> Node {
    let mut table = Node::new("table");
    if !columns.is_empty() {
        let mut head_row = Node::new("tr");
        for column in columns {
            head_row.push_child(Node::new("th").with_text(column.clone()));
        }
        table.push_child(Node::new("thead").with_child(head_row));
    }
    let mut body = Node::new("tbody");
    for row in rows {
        let mut tr = Node::new("tr");
        for cell in row {
            tr.push_child(Node::new("td").with_text(cell_text(cell)));
        }
        body.push_child(tr);
    }
    table.push_child(body);
    table
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a dialog descriptor into a form node
#[must_use]
pub fn render_dialog(dialog: &DialogDescriptor) -> Node {
    let mut form = Node::new("form").with_class("dialog");
    if let Some(title) = &dialog.title {
        form.push_child(Node::new("h3").with_class("dialog-title").with_text(title.clone()));
    }
    for field in &dialog.fields {
        let label = field.label.clone().unwrap_or_else(|| field.name.clone());
        let mut input = Node::new("input")
            .with_attr("name", field.name.clone())
            .with_attr("type", field.kind.clone());
        if field.required {
            input = input.with_attr("required", "true");
        }
        form.push_child(
            Node::new("label")
                .with_text(label)
                .with_child(input),
        );
    }
    let submit = dialog.submit.clone().unwrap_or_else(|| "Submit".to_string());
    form.push_child(Node::new("button").with_attr("type", "submit").with_text(submit));
    form
}

/// Minimal inline indicator replacing a leaf that failed to render
#[must_use]
pub fn error_indicator(error: &ClientError) -> Node {
    Node::new("span")
        .with_class("render-error")
        .with_text(error.to_string())
}
