//! Document Orchestrator
//!
//! Recursively walks a normalized document and composes the output tree.
//! Each level is partitioned into metadata keys, navigation directives, and
//! content keys; metadata styles only the container it directly annotates
//! and is never inherited by siblings or descendants. Leaf descriptors
//! resolve through the [`RendererRegistry`]; failures are isolated per node
//! so a partially-broken document still renders.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::document::shorthand::{normalize, DIALOG_KEY, DISPLAY_KEY};
use crate::error::ClientError;
use crate::render::node::{Container, Node};
use crate::render::registry::{error_indicator, RendererRegistry, DIALOG_EVENT};

/// Metadata key: style classes for the annotated value
pub const META_CLASS: &str = "_class";
/// Metadata key: inline style for the annotated value
pub const META_STYLE: &str = "_style";
/// Metadata key: stable identity for the annotated value
pub const META_ID: &str = "_id";
/// Metadata key: group composition directive
pub const META_GROUP: &str = "_group";

/// Prefix of navigation directives at any level
const NAV_PREFIX: &str = "zNav";

/// Key modifier pinning a section into the navigation bar
const NAV_PIN: char = '*';

/// Styling metadata attached to exactly one value
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Style classes from `_class`
    pub classes: Vec<String>,
    /// Inline style from `_style`
    pub style: Option<String>,
    /// Stable identity from `_id`
    pub id: Option<String>,
    /// Group directive from `_group`
    pub group: Option<String>,
}

impl Metadata {
    /// Extract metadata from the keys of a value map
    #[must_use]
    pub fn extract(map: &Map<String, Value>) -> Self {
        let classes = map
            .get(META_CLASS)
            .and_then(Value::as_str)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let style = map
            .get(META_STYLE)
            .and_then(Value::as_str)
            .map(str::to_string);
        let id = map.get(META_ID).and_then(Value::as_str).map(str::to_string);
        let group = match map.get(META_GROUP) {
            Some(Value::String(kind)) => Some(kind.clone()),
            Some(Value::Bool(true)) => Some("list".to_string()),
            _ => None,
        };
        Self {
            classes,
            style,
            id,
            group,
        }
    }

    /// Whether any key of a map is a metadata key
    #[must_use]
    pub fn is_meta_key(key: &str) -> bool {
        key.starts_with('_')
    }
}

/// One level of a document map, partitioned by key role
struct LevelParts<'a> {
    metadata: Metadata,
    nav: Vec<(&'a String, &'a Value)>,
    content: Vec<(&'a String, &'a Value)>,
}

fn partition(map: &Map<String, Value>) -> LevelParts<'_> {
    let mut nav = Vec::new();
    let mut content = Vec::new();
    for (key, value) in map {
        if Metadata::is_meta_key(key) {
            continue;
        }
        if key.starts_with(NAV_PREFIX) {
            nav.push((key, value));
        } else {
            content.push((key, value));
        }
    }
    LevelParts {
        metadata: Metadata::extract(map),
        nav,
        content,
    }
}

/// Split a navigational modifier prefix off a content key
fn split_key_modifiers(key: &str) -> (bool, &str) {
    match key.strip_prefix(NAV_PIN) {
        Some(rest) => (true, rest),
        None => (false, key),
    }
}

/// Mount a node, replacing an existing identified node wholesale when the
/// identity already exists in the target.
fn append_or_replace(target: &mut dyn Container, node: Node) {
    if let Some(id) = node.id.clone() {
        if target.replace_by_id(&id, node.clone()) {
            return;
        }
    }
    target.append(node);
}

/// Walks normalized documents and composes output trees
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<RendererRegistry>,
}

impl Orchestrator {
    /// Create an orchestrator over a renderer registry
    #[must_use]
    pub fn new(registry: Arc<RendererRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this orchestrator resolves leaves through
    #[must_use]
    pub fn registry(&self) -> &Arc<RendererRegistry> {
        &self.registry
    }

    /// Normalize and render a whole document into the target
    pub fn render_document(&self, document: &Value, target: &mut dyn Container) {
        let normalized = normalize(document);
        for node in self.compose_level(&normalized) {
            append_or_replace(target, node);
        }
    }

    /// Compose the nodes for one already-normalized level
    #[must_use]
    pub fn compose_level(&self, value: &Value) -> Vec<Node> {
        let mut out = Vec::new();
        self.compose_value(value, &mut out);
        out
    }

    fn compose_value(&self, value: &Value, out: &mut Vec<Node>) {
        match value {
            Value::Object(map) if map.contains_key(DISPLAY_KEY) => {
                out.push(self.render_leaf(map));
            }
            Value::Object(map) if map.contains_key(DIALOG_KEY) => {
                out.push(self.render_dialog_leaf(map));
            }
            Value::Object(map) => {
                let parts = partition(map);
                for (key, nav_value) in &parts.nav {
                    out.push(self.render_nav(key, nav_value));
                }
                if let Some(kind) = &parts.metadata.group {
                    // Group rendering is exclusive of per-key rendering.
                    out.push(self.render_group(kind, &parts.content));
                    return;
                }
                for (key, child) in &parts.content {
                    out.push(self.render_entry(key, child));
                }
            }
            Value::Array(items) if is_menu(items) => {
                out.push(self.render_menu(items));
            }
            Value::Array(items) => {
                for item in items {
                    self.compose_value(item, out);
                }
            }
            Value::String(text) => out.push(Node::new("p").with_text(text.clone())),
            Value::Number(n) => out.push(Node::new("p").with_text(n.to_string())),
            Value::Bool(b) => out.push(Node::new("p").with_text(b.to_string())),
            Value::Null => {}
        }
    }

    /// Render one content key into a container styled only from the value's
    /// own metadata.
    ///
    /// A value that is nothing but a canonical leaf renders bare; the keyed
    /// container only exists to carry metadata and key identity.
    fn render_entry(&self, key: &str, value: &Value) -> Node {
        let (pinned, name) = split_key_modifiers(key);
        if !pinned {
            if let Some(map) = value.as_object() {
                if map.len() == 1
                    && (map.contains_key(DISPLAY_KEY) || map.contains_key(DIALOG_KEY))
                {
                    let mut leaves = Vec::new();
                    self.compose_value(value, &mut leaves);
                    if leaves.len() == 1 {
                        return leaves.remove(0);
                    }
                }
            }
        }
        let metadata = value
            .as_object()
            .map(Metadata::extract)
            .unwrap_or_default();

        let mut container = Node::new("div").with_attr("data-key", name);
        for class in &metadata.classes {
            container.classes.push(class.clone());
        }
        if let Some(style) = &metadata.style {
            container.attrs.insert("style".to_string(), style.clone());
        }
        container.id = metadata.id.clone();
        if pinned {
            container.attrs.insert("data-nav".to_string(), "pin".to_string());
        }

        let mut children = Vec::new();
        self.compose_value(value, &mut children);
        container.children = children;

        if container.has_class("card") {
            enhance_card(&mut container);
        }
        container
    }

    fn render_leaf(&self, map: &Map<String, Value>) -> Node {
        let Some(Value::Object(descriptor)) = map.get(DISPLAY_KEY) else {
            let err = ClientError::UnknownEvent("<malformed display value>".to_string());
            warn!(error = %err, "display value is not an object");
            return unknown_event_node(&Value::Object(map.clone()));
        };
        let event = descriptor
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match self.registry.render(&event, descriptor) {
            Ok(node) => node,
            Err(err @ ClientError::UnknownEvent(_)) => {
                warn!(error = %err, "no renderer for leaf event");
                unknown_event_node(&Value::Object(descriptor.clone()))
            }
            Err(err) => {
                warn!(error = %err, event, "leaf renderer failed");
                error_indicator(&err)
            }
        }
    }

    fn render_dialog_leaf(&self, map: &Map<String, Value>) -> Node {
        let Some(Value::Object(dialog)) = map.get(DIALOG_KEY) else {
            let err = ClientError::UnknownEvent("<malformed dialog value>".to_string());
            warn!(error = %err, "dialog value is not an object");
            return unknown_event_node(&Value::Object(map.clone()));
        };
        match self.registry.render(DIALOG_EVENT, dialog) {
            Ok(node) => node,
            Err(err) => {
                warn!(error = %err, "dialog renderer failed");
                error_indicator(&err)
            }
        }
    }

    fn render_nav(&self, key: &str, value: &Value) -> Node {
        let mut payload = Map::new();
        payload.insert("event".to_string(), Value::String("navbar".to_string()));
        match value {
            Value::Array(_) => {
                payload.insert("items".to_string(), value.clone());
            }
            Value::Object(fields) => {
                for (k, v) in fields {
                    payload.insert(k.clone(), v.clone());
                }
                payload.insert("event".to_string(), Value::String("navbar".to_string()));
            }
            _ => {}
        }
        match self.registry.render("navbar", &payload) {
            Ok(node) => node,
            Err(err) => {
                warn!(error = %err, key, "navigation directive failed to render");
                error_indicator(&err)
            }
        }
    }

    /// Render all content children into one group container
    fn render_group(&self, kind: &str, content: &[(&String, &Value)]) -> Node {
        let mut rendered = Vec::new();
        for (_, value) in content {
            self.compose_value(value, &mut rendered);
        }

        let all_buttons = !rendered.is_empty() && rendered.iter().all(|n| n.tag == "button");
        let mut group = Node::new("div").with_attr("data-group", kind);
        if all_buttons {
            group.classes.push("button-group".to_string());
            group.children = rendered;
        } else {
            group.classes.push("list-group".to_string());
            group.children = rendered
                .into_iter()
                .map(|n| Node::new("div").with_class("list-group-item").with_child(n))
                .collect();
        }
        group
    }

    fn render_menu(&self, items: &[Value]) -> Node {
        let mut payload = Map::new();
        payload.insert("event".to_string(), Value::String("menu".to_string()));
        payload.insert("items".to_string(), Value::Array(items.to_vec()));
        match self.registry.render("menu", &payload) {
            Ok(node) => node,
            Err(err) => {
                warn!(error = %err, "menu renderer failed");
                error_indicator(&err)
            }
        }
    }
}

/// An array whose elements are all strings renders as a menu leaf
fn is_menu(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_string)
}

/// Visible fallback for an unknown leaf event, echoing the raw payload
fn unknown_event_node(payload: &Value) -> Node {
    let echo = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    Node::new("pre").with_class("unknown-event").with_text(echo)
}

fn is_heading(node: &Node) -> bool {
    let bytes = node.tag.as_bytes();
    bytes.len() == 2 && bytes[0] == b'h' && bytes[1].is_ascii_digit()
}

/// Post-hoc enhancement for card-classed containers: promote the first
/// heading to a card header, wrap remaining loose children into a body.
fn enhance_card(card: &mut Node) {
    let children = std::mem::take(&mut card.children);
    let mut header: Option<Node> = None;
    let mut sections = Vec::new();
    let mut loose = Vec::new();

    for child in children {
        if header.is_none() {
            if let Some(heading) = extract_heading(&child) {
                header = Some(
                    Node::new("div")
                        .with_class("card-header")
                        .with_child(heading),
                );
                continue;
            }
        }
        if child.has_class("card-header") || child.has_class("card-body") {
            sections.push(child);
        } else {
            loose.push(child);
        }
    }

    if let Some(header) = header {
        card.children.push(header);
    }
    card.children.extend(sections);
    if !loose.is_empty() {
        let mut body = Node::new("div").with_class("card-body");
        body.children = loose;
        card.children.push(body);
    }
}

/// A heading directly, or a plain container holding exactly one heading
fn extract_heading(node: &Node) -> Option<Node> {
    if is_heading(node) {
        return Some(node.clone());
    }
    if node.tag == "div" && node.children.len() == 1 && is_heading(&node.children[0]) {
        return Some(node.children[0].clone());
    }
    None
}
