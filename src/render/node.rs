//! Output Nodes and Containers
//!
//! The orchestrator composes documents into [`Node`] trees and mounts them
//! through the minimal [`Container`] capability interface, so the delivery
//! layer stays host-agnostic and unit-testable without a real rendering
//! surface. [`TreeContainer`] is the in-memory host used headless and in
//! tests.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ClientError;

/// Attribute tagging the stable wrapper of a streamed block
pub const BLOCK_ATTR: &str = "data-block";

/// One node of the composed output tree
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Node {
    /// Element tag (h1, p, ul, div, ...)
    pub tag: String,
    /// Stable identity; identified nodes replace rather than append
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Style classes, only ever from the node's own metadata
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Other attributes (src, href, style, ...)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    /// Text content for leaf nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Child nodes in render order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create an empty node with the given tag
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    /// Set the text content (builder style)
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a style class (builder style)
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    /// Set an attribute (builder style)
    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Set the stable identity (builder style)
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Append a child (builder style)
    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child in place
    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Whether this node carries the given class
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Depth-first search for a descendant (or self) with the given id
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Node> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_id(id))
    }

    /// Concatenated text of this node and all descendants
    #[must_use]
    pub fn flat_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// Capability interface for a live output container
///
/// Implementations own the mutable render surface; the orchestrator and the
/// chunk assembler only ever talk to this trait.
pub trait Container {
    /// Remove all children
    fn clear(&mut self);

    /// Append a node at the end
    fn append(&mut self, node: Node);

    /// Replace the descendant with the given id wholesale
    ///
    /// Returns false when no descendant matches.
    fn replace_by_id(&mut self, id: &str, node: Node) -> bool;

    /// Append a node into the descendant tagged with the given block id
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when no such block wrapper exists.
    fn append_into(&mut self, block_id: &str, node: Node) -> Result<(), ClientError>;

    /// Set a container-level attribute
    fn set_attribute(&mut self, key: &str, value: &str);

    /// Number of direct children
    fn child_count(&self) -> usize;

    /// Direct children in render order
    fn children(&self) -> &[Node];
}

/// In-memory container backed by a node vector
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TreeContainer {
    /// Container-level attributes
    pub attrs: BTreeMap<String, String>,
    /// Mounted nodes
    pub nodes: Vec<Node>,
}

impl TreeContainer {
    /// Create an empty container
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace_in(nodes: &mut [Node], id: &str, replacement: &Node) -> bool {
    for node in nodes.iter_mut() {
        if node.id.as_deref() == Some(id) {
            *node = replacement.clone();
            return true;
        }
        if replace_in(&mut node.children, id, replacement) {
            return true;
        }
    }
    false
}

fn find_block_mut<'a>(nodes: &'a mut [Node], block_id: &str) -> Option<&'a mut Node> {
    for node in nodes.iter_mut() {
        if node.attrs.get(BLOCK_ATTR).map(String::as_str) == Some(block_id) {
            return Some(node);
        }
        if let Some(found) = find_block_mut(&mut node.children, block_id) {
            return Some(found);
        }
    }
    None
}

impl Container for TreeContainer {
    fn clear(&mut self) {
        self.nodes.clear();
    }

    fn append(&mut self, node: Node) {
        self.nodes.push(node);
    }

    fn replace_by_id(&mut self, id: &str, node: Node) -> bool {
        replace_in(&mut self.nodes, id, &node)
    }

    fn append_into(&mut self, block_id: &str, node: Node) -> Result<(), ClientError> {
        match find_block_mut(&mut self.nodes, block_id) {
            Some(block) => {
                block.children.push(node);
                Ok(())
            }
            None => Err(ClientError::Protocol(format!(
                "no block wrapper tagged '{block_id}'"
            ))),
        }
    }

    fn set_attribute(&mut self, key: &str, value: &str) {
        self.attrs.insert(key.to_string(), value.to_string());
    }

    fn child_count(&self) -> usize {
        self.nodes.len()
    }

    fn children(&self) -> &[Node] {
        &self.nodes
    }
}
