//! Shorthand Normalizer
//!
//! Pure transform expanding the compact document syntax into canonical
//! `{event, ...fields}` descriptors. No I/O, no mutation of the input, and
//! idempotent: normalizing an already-canonical document is a no-op.
//!
//! A matched shorthand value is rewritten under its original key as
//! `{ "zDisplay": { "event": ..., ...fields } }`:
//!
//! ```text
//! { "zH2": { "label": "Title" } }
//!   => { "zH2": { "zDisplay": { "event": "header", "indent": 2, "label": "Title" } } }
//! ```
//!
//! Values shaped incompatibly with their matched shorthand are left
//! unexpanded; the orchestrator surfaces them later as unknown events rather
//! than failing normalization.

use serde_json::{Map, Value};

/// Key marking a canonical leaf descriptor inside a document node
pub const DISPLAY_KEY: &str = "zDisplay";

/// Key marking a dialog descriptor inside a document node
pub const DIALOG_KEY: &str = "zDialog";

/// Shorthand patterns recognized on document keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shorthand {
    Header(u8),
    Text,
    Markdown,
    Bullets,
    Numbered,
    Table,
    Image,
    Link,
}

/// Plural shorthand keys expanded inside list values: collections of
/// same-typed items, each becoming one canonical descriptor.
const PLURALS: &[(&str, &str)] = &[("zLinks", "link"), ("zImgs", "image"), ("zTexts", "text")];

/// Strip a parser-added duplicate-key disambiguation suffix (`__<digits>`)
///
/// Only used for pattern matching; output documents keep the original key.
#[must_use]
pub fn strip_duplicate_suffix(key: &str) -> &str {
    if let Some(pos) = key.rfind("__") {
        if key.len() > pos + 2 && key[pos + 2..].bytes().all(|b| b.is_ascii_digit()) {
            return &key[..pos];
        }
    }
    key
}

fn match_shorthand(base: &str) -> Option<Shorthand> {
    if let Some(rest) = base.strip_prefix("zH") {
        if rest.len() == 1 {
            if let Some(level @ b'1'..=b'6') = rest.bytes().next() {
                return Some(Shorthand::Header(level - b'0'));
            }
        }
        return None;
    }
    match base {
        "zText" => Some(Shorthand::Text),
        "zMd" => Some(Shorthand::Markdown),
        "zBullets" => Some(Shorthand::Bullets),
        "zNumbered" => Some(Shorthand::Numbered),
        "zTable" => Some(Shorthand::Table),
        "zImg" => Some(Shorthand::Image),
        "zLink" => Some(Shorthand::Link),
        _ => None,
    }
}

/// Normalize a raw document into canonical form
///
/// Recurses through maps and arrays. Any map already carrying a canonical
/// descriptor is opaque: it passes through byte-for-byte, descriptor fields
/// included, which is what makes the transform idempotent.
#[must_use]
pub fn normalize(doc: &Value) -> Value {
    match doc {
        Value::Object(map) if map.contains_key(DISPLAY_KEY) => doc.clone(),
        Value::Object(map) => Value::Object(normalize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

fn normalize_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let base = strip_duplicate_suffix(key);
        let normalized = match match_shorthand(base) {
            Some(pattern) if !is_canonical(value) => match expand(pattern, value) {
                Some(descriptor) => wrap_display(descriptor),
                None => normalize(value),
            },
            _ => normalize(value),
        };
        out.insert(key.clone(), normalized);
    }
    out
}

/// A value already carrying a canonical descriptor passes through unchanged
fn is_canonical(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key(DISPLAY_KEY))
}

fn wrap_display(descriptor: Map<String, Value>) -> Value {
    let mut node = Map::with_capacity(1);
    node.insert(DISPLAY_KEY.to_string(), Value::Object(descriptor));
    Value::Object(node)
}

fn descriptor(event: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("event".to_string(), Value::String(event.to_string()));
    map
}

/// Expand one matched shorthand value into a canonical descriptor map
///
/// Returns `None` for incompatible shapes.
fn expand(pattern: Shorthand, value: &Value) -> Option<Map<String, Value>> {
    match pattern {
        Shorthand::Header(level) => expand_header(level, value),
        Shorthand::Text => expand_text("text", value),
        Shorthand::Markdown => expand_text("markdown", value),
        Shorthand::Bullets => expand_list(false, value),
        Shorthand::Numbered => expand_list(true, value),
        Shorthand::Table => expand_fields("table", value),
        Shorthand::Image => expand_with_string_field("image", "src", value),
        Shorthand::Link => expand_with_string_field("link", "href", value),
    }
}

fn expand_header(level: u8, value: &Value) -> Option<Map<String, Value>> {
    let mut desc = descriptor("header");
    desc.insert("indent".to_string(), Value::from(level));
    match value {
        Value::String(label) => {
            desc.insert("label".to_string(), Value::String(label.clone()));
        }
        Value::Object(fields) => {
            for (k, v) in fields {
                desc.insert(k.clone(), v.clone());
            }
            desc.insert("event".to_string(), Value::String("header".to_string()));
            desc.insert("indent".to_string(), Value::from(level));
        }
        _ => return None,
    }
    Some(desc)
}

fn expand_text(event: &str, value: &Value) -> Option<Map<String, Value>> {
    let mut desc = descriptor(event);
    match value {
        Value::String(text) => {
            desc.insert("text".to_string(), Value::String(text.clone()));
        }
        Value::Object(fields) => {
            for (k, v) in fields {
                desc.insert(k.clone(), v.clone());
            }
            desc.insert("event".to_string(), Value::String(event.to_string()));
        }
        _ => return None,
    }
    Some(desc)
}

fn expand_fields(event: &str, value: &Value) -> Option<Map<String, Value>> {
    let Value::Object(fields) = value else {
        return None;
    };
    let mut desc = descriptor(event);
    for (k, v) in fields {
        desc.insert(k.clone(), v.clone());
    }
    desc.insert("event".to_string(), Value::String(event.to_string()));
    Some(desc)
}

fn expand_with_string_field(
    event: &str,
    string_field: &str,
    value: &Value,
) -> Option<Map<String, Value>> {
    match value {
        Value::String(s) => {
            let mut desc = descriptor(event);
            desc.insert(string_field.to_string(), Value::String(s.clone()));
            Some(desc)
        }
        Value::Object(_) => expand_fields(event, value),
        _ => None,
    }
}

fn expand_list(ordered: bool, value: &Value) -> Option<Map<String, Value>> {
    let mut desc = descriptor("list");
    desc.insert("ordered".to_string(), Value::Bool(ordered));

    match value {
        Value::Array(items) => {
            desc.insert("items".to_string(), Value::Array(items.clone()));
        }
        Value::Object(fields) => {
            let mut items = Vec::new();
            for (plural_key, singular_event) in PLURALS {
                if let Some(Value::Array(entries)) = fields.get(*plural_key) {
                    for entry in entries {
                        if let Some(item) = plural_item(singular_event, entry) {
                            items.push(item);
                        }
                    }
                }
            }
            for (k, v) in fields {
                let base = strip_duplicate_suffix(k);
                if PLURALS.iter().any(|(plural, _)| *plural == base) {
                    continue;
                }
                if base == "items" {
                    if let Value::Array(explicit) = v {
                        items.extend(explicit.iter().cloned());
                    }
                    continue;
                }
                desc.insert(k.clone(), v.clone());
            }
            desc.insert("event".to_string(), Value::String("list".to_string()));
            desc.insert("ordered".to_string(), Value::Bool(ordered));
            desc.insert("items".to_string(), Value::Array(items));
        }
        _ => return None,
    }
    Some(desc)
}

/// One entry of a plural collection as a canonical item descriptor
fn plural_item(event: &str, entry: &Value) -> Option<Value> {
    match entry {
        Value::Object(fields) => {
            let mut item = descriptor(event);
            for (k, v) in fields {
                item.insert(k.clone(), v.clone());
            }
            item.insert("event".to_string(), Value::String(event.to_string()));
            Some(Value::Object(item))
        }
        Value::String(s) => {
            let mut item = descriptor(event);
            let field = match event {
                "link" => "href",
                "image" => "src",
                _ => "text",
            };
            item.insert(field.to_string(), Value::String(s.clone()));
            Some(Value::Object(item))
        }
        _ => None,
    }
}
