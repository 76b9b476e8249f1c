//! Declarative Document Model
//!
//! Documents arrive as parsed nested map/array values (YAML parsing happens
//! upstream). [`shorthand`] expands the compact authoring syntax into
//! canonical descriptors; [`descriptor`] is the closed tagged union those
//! descriptors decode into at render time.

pub mod descriptor;
pub mod shorthand;

pub use descriptor::{DialogDescriptor, DialogField, EventDescriptor};
pub use shorthand::{normalize, strip_duplicate_suffix, DISPLAY_KEY};
