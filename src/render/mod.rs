//! Rendering pipeline
//!
//! Normalized documents flow through the [`orchestrator`] into [`node`]
//! trees, with leaves resolved by the [`registry`] and progressive delivery
//! handled by [`chunks`].

pub mod chunks;
pub mod node;
pub mod orchestrator;
pub mod registry;

pub use chunks::{ChunkAssembler, ChunkMessage};
pub use node::{Container, Node, TreeContainer, BLOCK_ATTR};
pub use orchestrator::{Metadata, Orchestrator};
pub use registry::{RenderFn, RendererRegistry, DIALOG_EVENT};
