//! Progressive Chunk Assembler
//!
//! Servers may split one logical document into numbered fragments so output
//! appears as it is produced. The assembler validates the sequence, runs
//! every fragment through the full orchestrator pipeline, and keeps streamed
//! fragments flowing into the stable block wrapper the first chunk created.
//! Rendering a split document must end in the same tree as rendering the
//! whole document at once.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::shorthand::normalize;
use crate::error::ClientError;
use crate::render::node::{Container, Node, BLOCK_ATTR};
use crate::render::orchestrator::{Metadata, Orchestrator};

/// One fragment of a progressively delivered document
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChunkMessage {
    /// Position in the stream, starting at 1
    pub chunk_num: u64,
    /// Advisory list of top-level keys this fragment covers
    #[serde(default)]
    pub keys: Vec<String>,
    /// The document fragment itself
    pub data: Value,
    /// Pause point: rendered, then the stream waits for the next chunk
    #[serde(default)]
    pub is_gate: bool,
}

/// Stateful assembler for one chunk stream at a time
pub struct ChunkAssembler {
    orchestrator: Orchestrator,
    last_chunk: u64,
    active_block: Option<String>,
    block_seq: u64,
    gated: bool,
}

impl ChunkAssembler {
    /// Create an assembler rendering through the given orchestrator
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            last_chunk: 0,
            active_block: None,
            block_seq: 0,
            gated: false,
        }
    }

    /// Forget the current stream; unrelated client state is unaffected
    pub fn reset(&mut self) {
        self.last_chunk = 0;
        self.active_block = None;
        self.gated = false;
    }

    /// Whether the last rendered chunk was a gate awaiting the next chunk
    #[must_use]
    pub fn is_gated(&self) -> bool {
        self.gated
    }

    /// Render one fragment into the target
    ///
    /// Chunk #1 always starts a fresh stream and clears the target. Later
    /// chunks must arrive with strictly consecutive numbers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] on an out-of-sequence chunk; the
    /// stream state is reset and the next chunk #1 starts over.
    pub fn render_chunk(
        &mut self,
        chunk: &ChunkMessage,
        target: &mut dyn Container,
    ) -> Result<(), ClientError> {
        if chunk.chunk_num == 1 {
            target.clear();
            self.reset();
        } else if chunk.chunk_num != self.last_chunk + 1 {
            let expected = self.last_chunk + 1;
            self.reset();
            return Err(ClientError::Protocol(format!(
                "chunk {} out of sequence, expected {expected}",
                chunk.chunk_num
            )));
        }
        debug!(
            chunk_num = chunk.chunk_num,
            keys = ?chunk.keys,
            is_gate = chunk.is_gate,
            "rendering chunk"
        );

        let normalized = normalize(&chunk.data);
        if chunk.chunk_num == 1 {
            self.open_stream(&normalized, target);
        } else {
            self.continue_stream(&normalized, target)?;
        }

        self.last_chunk = chunk.chunk_num;
        self.gated = chunk.is_gate;
        Ok(())
    }

    /// First fragment: when it carries block-level metadata, mount one stable
    /// wrapper and route the stream into it; otherwise render straight into
    /// the target.
    fn open_stream(&mut self, normalized: &Value, target: &mut dyn Container) {
        let metadata = normalized
            .as_object()
            .map(Metadata::extract)
            .unwrap_or_default();
        let has_block_metadata =
            !metadata.classes.is_empty() || metadata.style.is_some() || metadata.id.is_some();

        let nodes = self.orchestrator.compose_level(normalized);
        if has_block_metadata {
            let block_id = metadata.id.clone().unwrap_or_else(|| {
                self.block_seq += 1;
                format!("block_{}", self.block_seq)
            });
            let mut wrapper = Node::new("div").with_attr(BLOCK_ATTR, block_id.clone());
            wrapper.classes = metadata.classes;
            if let Some(style) = metadata.style {
                wrapper.attrs.insert("style".to_string(), style);
            }
            wrapper.id = metadata.id;
            wrapper.children = nodes;
            target.append(wrapper);
            self.active_block = Some(block_id);
        } else {
            for node in nodes {
                target.append(node);
            }
        }
    }

    /// Later fragments append into the active block wrapper by id lookup,
    /// or at top level when the stream opened without one.
    fn continue_stream(
        &mut self,
        normalized: &Value,
        target: &mut dyn Container,
    ) -> Result<(), ClientError> {
        let nodes = self.orchestrator.compose_level(normalized);
        match &self.active_block {
            Some(block_id) => {
                for node in nodes {
                    if let Err(e) = target.append_into(block_id, node) {
                        warn!(error = %e, block_id, "block wrapper lost mid-stream");
                        self.reset();
                        return Err(e);
                    }
                }
            }
            None => {
                for node in nodes {
                    target.append(node);
                }
            }
        }
        Ok(())
    }
}
