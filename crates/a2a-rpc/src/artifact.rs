//! Artifact — outputs produced by a task, possibly streamed in chunks.
//!
//! Each artifact occupies a slot addressed by its `index`. A slot is
//! started by one chunk with `append` unset or false, extended by chunks
//! with `append = true`, and closed by the chunk carrying `lastChunk = true`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::message::Part;

/// An artifact (or one chunk of it) produced by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Human-readable name/title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Description of what this artifact contains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The content parts of this artifact.
    pub parts: Vec<Part>,

    /// Artifact slot.
    #[serde(default)]
    pub index: u32,

    /// When true, `parts` extend the artifact already at `index`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,

    /// Marks the slot complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_chunk: Option<bool>,

    /// Optional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Artifact {
    /// Create a complete single-chunk artifact in slot 0.
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            name: None,
            description: None,
            parts,
            index: 0,
            append: None,
            last_chunk: Some(true),
            metadata: None,
        }
    }

    /// Create a complete artifact with text content.
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(vec![Part::text(content)])
        }
    }

    /// Create a complete artifact with structured data.
    pub fn data(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(vec![Part::data(value)])
        }
    }

    /// Create one text chunk of a streamed artifact.
    pub fn chunk(index: u32, text: impl Into<String>, append: bool, last_chunk: bool) -> Self {
        Self {
            name: None,
            description: None,
            parts: vec![Part::text(text)],
            index,
            append: Some(append),
            last_chunk: Some(last_chunk),
            metadata: None,
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether this chunk extends an existing slot.
    pub fn is_append(&self) -> bool {
        self.append.unwrap_or(false)
    }

    /// Whether this chunk closes its slot.
    pub fn is_last_chunk(&self) -> bool {
        self.last_chunk.unwrap_or(false)
    }

    /// Concatenate the text parts. Chunks of one slot join without a separator.
    pub fn text_content(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    fn extend_with(&mut self, chunk: Artifact) {
        self.parts.extend(chunk.parts);
        self.last_chunk = chunk.last_chunk;
        if chunk.name.is_some() {
            self.name = chunk.name;
        }
        if chunk.description.is_some() {
            self.description = chunk.description;
        }
        self.metadata = merge_metadata(self.metadata.take(), chunk.metadata);
    }
}

/// Fold one artifact chunk into the slots of a task.
///
/// Appending chunks extend the artifact at the same index; non-appending
/// chunks replace it. An append to an empty slot starts that slot.
pub fn merge_into(artifacts: &mut Vec<Artifact>, chunk: Artifact) {
    let existing = artifacts.iter().position(|a| a.index == chunk.index);
    match existing {
        Some(pos) if chunk.is_append() => artifacts[pos].extend_with(chunk),
        Some(pos) => {
            let mut replacement = chunk;
            replacement.append = None;
            artifacts[pos] = replacement;
        }
        None => {
            if chunk.is_append() {
                tracing::warn!(
                    index = chunk.index,
                    "append chunk for an artifact slot that was never started"
                );
            }
            let mut started = chunk;
            started.append = None;
            artifacts.push(started);
        }
    }
}

fn merge_metadata(
    current: Option<serde_json::Value>,
    incoming: Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    match (current, incoming) {
        (Some(serde_json::Value::Object(mut base)), Some(serde_json::Value::Object(extra))) => {
            base.extend(extra);
            Some(serde_json::Value::Object(base))
        }
        (current, None) => current,
        (_, incoming) => incoming,
    }
}
