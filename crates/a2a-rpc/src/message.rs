//! Message — one conversational turn inside a task.
//!
//! A Message carries one or more Parts (text, file, or structured data)
//! and a role saying whether the client (`user`) or the remote agent
//! (`agent`) produced it. The role is fixed for the whole message.

use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};

/// A message exchanged between a client and an agent during a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Role of the sender.
    pub role: Role,

    /// Content parts of the message, in order.
    pub parts: Vec<Part>,

    /// Optional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Message {
    /// Create a message from the user (client side).
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
            metadata: None,
        }
    }

    /// Create a message from the remote agent.
    pub fn agent(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Agent,
            parts,
            metadata: None,
        }
    }

    /// Convenience: create a user message with a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::text(text)])
    }

    /// Convenience: create an agent message with a single text part.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::agent(vec![Part::text(text)])
    }

    /// Extract all text content from this message, one part per line.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The client side of the conversation.
    User,
    /// The remote agent.
    Agent,
}

/// A part of a message or artifact.
///
/// Tagged by a `type` field on the wire; each variant carries only the
/// fields relevant to its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    /// Plain text content.
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },

    /// Arbitrary structured data.
    Data {
        data: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },

    /// File content, inline or by reference.
    File {
        file: FilePart,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            metadata: None,
        }
    }

    /// Create a structured data part.
    pub fn data(data: serde_json::Value) -> Self {
        Self::Data {
            data,
            metadata: None,
        }
    }

    /// Create a file part from inline bytes (base64-encoded on the wire).
    pub fn file_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        use base64::Engine;
        Self::File {
            file: FilePart {
                name: Some(name.into()),
                mime_type: Some(mime_type.into()),
                content: FileContent::Bytes {
                    bytes: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
            },
            metadata: None,
        }
    }

    /// Create a file part referencing a URI.
    pub fn file_uri(uri: impl Into<String>, name: Option<String>) -> Self {
        Self::File {
            file: FilePart {
                name,
                mime_type: None,
                content: FileContent::Uri { uri: uri.into() },
            },
            metadata: None,
        }
    }

    /// The text payload, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text, .. } => Some(text.as_str()),
            Part::Data { .. } | Part::File { .. } => None,
        }
    }
}

/// A file carried by a [`Part::File`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    /// Optional filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MIME type of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Inline bytes or a URI, never both.
    #[serde(flatten)]
    pub content: FileContent,
}

impl FilePart {
    /// Decode inline bytes. `None` for URI references or invalid base64.
    pub fn decode_bytes(&self) -> Option<Vec<u8>> {
        use base64::Engine;
        match &self.content {
            FileContent::Bytes { bytes } => base64::engine::general_purpose::STANDARD
                .decode(bytes)
                .ok(),
            FileContent::Uri { .. } => None,
        }
    }
}

/// Where the file content lives.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum FileContent {
    /// Base64-encoded inline content.
    Bytes { bytes: String },
    /// Reference to content elsewhere.
    Uri { uri: String },
}

impl<'de> Deserialize<'de> for FileContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            bytes: Option<String>,
            uri: Option<String>,
        }

        match Raw::deserialize(deserializer)? {
            Raw {
                bytes: Some(bytes),
                uri: None,
            } => Ok(FileContent::Bytes { bytes }),
            Raw {
                bytes: None,
                uri: Some(uri),
            } => Ok(FileContent::Uri { uri }),
            Raw {
                bytes: Some(_),
                uri: Some(_),
            } => Err(de::Error::custom("file has both `bytes` and `uri`")),
            Raw {
                bytes: None,
                uri: None,
            } => Err(de::Error::custom("file needs `bytes` or `uri`")),
        }
    }
}
