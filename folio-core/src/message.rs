//! Wire messages exchanged with an embedded editor surface.
//!
//! Both directions are closed tagged unions discriminated by `kind`:
//!
//! ```text
//! Outbound: { kind: "execCommand" | "getContent" | "setContent" | "setSize", editorId, correlationId?, ... }
//! Inbound:  { kind: "ready" | "focus" | "blur" | "contentResult" | "error", editorId, correlationId?, payload? }
//! ```
//!
//! Anything that does not parse into one of these shapes is rejected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::RichText;
use crate::FolioResult;

/// Routing key for one embedded editor instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorId(String);

impl EditorId {
    /// Wrap an editor identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EditorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token pairing a request with its reply. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages sent to an editor surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// Apply a formatting command. No reply.
    ExecCommand {
        /// Addressed editor.
        editor_id: EditorId,
        /// Editor command name, e.g. `bold` or `JustifyCenter`.
        command: String,
        /// Optional command argument.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// Ask for the serialized content. Answered by `contentResult` or `error`.
    GetContent {
        /// Addressed editor.
        editor_id: EditorId,
        /// Id the reply must carry.
        correlation_id: CorrelationId,
    },
    /// Replace the editor content. No reply.
    SetContent {
        /// Addressed editor.
        editor_id: EditorId,
        /// New content.
        content: RichText,
    },
    /// Inform the surface of its new pixel bounds. No reply.
    SetSize {
        /// Addressed editor.
        editor_id: EditorId,
        /// New width.
        width: f64,
        /// New height.
        height: f64,
    },
}

impl OutboundMessage {
    /// Editor the message is addressed to.
    #[must_use]
    pub fn editor_id(&self) -> &EditorId {
        match self {
            Self::ExecCommand { editor_id, .. }
            | Self::GetContent { editor_id, .. }
            | Self::SetContent { editor_id, .. }
            | Self::SetSize { editor_id, .. } => editor_id,
        }
    }

    /// Serialize for a string-based channel.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> FolioResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages received from an editor surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// The editor finished initializing and accepts commands.
    Ready {
        /// Sending editor.
        editor_id: EditorId,
    },
    /// The editor gained input focus.
    Focus {
        /// Sending editor.
        editor_id: EditorId,
    },
    /// The editor lost input focus.
    Blur {
        /// Sending editor.
        editor_id: EditorId,
    },
    /// Reply to `getContent`.
    ContentResult {
        /// Sending editor.
        editor_id: EditorId,
        /// Id of the request being answered.
        correlation_id: CorrelationId,
        /// Serialized content.
        payload: RichText,
    },
    /// A request failed inside the editor.
    Error {
        /// Sending editor.
        editor_id: EditorId,
        /// Id of the failed request, if the error belongs to one.
        #[serde(default)]
        correlation_id: Option<CorrelationId>,
        /// Description of the failure.
        #[serde(default)]
        payload: Option<String>,
    },
}

impl InboundMessage {
    /// Parse a raw message from the surface.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Serialization`](crate::FolioError::Serialization)
    /// for malformed JSON or an unknown `kind`.
    pub fn parse(raw: &str) -> FolioResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Editor that sent the message.
    #[must_use]
    pub fn editor_id(&self) -> &EditorId {
        match self {
            Self::Ready { editor_id }
            | Self::Focus { editor_id }
            | Self::Blur { editor_id }
            | Self::ContentResult { editor_id, .. }
            | Self::Error { editor_id, .. } => editor_id,
        }
    }
}
