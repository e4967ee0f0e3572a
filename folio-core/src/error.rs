//! Error types for workspace operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for workspace operations.
pub type FolioResult<T> = Result<T, FolioError>;

/// Errors that can occur in workspace operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FolioError {
    /// The editor surface did not answer a request in time.
    #[error("Editor {editor_id} did not respond within {timeout:?}")]
    BridgeTimeout {
        /// Editor the request was addressed to.
        editor_id: String,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// A bridge call was made after its element was removed.
    #[error("Editor {0} has been disposed")]
    BridgeDisposed(String),

    /// The editor surface answered a request with an error.
    #[error("Editor {editor_id} reported an error: {message}")]
    BridgeRemote {
        /// Editor that reported the error.
        editor_id: String,
        /// Message supplied by the editor.
        message: String,
    },

    /// An image could not be picked, read or decoded.
    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    /// A stored document was malformed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The external store failed to load or save.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Operation not permitted in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for FolioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for FolioError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}
