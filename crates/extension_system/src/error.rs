//! Error types for extension construction and lifecycle management.

use thiserror::Error;

/// Errors produced by extension implementations.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The opaque config payload for the extension could not be interpreted.
    #[error("Invalid extension config: {0}")]
    Config(String),

    /// Filesystem or socket failure inside the extension.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other extension-specific failure.
    #[error("{0}")]
    Runtime(String),
}

/// Errors produced by the extensions manager while orchestrating extensions.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Failed to create extension {id}: {source}")]
    Construct {
        id: String,
        #[source]
        source: ExtensionError,
    },

    #[error("Extension {id} failed to start: {source}")]
    Start {
        id: String,
        #[source]
        source: ExtensionError,
    },

    #[error("Extension {id} failed to stop: {source}")]
    Stop {
        id: String,
        #[source]
        source: ExtensionError,
    },

    /// A lifecycle task panicked or was aborted before completing.
    #[error("Extension lifecycle task aborted: {0}")]
    TaskAborted(String),
}

impl ManagerError {
    /// The id of the extension the error is attributed to, if any.
    pub fn extension_id(&self) -> Option<&str> {
        match self {
            ManagerError::Construct { id, .. }
            | ManagerError::Start { id, .. }
            | ManagerError::Stop { id, .. } => Some(id),
            ManagerError::TaskAborted(_) => None,
        }
    }
}
