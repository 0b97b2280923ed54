//! Error types for EVA Assist.
//!
//! Dialogue problems (bad BAN, unknown intent, missing PDF) never surface
//! here: they end in a bot message. These types cover the infrastructure
//! around the dialogue.

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage lock poisoned: {0}")]
    Poisoned(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Identity store errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Failed to persist user for {context}: {source}")]
    Persist {
        context: String,
        #[source]
        source: StorageError,
    },

    #[error("Stored user record for {context} is corrupt: {reason}")]
    CorruptRecord { context: String, reason: String },
}

/// Bill document errors.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Bill document not found: {0}")]
    NotFound(String),

    #[error("Bill document {path} is empty")]
    Empty { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chat session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {id} not found")]
    NotFound { id: Uuid },

    #[error("Script worker for session {id} has stopped")]
    WorkerStopped { id: Uuid },
}

/// HTTP / WebSocket transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Invalid client frame: {0}")]
    InvalidFrame(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
