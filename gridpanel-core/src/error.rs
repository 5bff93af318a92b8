//! Error types for gridpanel-core.

use thiserror::Error;

/// Result type alias using gridpanel-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving lists, panels and tabs.
#[derive(Error, Debug)]
pub enum Error {
    /// A required identity or definition is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A statement failed against the relational store
    #[error("Query execution failed: {message} (statement: {statement})")]
    QueryExecution { statement: String, message: String },

    /// Store-level failure outside of a single statement
    #[error("Store error: {0}")]
    Store(String),

    /// A detail, tab or list fetch failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request was superseded and its result discarded
    #[error("Request cancelled")]
    Cancelled,

    /// Client and server disagree about the wire shape
    #[error("Protocol mismatch: {0}")]
    Protocol(String),

    /// The host denied the capability a handler requires
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Unknown entity, record or action
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a query execution error carrying the failing statement.
    pub fn query_execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryExecution {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a protocol mismatch error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether this error only signals a superseded request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The SQL statement a query execution error failed on.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::QueryExecution { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}
