//! Error types for shopmcp
//!
//! Centralized error handling using thiserror. Every variant belongs to one
//! fault class (see [`FaultKind`]) so callers can tell a dead child process
//! from a garbled reply from a rejected business rule.

use thiserror::Error;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Spawn failure, broken pipe, premature end-of-stream
    Transport,
    /// A request/response exchange exceeded its deadline
    Timeout,
    /// A reply that is not valid JSON or lacks an expected field
    Protocol,
    /// A business-rule or argument violation
    Application,
    /// The external translator or presentation service failed
    Translator,
    /// Bad configuration
    Config,
}

/// All error types that can occur in shopmcp
#[derive(Debug, Error)]
pub enum ShopError {
    /// The tool server process could not be started
    #[error("Failed to spawn tool server '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// Reading from or writing to the pipe failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer closed its output before a reply line arrived
    #[error("Tool server closed the stream before replying")]
    StreamClosed,

    /// No reply within the configured deadline
    #[error("Request '{method}' timed out after {after_ms}ms")]
    Timeout { method: String, after_ms: u64 },

    /// Reply could not be understood; the raw text is kept for diagnosis
    #[error("Protocol error: {message} (raw: {raw})")]
    Protocol { message: String, raw: String },

    /// The server answered with a top-level error object
    #[error("Server error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Invocation arguments were unusable before dispatch
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Translator or presentation layer failure
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShopError {
    /// Build a protocol error that preserves the offending line.
    pub fn protocol(message: impl Into<String>, raw: impl Into<String>) -> Self {
        ShopError::Protocol {
            message: message.into(),
            raw: raw.into(),
        }
    }

    pub fn fault_kind(&self) -> FaultKind {
        match self {
            ShopError::Spawn { .. } | ShopError::Transport(_) | ShopError::StreamClosed | ShopError::Io(_) => {
                FaultKind::Transport
            }
            ShopError::Timeout { .. } => FaultKind::Timeout,
            ShopError::Protocol { .. } | ShopError::Rpc { .. } | ShopError::Json(_) => FaultKind::Protocol,
            ShopError::InvalidArguments(_) => FaultKind::Application,
            ShopError::Llm(_) => FaultKind::Translator,
            ShopError::Config(_) => FaultKind::Config,
        }
    }

    /// True when the child process can no longer be talked to.
    pub fn is_transport(&self) -> bool {
        self.fault_kind() == FaultKind::Transport
    }
}

/// Result type alias for shopmcp operations
pub type Result<T> = std::result::Result<T, ShopError>;
