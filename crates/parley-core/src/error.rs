use thiserror::Error;

/// Top-level error type for Parley.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Invalid or missing configuration. Fatal before any task starts.
    #[error("config error: {0}")]
    Config(String),

    /// The chat session could not be started (browser launch, login).
    #[error("session error: {0}")]
    Session(String),

    /// Error from an LLM provider (bad status, quota, malformed response).
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the chat collaborator while reading or sending.
    #[error("channel error: {0}")]
    Channel(String),

    /// A collaborator call timed out or could not connect.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A collaborator reported a temporary server-side failure.
    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ParleyError {
    /// Whether the calling component may retry the failed call.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }

    /// Whether this error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Session(_))
    }
}
