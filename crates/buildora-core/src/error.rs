//! Unified error types for Buildora

use thiserror::Error;

/// Unified error type for all Buildora operations
#[derive(Error, Debug)]
pub enum BuildoraError {
    // Composition / export errors
    #[error("No entry document found: {0}")]
    MissingEntry(String),

    // Generation errors
    #[error("Generated output has no recognizable file markers")]
    FormatMismatch,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Malformed stream frame: {0}")]
    MalformedFrame(String),

    // Archive errors
    #[error("Archive engine error: {0}")]
    ArchiveEngine(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Invalid encoded payload: {0}")]
    InvalidPayload(String),

    // Persistence / configuration
    #[error("Project store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl BuildoraError {
    /// Faults that are surfaced to the user together with a retry affordance
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Api(_) | Self::ArchiveEngine(_)
        )
    }

    /// User-initiated cancellation is silent, never reported as a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using BuildoraError
pub type Result<T> = std::result::Result<T, BuildoraError>;
