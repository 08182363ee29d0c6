use thiserror::Error;

/// Main error type for Prospector
#[derive(Error, Debug)]
pub enum ProspectorError {
    /// Database-related errors (accepted store / rejection counter writes)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No valid credential available; the operator must authenticate first
    #[error("Not authenticated: no valid credential")]
    NoCredential,

    /// Neighbor source errors (network / HTTP status / response parse)
    #[error("Neighbor source error: {0}")]
    Source(String),

    /// A triage operation was called without an active session
    #[error("No active triage session")]
    NoSession,

    /// A triage operation was called with the queue exhausted at the cursor
    #[error("No candidate at the current cursor")]
    NoCandidate,
}

/// Convenient Result type using ProspectorError
pub type Result<T> = std::result::Result<T, ProspectorError>;
