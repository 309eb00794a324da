use thiserror::Error;

/// Main error type for Ember+ operations
#[derive(Error, Debug)]
pub enum EmberError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Tree inconsistency: {0}")]
    TreeInconsistency(String),

    #[error("Usage error: {0}")]
    UsageError(String),
}

/// Result type alias for Ember+ operations
pub type EmberResult<T> = Result<T, EmberError>;
