//! Server error types.

/// Errors raised by the ingest server's own infrastructure.
///
/// Pipeline-level failures (validation, transform, enqueue) are mapped to
/// HTTP responses in the route layer and never surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding, listening or connection-level failures.
    #[error("Network error: {0}")]
    Network(String),
    /// Anything broken inside the server itself.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Network(e.to_string())
    }
}
