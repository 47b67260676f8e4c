//! Error types for envelope construction.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Invalid header name or value.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Missing required header.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Attachment could not be read.
    #[error("Cannot read attachment {path}: {source}")]
    Attachment {
        /// Path of the attachment.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
