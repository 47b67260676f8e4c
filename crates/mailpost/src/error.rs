//! Error types for delivery.

use thiserror::Error;

/// Boxed error produced by a transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while connecting or delivering.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be created.
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Relay host.
        host: String,
        /// Relay port.
        port: u16,
        /// Error from the transport factory.
        #[source]
        source: BoxError,
    },

    /// The transport failed during the handshake or a delivery.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// The envelope is missing a sender or holds an unparsable address.
    #[error("Envelope error: {0}")]
    Envelope(#[from] mailpost_mime::Error),

    /// A middleware refused the connection.
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Wraps a transport error.
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }

    /// Returns the underlying transport error if it has type `E`.
    #[must_use]
    pub fn transport_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Connect { source, .. } | Self::Transport(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_downcast() {
        let err = Error::transport(mailpost_smtp::Error::ConnectionClosed);
        assert!(matches!(
            err.transport_error::<mailpost_smtp::Error>(),
            Some(mailpost_smtp::Error::ConnectionClosed)
        ));
        assert!(err.transport_error::<std::io::Error>().is_none());
    }

    #[test]
    fn test_connect_error_display() {
        let err = Error::Connect {
            host: "mx.example.com".into(),
            port: 25,
            source: Box::new(std::io::Error::other("refused")),
        };
        assert_eq!(err.to_string(), "Failed to connect to mx.example.com:25: refused");
        assert!(err.transport_error::<std::io::Error>().is_some());
    }
}
