//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned an error reply to a session-level command.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// The server refused the `MAIL FROM` sender.
    #[error("Sender {sender} refused ({code}): {message}")]
    SenderRefused {
        /// Reply code.
        code: u16,
        /// Error message from server.
        message: String,
        /// The refused sender.
        sender: String,
    },

    /// The server refused the message data.
    #[error("Message data refused ({code}): {message}")]
    DataRefused {
        /// Reply code.
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Authentication was rejected.
    #[error("Authentication failed ({code}): {message}")]
    AuthFailed {
        /// Reply code.
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// A sender or recipient cannot be written as an SMTP path.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// The connection was closed by the server or by `quit`.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns the reply code carried by this error, if any.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::SmtpError { code, .. }
            | Self::SenderRefused { code, .. }
            | Self::DataRefused { code, .. }
            | Self::AuthFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.code(), Some(code) if code >= 500 && code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.code(), Some(code) if code >= 400 && code < 500)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let permanent = Error::smtp_error(550, "no such user");
        assert!(permanent.is_permanent());
        assert!(!permanent.is_transient());

        let transient = Error::DataRefused {
            code: 451,
            message: "try later".into(),
        };
        assert!(transient.is_transient());
        assert_eq!(transient.code(), Some(451));

        assert_eq!(Error::ConnectionClosed.code(), None);
    }
}
