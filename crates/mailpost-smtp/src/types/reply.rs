//! Server replies.

use crate::error::{Error, Result};
use std::fmt;

/// A three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220, greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// 221, answer to QUIT.
    pub const CLOSING: Self = Self(221);
    /// 235, login accepted.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250, command completed.
    pub const OK: Self = Self(250);
    /// 251, recipient accepted for forwarding.
    pub const FORWARD: Self = Self(251);
    /// 334, next SASL step.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354, send the message data.
    pub const START_DATA: Self = Self(354);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the first digit, which classifies the reply.
    #[must_use]
    pub const fn class(self) -> u16 {
        self.0 / 100
    }

    /// 2xx.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }

    /// 3xx.
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.class() == 3
    }

    /// 4xx, worth retrying later.
    #[must_use]
    pub const fn is_transient_failure(self) -> bool {
        self.class() == 4
    }

    /// 5xx.
    #[must_use]
    pub const fn is_permanent_failure(self) -> bool {
        self.class() == 5
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete reply: one code and every text line that came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code.
    pub code: ReplyCode,
    /// Text of each line, without the code prefix.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true for 2xx replies.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Joins the text lines with newlines.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Passes the reply through if it carries `expected`, otherwise turns
    /// it into [`Error::SmtpError`].
    ///
    /// # Errors
    ///
    /// Returns an error if the code differs from `expected`.
    pub fn require(self, expected: ReplyCode) -> Result<Self> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(Error::smtp_error(self.code.as_u16(), self.message_text()))
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message.join(" / "))
    }
}

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

    fn reply(code: u16, lines: &[&str]) -> Reply {
        Reply::new(
            ReplyCode::new(code),
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn test_code_classes() {
        assert!(ReplyCode::CLOSING.is_success());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(ReplyCode::new(421).is_transient_failure());
        assert!(ReplyCode::new(550).is_permanent_failure());
        assert_eq!(ReplyCode::new(550).class(), 5);
    }

    #[test]
    fn test_message_text_joins_lines() {
        let greeting = reply(220, &["smtp.example.com ESMTP", "Ready"]);
        assert!(greeting.is_success());
        assert_eq!(greeting.message_text(), "smtp.example.com ESMTP\nReady");
        assert_eq!(reply(250, &[]).message_text(), "");
    }

    #[test]
    fn test_require() {
        assert!(reply(250, &["OK"]).require(ReplyCode::OK).is_ok());

        let err = reply(451, &["Try later"]).require(ReplyCode::OK).unwrap_err();
        assert_eq!(err.code(), Some(451));
        assert!(err.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(reply(250, &["a", "b"]).to_string(), "250 a / b");
    }
}
