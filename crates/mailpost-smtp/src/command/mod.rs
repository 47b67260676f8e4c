//! Commands the client sends.

use crate::types::AuthMechanism;
use std::fmt;

/// One client command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO <hostname>`
    Helo {
        /// Name announced to the server.
        hostname: String,
    },
    /// `EHLO <hostname>`
    Ehlo {
        /// Name announced to the server.
        hostname: String,
    },
    /// `STARTTLS`
    StartTls,
    /// `AUTH <mechanism> [initial-response]`
    Auth {
        /// SASL mechanism.
        mechanism: AuthMechanism,
        /// Base64 initial response, sent on the same line.
        initial_response: Option<String>,
    },
    /// A bare base64 line answering a 334 challenge.
    AuthResponse(String),
    /// `MAIL FROM:<reverse-path> [BODY=..] [SIZE=..]`
    MailFrom {
        /// Reverse-path; empty for bounces.
        from: String,
        /// `BODY` parameter, e.g. `8BITMIME`.
        body: Option<String>,
        /// `SIZE` parameter in bytes.
        size: Option<usize>,
    },
    /// `RCPT TO:<forward-path>`
    RcptTo {
        /// Forward-path.
        to: String,
    },
    /// `DATA`
    Data,
    /// `RSET`
    Rset,
    /// `NOOP`
    Noop,
    /// `QUIT`
    Quit,
}

impl Command {
    /// Returns the command as sent on the wire, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }

    /// Returns the command line for logs, with credentials masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Auth { mechanism, .. } => format!("AUTH {} ****", mechanism.as_str()),
            Self::AuthResponse(_) => "****".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Command {
    /// Writes the command line without its line ending.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                write!(f, "AUTH {}", mechanism.as_str())?;
                match initial_response {
                    Some(response) => write!(f, " {response}"),
                    None => Ok(()),
                }
            }
            Self::AuthResponse(line) => f.write_str(line),
            Self::MailFrom { from, body, size } => {
                write!(f, "MAIL FROM:<{from}>")?;
                if let Some(body) = body {
                    write!(f, " BODY={body}")?;
                }
                if let Some(size) = size {
                    write!(f, " SIZE={size}")?;
                }
                Ok(())
            }
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::Data => f.write_str("DATA"),
            Self::Rset => f.write_str("RSET"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
        }
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

    #[test]
    fn test_greetings() {
        let ehlo = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(ehlo.serialize(), b"EHLO client.example.com\r\n");

        let helo = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(helo.to_string(), "HELO client.example.com");
    }

    #[test]
    fn test_auth_is_masked_in_logs() {
        let plain = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(plain.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(plain.redacted(), "AUTH PLAIN ****");

        let answer = Command::AuthResponse("dXNlcg==".to_string());
        assert_eq!(answer.serialize(), b"dXNlcg==\r\n");
        assert_eq!(answer.redacted(), "****");
    }

    #[test]
    fn test_mail_from_parameters() {
        let cmd = Command::MailFrom {
            from: "sender@example.com".to_string(),
            body: Some("8BITMIME".to_string()),
            size: Some(12345),
        };
        assert_eq!(
            cmd.to_string(),
            "MAIL FROM:<sender@example.com> BODY=8BITMIME SIZE=12345"
        );

        let bounce = Command::MailFrom {
            from: String::new(),
            body: None,
            size: None,
        };
        assert_eq!(bounce.serialize(), b"MAIL FROM:<>\r\n");
    }

    #[test]
    fn test_rcpt_to_is_not_masked() {
        let cmd = Command::RcptTo {
            to: "recipient@example.com".to_string(),
        };
        assert_eq!(cmd.redacted(), "RCPT TO:<recipient@example.com>");
    }

    #[test]
    fn test_bare_verbs() {
        let lines: Vec<String> = [Command::StartTls, Command::Data, Command::Rset, Command::Noop, Command::Quit]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(lines, ["STARTTLS", "DATA", "RSET", "NOOP", "QUIT"]);
    }
}
