//! Blocking SMTP client.

use super::config::{ClientConfig, Security};
use super::stream::{SmtpStream, connect, connect_tls};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{AuthMechanism, Extensions, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;

/// Recipients refused during a mail transaction, with the server's reply.
pub type Refused = BTreeMap<String, Reply>;

/// SMTP client session.
///
/// State is tracked at runtime: commands that need a greeting issue
/// `EHLO` (or `HELO`) on demand, and every command after [`Client::quit`]
/// fails with [`Error::ConnectionClosed`].
#[derive(Debug)]
pub struct Client {
    stream: Option<SmtpStream>,
    host: String,
    config: ClientConfig,
    greeting: Reply,
    extensions: Option<Extensions>,
    helo_done: bool,
    debug_level: u8,
}

impl Client {
    /// Connects to `host:port` and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the greeting is not 220.
    pub fn connect(host: &str, port: u16, config: ClientConfig) -> Result<Self> {
        tracing::debug!(host, port, security = ?config.security, "Connecting to SMTP server");
        let stream = match config.security {
            Security::None => connect(host, port, config.timeout)?,
            Security::Tls => connect_tls(host, port, config.timeout)?,
        };
        Self::from_stream(stream, host, config)
    }

    /// Creates a client from an open stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server is not
    /// ready.
    pub fn from_stream(mut stream: SmtpStream, host: &str, config: ClientConfig) -> Result<Self> {
        let greeting = read_reply(&mut stream, 0)?.require(ReplyCode::SERVICE_READY)?;

        Ok(Self {
            stream: Some(stream),
            host: host.to_string(),
            config,
            greeting,
            extensions: None,
            helo_done: false,
            debug_level: 0,
        })
    }

    /// Sets the debug level. Above zero, the SMTP conversation is logged at
    /// `debug` level (credentials masked).
    pub const fn set_debug_level(&mut self, level: u8) {
        self.debug_level = level;
    }

    /// Returns the greeting the server sent on connect.
    #[must_use]
    pub const fn greeting(&self) -> &Reply {
        &self.greeting
    }

    /// Returns the extensions from the last successful EHLO.
    #[must_use]
    pub const fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    /// Checks if the server advertised an extension in its EHLO reply.
    #[must_use]
    pub fn has_extension(&self, keyword: &str) -> bool {
        self.extensions.as_ref().is_some_and(|ext| ext.has(keyword))
    }

    /// Returns true once [`Client::quit`] has run or the server hung up.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 250.
    pub fn ehlo(&mut self) -> Result<Reply> {
        let cmd = Command::Ehlo {
            hostname: self.config.local_hostname.clone(),
        };
        self.extensions = None;
        let reply = self.send_command(&cmd)?.require(ReplyCode::OK)?;

        // First line is the server's greeting, the rest are extensions.
        let extensions = Extensions::parse(reply.message.iter().skip(1).map(String::as_str));
        self.extensions = Some(extensions);
        self.helo_done = true;
        Ok(reply)
    }

    /// Sends HELO (for servers without ESMTP).
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 250.
    pub fn helo(&mut self) -> Result<Reply> {
        let cmd = Command::Helo {
            hostname: self.config.local_hostname.clone(),
        };
        let reply = self.send_command(&cmd)?.require(ReplyCode::OK)?;

        self.extensions = None;
        self.helo_done = true;
        Ok(reply)
    }

    /// Greets the server unless that already happened, falling back from
    /// EHLO to HELO.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings are refused.
    pub fn ehlo_or_helo_if_needed(&mut self) -> Result<()> {
        if self.helo_done {
            return Ok(());
        }
        match self.ehlo() {
            Ok(_) => Ok(()),
            Err(Error::SmtpError { .. }) => self.helo().map(|_| ()),
            Err(e) => Err(e),
        }
    }

    /// Upgrades the session to TLS with STARTTLS.
    ///
    /// The server forgets the earlier greeting, so callers should issue
    /// EHLO again afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised, the server refuses
    /// it, or the handshake setup fails.
    pub fn starttls(&mut self) -> Result<()> {
        self.ehlo_or_helo_if_needed()?;
        if !self.has_extension("STARTTLS") {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(&Command::StartTls)?
            .require(ReplyCode::SERVICE_READY)?;

        let stream = self.stream.take().ok_or(Error::ConnectionClosed)?;
        self.stream = Some(stream.upgrade_to_tls(&self.host)?);
        self.extensions = None;
        self.helo_done = false;
        tracing::debug!(host = %self.host, "Upgraded SMTP session to TLS");
        Ok(())
    }

    /// Authenticates with PLAIN or LOGIN, whichever the server offers
    /// (PLAIN preferred).
    ///
    /// # Errors
    ///
    /// Returns an error if the server offers neither mechanism or rejects
    /// the credentials.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.ehlo_or_helo_if_needed()?;
        if !self.has_extension("AUTH") {
            return Err(Error::NotSupported("AUTH".into()));
        }

        let mechanisms = self
            .extensions
            .as_ref()
            .map(Extensions::auth_mechanisms)
            .unwrap_or_default();

        let reply = if mechanisms.contains(&AuthMechanism::Plain) {
            self.auth_plain(username, password)?
        } else if mechanisms.contains(&AuthMechanism::Login) {
            self.auth_login(username, password)?
        } else {
            return Err(Error::NotSupported("AUTH PLAIN or LOGIN".into()));
        };

        if reply.code != ReplyCode::AUTH_SUCCESS {
            return Err(Error::AuthFailed {
                code: reply.code.as_u16(),
                message: reply.message_text(),
            });
        }
        Ok(())
    }

    fn auth_plain(&mut self, username: &str, password: &str) -> Result<Reply> {
        // PLAIN response: \0username\0password
        let credentials = format!("\0{username}\0{password}");
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(STANDARD.encode(credentials.as_bytes())),
        };
        self.send_command(&cmd)
    }

    fn auth_login(&mut self, username: &str, password: &str) -> Result<Reply> {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };

        let mut reply = self.send_command(&cmd)?;
        for secret in [username, password] {
            if reply.code != ReplyCode::AUTH_CONTINUE {
                return Ok(reply);
            }
            let answer = Command::AuthResponse(STANDARD.encode(secret.as_bytes()));
            reply = self.send_command(&answer)?;
        }
        Ok(reply)
    }

    /// Sends one message to every recipient.
    ///
    /// Recipients the server refuses are returned with its reply; they are
    /// data, not errors. When every recipient is refused the transaction is
    /// reset and all refusals are returned. An empty recipient list is passed
    /// to the server as-is.
    ///
    /// `message` should be RFC 5322 formatted. Line endings are normalized
    /// to CRLF and leading dots are stuffed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] before anything is sent if the
    /// sender or a recipient contains line breaks, control characters or
    /// angle brackets. Otherwise returns an error if the sender or the
    /// message data is refused, or on any I/O or protocol failure.
    pub fn send_mail(&mut self, from: &str, recipients: &[String], message: &[u8]) -> Result<Refused> {
        check_path(from)?;
        for recipient in recipients {
            check_path(recipient)?;
        }
        self.ehlo_or_helo_if_needed()?;

        let size = self.has_extension("SIZE").then_some(message.len());
        let body = (self.has_extension("8BITMIME") && !message.is_ascii()).then(|| "8BITMIME".to_string());

        let cmd = Command::MailFrom {
            from: from.to_string(),
            body,
            size,
        };
        let reply = self.send_command(&cmd)?;
        if reply.code != ReplyCode::OK {
            self.reset_quietly();
            return Err(Error::SenderRefused {
                code: reply.code.as_u16(),
                message: reply.message_text(),
                sender: from.to_string(),
            });
        }

        let mut refused = Refused::new();
        for recipient in recipients {
            let cmd = Command::RcptTo { to: recipient.clone() };
            let reply = self.send_command(&cmd)?;
            if reply.code != ReplyCode::OK && reply.code != ReplyCode::FORWARD {
                tracing::debug!(recipient = %recipient, code = %reply.code, "Recipient refused");
                refused.insert(recipient.clone(), reply);
            }
        }

        if !recipients.is_empty() && refused.len() == recipients.len() {
            self.reset_quietly();
            return Ok(refused);
        }

        let reply = self.send_command(&Command::Data)?;
        if reply.code != ReplyCode::START_DATA {
            self.reset_quietly();
            return Err(Error::DataRefused {
                code: reply.code.as_u16(),
                message: reply.message_text(),
            });
        }

        let data = dot_stuff(message);
        let debug_level = self.debug_level;
        let stream = self.stream_mut()?;
        stream.write_all(&data)?;
        let reply = read_reply(stream, debug_level)?;

        if reply.code != ReplyCode::OK {
            return Err(Error::DataRefused {
                code: reply.code.as_u16(),
                message: reply.message_text(),
            });
        }

        Ok(refused)
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or protocol failure.
    pub fn noop(&mut self) -> Result<Reply> {
        self.send_command(&Command::Noop)
    }

    /// Sends RSET, aborting the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or protocol failure.
    pub fn rset(&mut self) -> Result<Reply> {
        self.send_command(&Command::Rset)
    }

    /// Sends QUIT and closes the connection. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails; the connection is closed
    /// either way.
    pub fn quit(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Ok(());
        }

        let result = self.send_command(&Command::Quit);
        self.close();

        let reply = result?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(())
    }

    /// Drops the connection without sending QUIT.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(host = %self.host, "SMTP connection closed");
        }
        self.extensions = None;
        self.helo_done = false;
    }

    fn reset_quietly(&mut self) {
        if let Err(e) = self.rset() {
            tracing::debug!(error = %e, "RSET after refusal failed");
        }
    }

    fn stream_mut(&mut self) -> Result<&mut SmtpStream> {
        self.stream.as_mut().ok_or(Error::ConnectionClosed)
    }

    fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        if self.debug_level > 0 {
            tracing::debug!(target: "mailpost_smtp::wire", "C: {}", cmd.redacted());
        }

        let debug_level = self.debug_level;
        let stream = self.stream_mut()?;
        let result = stream
            .write_all(&cmd.serialize())
            .and_then(|()| read_reply(stream, debug_level));

        if matches!(result, Err(Error::ConnectionClosed)) {
            self.close();
        }
        result
    }
}

/// Rejects addresses that would break out of `<...>` on the command line.
/// An empty path is allowed (null reverse-path).
fn check_path(address: &str) -> Result<()> {
    if address.chars().any(|c| c.is_control() || c == '<' || c == '>') {
        return Err(Error::InvalidAddress(format!(
            "Illegal characters in SMTP path: {address:?}"
        )));
    }
    Ok(())
}

fn read_reply(stream: &mut SmtpStream, debug_level: u8) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line()?;
        if line.is_empty() {
            continue;
        }
        if debug_level > 0 {
            tracing::debug!(target: "mailpost_smtp::wire", "S: {line}");
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Normalizes line endings to CRLF, byte-stuffs leading dots and appends
/// the terminating `.` line.
fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(message.len() + 64);
    let message = message.strip_suffix(b"\n").unwrap_or(message);
    let message = message.strip_suffix(b"\r").unwrap_or(message);

    for line in message.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() == Some(&b'.') {
            data.push(b'.');
        }
        data.extend_from_slice(line);
        data.extend_from_slice(b"\r\n");
    }

    data.extend_from_slice(b".\r\n");
    data
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
    fn test_check_path() {
        assert!(check_path("user@example.com").is_ok());
        assert!(check_path("").is_ok());
        assert!(matches!(
            check_path("x@y.z>\r\nRCPT TO:<evil@y.z"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(check_path("a@b.c\n").is_err());
        assert!(check_path("<a@b.c>").is_err());
        assert!(check_path("a\0@b.c").is_err());
    }

    #[test]
    fn test_dot_stuff_normalizes_and_terminates() {
        assert_eq!(dot_stuff(b"a\nb\r\nc"), b"a\r\nb\r\nc\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_leading_dots() {
        assert_eq!(dot_stuff(b".hidden\r\n..two"), b"..hidden\r\n...two\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_trailing_newline_not_doubled() {
        assert_eq!(dot_stuff(b"body\r\n"), b"body\r\n.\r\n");
    }
}
