//! One-call helpers for the common case: an HTML email with attachments,
//! sent through an SMTP relay with STARTTLS and optional login.

use crate::error::Result;
use crate::middleware;
use crate::options::Options;
use crate::postman::Postman;
use crate::smtp::Smtp;
use mailpost_mime::{Enclosure, Envelope, Headers, headers};
use std::path::PathBuf;

/// Contents of an email built by [`email`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailParams {
    /// `From` mailbox, e.g. `Me <me@example.com>`.
    pub sender: Option<String>,
    /// `To` mailboxes.
    pub receivers: Vec<String>,
    /// `Cc` mailboxes.
    pub cc: Vec<String>,
    /// `Bcc` mailboxes. They receive the mail but are not listed in it.
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// HTML body.
    pub content: String,
    /// Files attached after the body.
    pub attachments: Vec<PathBuf>,
}

/// Builds an envelope with an HTML body and one part per attachment.
///
/// `Date` and `Message-ID` are generated. Empty address lists produce no
/// header.
///
/// # Errors
///
/// Returns an error if an attachment cannot be read.
pub fn email(params: EmailParams) -> Result<Envelope> {
    let mut headers = Headers::new();
    if let Some(sender) = &params.sender {
        headers.add(headers::from(sender));
    }
    if !params.receivers.is_empty() {
        headers.add(headers::to(&params.receivers));
    }
    if !params.cc.is_empty() {
        headers.add(headers::cc(&params.cc));
    }
    if !params.bcc.is_empty() {
        headers.add(headers::bcc(&params.bcc));
    }
    if let Some(subject) = &params.subject {
        headers.add(headers::subject(subject));
    }
    headers.add(headers::date());
    headers.add(headers::message_id());

    let mut enclosure = Vec::with_capacity(params.attachments.len() + 1);
    enclosure.push(Enclosure::html(&params.content));
    for path in &params.attachments {
        enclosure.push(Enclosure::attachment(path)?);
    }

    Ok(Envelope::new(headers, enclosure))
}

/// Creates an SMTP postman that upgrades to TLS and optionally logs in.
///
/// The TLS upgrade runs when the relay offers STARTTLS, or always when
/// `force_tls` is set. Login runs after it when `credentials` are given.
#[must_use]
pub fn postman(
    host: impl Into<String>,
    port: u16,
    credentials: Option<(&str, &str)>,
    force_tls: bool,
    options: Options,
) -> Postman<Smtp> {
    let mut postman = Postman::with_options(host, port, options);
    postman.use_middleware(middleware::tls(force_tls));
    if let Some((username, password)) = credentials {
        postman.use_middleware(middleware::auth(username, password));
    }
    postman
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

    fn params() -> EmailParams {
        EmailParams {
            sender: Some("Me <me@mail.com>".into()),
            receivers: vec!["him@mail.com".into()],
            bcc: vec!["boss@mail.com".into()],
            subject: Some("Report".into()),
            content: "<p>Hi!</p>".into(),
            ..EmailParams::default()
        }
    }

    #[test]
    fn test_email_headers() {
        let envelope = email(params()).unwrap();
        let headers = envelope.headers();

        assert_eq!(headers.get("From"), Some("Me <me@mail.com>"));
        assert_eq!(headers.get("To"), Some("him@mail.com"));
        assert_eq!(headers.get("Subject"), Some("Report"));
        assert!(headers.contains("Date"));
        assert!(headers.contains("Message-ID"));
        assert!(!headers.contains("Cc"));
    }

    #[test]
    fn test_email_sender_and_receivers() {
        let envelope = email(params()).unwrap();

        assert_eq!(envelope.sender().unwrap().as_str(), "me@mail.com");
        let receivers: Vec<String> = envelope
            .receivers()
            .unwrap()
            .iter()
            .map(|a| a.as_str().to_string())
            .collect();
        assert_eq!(receivers, ["him@mail.com", "boss@mail.com"]);
    }

    #[test]
    fn test_email_body_is_html_and_hides_bcc() {
        let envelope = email(params()).unwrap();
        let wire = String::from_utf8(envelope.string()).unwrap();

        assert!(wire.contains("text/html"));
        assert!(wire.contains("<p>Hi!</p>"));
        assert!(!wire.contains("boss@mail.com"));
        assert_eq!(envelope.enclosure().len(), 1);
    }

    #[test]
    fn test_email_missing_attachment() {
        let params = EmailParams {
            attachments: vec![PathBuf::from("/nonexistent/mailpost/report.pdf")],
            ..params()
        };
        assert!(matches!(
            email(params),
            Err(crate::Error::Envelope(mailpost_mime::Error::Attachment { .. }))
        ));
    }

    #[test]
    fn test_postman_wires_middleware() {
        let postman = postman("smtp.example.com", 587, Some(("me", "secret")), false, Options::new());
        assert_eq!(postman.host(), "smtp.example.com");
        assert_eq!(postman.port(), 587);
        assert_eq!(postman.middleware_count(), 2);

        let anonymous = super::postman("smtp.example.com", 25, None, true, Options::new());
        assert_eq!(anonymous.middleware_count(), 1);
    }
}
