//! The envelope: headers plus enclosures, with the SMTP sender and
//! receivers derived from them.

use crate::address::Address;
use crate::enclosure::{Enclosure, write_multipart};
use crate::error::{Error, Result};
use crate::headers::{Header, Headers};

/// A complete outgoing message.
///
/// The SMTP reverse-path and forward-paths come from the headers unless
/// overridden with [`Envelope::with_mail_from`] / [`Envelope::with_rcpt_to`].
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    headers: Headers,
    enclosure: Vec<Enclosure>,
    mail_from: Option<Address>,
    rcpt_to: Option<Vec<Address>>,
}

impl Envelope {
    /// Creates an envelope from headers and body parts.
    #[must_use]
    pub fn new(headers: impl Into<Headers>, enclosure: Vec<Enclosure>) -> Self {
        Self {
            headers: headers.into(),
            enclosure,
            mail_from: None,
            rcpt_to: None,
        }
    }

    /// Overrides the SMTP sender derived from the headers.
    #[must_use]
    pub fn with_mail_from(mut self, address: Address) -> Self {
        self.mail_from = Some(address);
        self
    }

    /// Overrides the SMTP receivers derived from the headers.
    #[must_use]
    pub fn with_rcpt_to(mut self, addresses: Vec<Address>) -> Self {
        self.rcpt_to = Some(addresses);
        self
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the headers for modification.
    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the body parts, in order.
    #[must_use]
    pub fn enclosure(&self) -> &[Enclosure] {
        &self.enclosure
    }

    /// The SMTP sender.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] if no override is set and the headers
    /// name no sender, or an address error if the header is malformed.
    pub fn sender(&self) -> Result<Address> {
        if let Some(address) = &self.mail_from {
            return Ok(address.clone());
        }

        self.headers
            .sender()?
            .map(|mailbox| mailbox.address)
            .ok_or_else(|| Error::MissingHeader("Sender or From".into()))
    }

    /// The SMTP receivers, in header order. May be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a receiver header holds an invalid mailbox.
    pub fn receivers(&self) -> Result<Vec<Address>> {
        if let Some(addresses) = &self.rcpt_to {
            return Ok(addresses.clone());
        }

        Ok(self
            .headers
            .receivers()?
            .into_iter()
            .map(|mailbox| mailbox.address)
            .collect())
    }

    /// Serializes the message: headers, `MIME-Version`, then a
    /// `multipart/mixed` body holding every enclosure.
    #[must_use]
    pub fn string(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut top = Headers::new();
        if !self.headers.contains("mime-version") {
            top.add(Header::known("MIME-Version", "1.0"));
        }

        let mut out = self.headers.to_string();
        write_multipart(&mut out, "mixed", &self.enclosure, &top);
        f.write_str(&out)
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
    use crate::headers::{bcc, from, sender, subject, to};

    fn envelope() -> Envelope {
        Envelope::new(
            vec![
                sender("Me <me@mail.com>"),
                to(["him@mail.com"]),
                subject("subject"),
            ],
            vec![Enclosure::plain_text("Hi!")],
        )
    }

    #[test]
    fn test_sender_from_headers() {
        assert_eq!(envelope().sender().unwrap().as_str(), "me@mail.com");
    }

    #[test]
    fn test_receivers_from_headers() {
        let receivers = envelope().receivers().unwrap();
        assert_eq!(receivers, vec![Address::new("him@mail.com").unwrap()]);
    }

    #[test]
    fn test_missing_sender() {
        let envelope = Envelope::new(vec![to(["him@mail.com"])], vec![]);
        assert!(matches!(envelope.sender(), Err(Error::MissingHeader(_))));
    }

    #[test]
    fn test_overrides() {
        let envelope = envelope()
            .with_mail_from(Address::new("bounce@mail.com").unwrap())
            .with_rcpt_to(vec![Address::new("other@mail.com").unwrap()]);

        assert_eq!(envelope.sender().unwrap().as_str(), "bounce@mail.com");
        assert_eq!(envelope.receivers().unwrap()[0].as_str(), "other@mail.com");
    }

    #[test]
    fn test_no_receivers_is_not_an_error() {
        let envelope = Envelope::new(vec![from("me@mail.com")], vec![]);
        assert!(envelope.receivers().unwrap().is_empty());
    }

    #[test]
    fn test_string_layout() {
        let rendered = String::from_utf8(envelope().string()).unwrap();

        assert!(rendered.starts_with(
            "Sender: Me <me@mail.com>\r\nTo: him@mail.com\r\nSubject: subject\r\n"
        ));
        assert!(rendered.contains("Content-Type: multipart/mixed; boundary="));
        assert!(rendered.contains("MIME-Version: 1.0\r\n"));
        assert!(rendered.contains(
            "Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: 7bit\r\n\r\nHi!\r\n"
        ));
    }

    #[test]
    fn test_string_hides_bcc_but_keeps_receiver() {
        let envelope = Envelope::new(
            vec![from("me@mail.com"), bcc(["secret@mail.com"])],
            vec![Enclosure::plain_text("x")],
        );
        let rendered = envelope.to_string();
        assert!(!rendered.contains("secret@mail.com"));
        assert_eq!(envelope.receivers().unwrap()[0].as_str(), "secret@mail.com");
    }

    #[test]
    fn test_enclosures_in_order() {
        let envelope = Envelope::new(
            vec![from("me@mail.com")],
            vec![Enclosure::plain_text("first"), Enclosure::html("second")],
        );
        let rendered = envelope.to_string();
        let first = rendered.find("first").unwrap();
        let second = rendered.find("second").unwrap();
        assert!(first < second);
    }
}
