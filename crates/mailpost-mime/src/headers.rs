//! Message headers and header builders.
//!
//! Builders such as [`from`], [`to`] and [`subject`] return a [`Header`];
//! a [`Headers`] collection keeps them in insertion order and derives the
//! envelope sender and receivers from them.

use crate::address::Mailbox;
use crate::encoding::{encode_rfc2047, needs_header_encoding};
use crate::error::{Error, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fmt;

/// Headers holding mailbox lists, re-rendered on output so display names get
/// encoded.
const ADDRESS_HEADERS: &[&str] = &[
    "from",
    "sender",
    "to",
    "cc",
    "reply-to",
    "resent-from",
    "resent-sender",
    "resent-to",
    "resent-cc",
];

/// Headers that name receivers but are never written out.
const HIDDEN_HEADERS: &[&str] = &["bcc", "resent-bcc"];

/// A single header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    /// Creates a header with an arbitrary name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains characters not
    /// allowed in a field name.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_graphic() && b != b':');
        if !valid {
            return Err(Error::InvalidHeader(format!("Invalid header name: {name:?}")));
        }
        Ok(Self::known(name, value))
    }

    pub(crate) fn known(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the header name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw (unencoded) value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Checks the name case-insensitively.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns the value as written on the wire.
    fn encoded_value(&self) -> String {
        let lower = self.name.to_ascii_lowercase();
        if ADDRESS_HEADERS.contains(&lower.as_str()) {
            if let Ok(mailboxes) = Mailbox::parse_list(&self.value) {
                return mailboxes
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
            }
        }
        encode_rfc2047(&self.value, "utf-8")
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.encoded_value())
    }
}

/// `From` header.
#[must_use]
pub fn from(mailbox: impl AsRef<str>) -> Header {
    Header::known("From", mailbox.as_ref())
}

/// `Sender` header.
#[must_use]
pub fn sender(mailbox: impl AsRef<str>) -> Header {
    Header::known("Sender", mailbox.as_ref())
}

/// `To` header listing every given mailbox.
#[must_use]
pub fn to<I, S>(mailboxes: I) -> Header
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Header::known("To", join(mailboxes))
}

/// `Cc` header listing every given mailbox.
#[must_use]
pub fn cc<I, S>(mailboxes: I) -> Header
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Header::known("Cc", join(mailboxes))
}

/// `Bcc` header. Counted as receivers, never serialized.
#[must_use]
pub fn bcc<I, S>(mailboxes: I) -> Header
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Header::known("Bcc", join(mailboxes))
}

/// `Reply-To` header.
#[must_use]
pub fn reply_to(mailbox: impl AsRef<str>) -> Header {
    Header::known("Reply-To", mailbox.as_ref())
}

/// `Subject` header.
#[must_use]
pub fn subject(text: impl AsRef<str>) -> Header {
    Header::known("Subject", text.as_ref())
}

/// `Date` header for the current local time.
#[must_use]
pub fn date() -> Header {
    date_at(&Local::now())
}

/// `Date` header for a given time.
#[must_use]
pub fn date_at<Tz: TimeZone>(time: &DateTime<Tz>) -> Header
where
    Tz::Offset: fmt::Display,
{
    Header::known("Date", time.to_rfc2822())
}

/// `Message-ID` header with a random id on this host's domain.
#[must_use]
pub fn message_id() -> Header {
    message_id_with(None, &local_hostname())
}

/// `Message-ID` header with an optional extra id string and explicit domain.
#[must_use]
pub fn message_id_with(idstring: Option<&str>, domain: &str) -> Header {
    let unique = uuid::Uuid::new_v4().simple().to_string();
    let id = match idstring {
        Some(extra) => format!("<{unique}.{extra}@{domain}>"),
        None => format!("<{unique}@{domain}>"),
    };
    Header::known("Message-ID", id)
}

/// `Content-Disposition` header, e.g. `attachment; filename="a.pdf"`.
#[must_use]
pub fn content_disposition(disposition: &str, filename: Option<&str>) -> Header {
    let value = match filename {
        Some(name) if needs_header_encoding(name) => {
            format!("{disposition}; filename=\"{}\"", encode_rfc2047(name, "utf-8"))
        }
        Some(name) => {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("{disposition}; filename=\"{escaped}\"")
        }
        None => disposition.to_string(),
    };
    Header::known("Content-Disposition", value)
}

/// Returns this machine's host name, or `localhost` if it cannot be read.
#[must_use]
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn join<I, S>(mailboxes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    mailboxes
        .into_iter()
        .map(|m| m.as_ref().trim().to_string())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered collection of email headers with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, keeping any existing ones with the same name.
    pub fn add(&mut self, header: Header) {
        self.entries.push(header);
    }

    /// Sets a header, replacing existing ones with the same name. The new
    /// value takes the position of the first replaced header.
    pub fn set(&mut self, header: Header) {
        match self.entries.iter().position(|h| h.is(&header.name)) {
            Some(pos) => {
                let name = header.name.clone();
                self.entries[pos] = header;
                let mut idx = 0;
                self.entries.retain(|h| {
                    let keep = idx <= pos || !h.is(&name);
                    idx += 1;
                    keep
                });
            }
            None => self.entries.push(header),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|h| h.is(name)).map(Header::value)
    }

    /// Gets all values for a header, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|h| h.is(name))
            .map(Header::value)
            .collect()
    }

    /// Checks whether a header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|h| h.is(name))
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|h| !h.is(name));
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    /// Returns the number of header fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the message is being resent (has a `Resent-Date` header).
    #[must_use]
    pub fn is_resent(&self) -> bool {
        self.contains("resent-date")
    }

    /// Derives the sender mailbox.
    ///
    /// Resent messages use `Resent-Sender`, then `Resent-From`; others use
    /// `Sender`, then `From`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen header does not hold a valid mailbox.
    pub fn sender(&self) -> Result<Option<Mailbox>> {
        let candidates: [&str; 2] = if self.is_resent() {
            ["resent-sender", "resent-from"]
        } else {
            ["sender", "from"]
        };

        candidates
            .iter()
            .find_map(|name| self.get(name))
            .map(Mailbox::parse)
            .transpose()
    }

    /// Derives every receiver mailbox, in header order.
    ///
    /// Resent messages use the `Resent-To`/`Resent-Cc`/`Resent-Bcc` headers;
    /// others use `To`/`Cc`/`Bcc`.
    ///
    /// # Errors
    ///
    /// Returns an error if any listed mailbox is invalid.
    pub fn receivers(&self) -> Result<Vec<Mailbox>> {
        let names: [&str; 3] = if self.is_resent() {
            ["resent-to", "resent-cc", "resent-bcc"]
        } else {
            ["to", "cc", "bcc"]
        };

        let mut receivers = Vec::new();
        for name in names {
            for value in self.get_all(name) {
                receivers.extend(Mailbox::parse_list(value)?);
            }
        }
        Ok(receivers)
    }
}

impl fmt::Display for Headers {
    /// Writes the headers as CRLF-terminated lines, omitting blind copies.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.entries {
            let lower = header.name.to_ascii_lowercase();
            if HIDDEN_HEADERS.contains(&lower.as_str()) {
                continue;
            }
            write!(f, "{header}\r\n")?;
        }
        Ok(())
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<Header> for Headers {
    fn extend<I: IntoIterator<Item = Header>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl From<Vec<Header>> for Headers {
    fn from(entries: Vec<Header>) -> Self {
        Self { entries }
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
    use chrono::{FixedOffset, TimeZone};

    fn addresses(mailboxes: &[Mailbox]) -> Vec<&str> {
        mailboxes.iter().map(|m| m.address.as_str()).collect()
    }

    #[test]
    fn test_header_new_validates_name() {
        assert!(Header::new("X-Custom", "1").is_ok());
        assert!(Header::new("", "1").is_err());
        assert!(Header::new("Bad Name", "1").is_err());
        assert!(Header::new("Bad:Name", "1").is_err());
    }

    #[test]
    fn test_builders() {
        assert_eq!(from("Me <me@mail.com>").to_string(), "From: Me <me@mail.com>");
        assert_eq!(
            to(["a@x.com", "b@y.com"]).to_string(),
            "To: a@x.com, b@y.com"
        );
        assert_eq!(subject("subject").to_string(), "Subject: subject");
    }

    #[test]
    fn test_address_header_cannot_inject_lines() {
        let injected = from("Evil\r\nBcc: injected <me@x.com>").to_string();
        assert!(!injected.contains(['\r', '\n']));
        assert!(injected.starts_with("From: =?utf-8?B?"));

        let early_body = from("Evil\r\n\r\nbody <me@x.com>").to_string();
        assert!(!early_body.contains(['\r', '\n']));
        assert!(early_body.ends_with(" <me@x.com>"));

        let unparsable = to(["a@x.com\r\nBcc: b@y.com"]).to_string();
        assert!(!unparsable.contains(['\r', '\n']));
    }

    #[test]
    fn test_subject_encoding() {
        assert_eq!(subject("Héllo").to_string(), "Subject: =?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_date_at() {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap();
        let header = date_at(&time);
        assert_eq!(header.name(), "Date");
        assert!(header.value().starts_with("Tue, "));
        assert!(header.value().ends_with("Jan 2024 03:04:05 +0000"));
    }

    #[test]
    fn test_message_id_with() {
        let header = message_id_with(Some("news"), "example.com");
        assert!(header.value().starts_with('<'));
        assert!(header.value().ends_with(".news@example.com>"));
        assert_ne!(message_id().value(), message_id().value());
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("attachment", Some("a.pdf")).value(),
            "attachment; filename=\"a.pdf\""
        );
        assert_eq!(content_disposition("inline", None).value(), "inline");
    }

    #[test]
    fn test_headers_keep_insertion_order() {
        let headers: Headers = vec![subject("s"), from("a@x.com"), to(["b@y.com"])].into();
        let names: Vec<_> = headers.iter().map(Header::name).collect();
        assert_eq!(names, vec!["Subject", "From", "To"]);
    }

    #[test]
    fn test_headers_case_insensitive_get() {
        let mut headers = Headers::new();
        headers.add(subject("Test"));
        assert_eq!(headers.get("subject"), Some("Test"));
        assert_eq!(headers.get("SUBJECT"), Some("Test"));
    }

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers: Headers = vec![to(["a@x.com"]), subject("s"), to(["b@x.com"])].into();
        headers.set(to(["c@x.com"]));
        assert_eq!(headers.get_all("to"), vec!["c@x.com"]);
        assert_eq!(headers.iter().next().map(Header::name), Some("To"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers: Headers = vec![subject("s")].into();
        headers.remove("Subject");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_sender_prefers_sender_over_from() {
        let headers: Headers = vec![from("a@x.com"), sender("Me <me@mail.com>")].into();
        let mailbox = headers.sender().unwrap().unwrap();
        assert_eq!(mailbox.address.as_str(), "me@mail.com");
    }

    #[test]
    fn test_sender_falls_back_to_from() {
        let headers: Headers = vec![from("a@x.com")].into();
        assert_eq!(headers.sender().unwrap().unwrap().address.as_str(), "a@x.com");
        assert!(Headers::new().sender().unwrap().is_none());
    }

    #[test]
    fn test_receivers_include_bcc() {
        let headers: Headers = vec![
            to(["a@x.com", "B <b@x.com>"]),
            cc(["c@x.com"]),
            bcc(["d@x.com"]),
        ]
        .into();
        let receivers = headers.receivers().unwrap();
        assert_eq!(addresses(&receivers), vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
    }

    #[test]
    fn test_resent_headers() {
        let headers: Headers = vec![
            from("orig@x.com"),
            to(["orig-rcpt@x.com"]),
            Header::new("Resent-Date", "Tue, 2 Jan 2024 03:04:05 +0000").unwrap(),
            Header::new("Resent-From", "fwd@x.com").unwrap(),
            Header::new("Resent-To", "new@x.com").unwrap(),
            Header::new("Resent-Bcc", "hidden@x.com").unwrap(),
        ]
        .into();

        assert!(headers.is_resent());
        assert_eq!(headers.sender().unwrap().unwrap().address.as_str(), "fwd@x.com");
        assert_eq!(
            addresses(&headers.receivers().unwrap()),
            vec!["new@x.com", "hidden@x.com"]
        );
    }

    #[test]
    fn test_display_hides_bcc() {
        let headers: Headers = vec![from("a@x.com"), to(["b@x.com"]), bcc(["c@x.com"])].into();
        let rendered = headers.to_string();
        assert_eq!(rendered, "From: a@x.com\r\nTo: b@x.com\r\n");
    }

    #[test]
    fn test_display_encodes_unicode_display_names() {
        let headers: Headers = vec![from("Jöhn <john@x.com>")].into();
        let rendered = headers.to_string();
        assert!(rendered.starts_with("From: =?utf-8?B?"));
        assert!(rendered.ends_with(" <john@x.com>\r\n"));
    }
}
