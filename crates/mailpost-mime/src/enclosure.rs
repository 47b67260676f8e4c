//! Body parts ("enclosures") of an outgoing message.

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable};
use crate::error::{Error, Result};
use crate::headers::{Header, Headers, content_disposition};
use std::fmt;
use std::path::Path;

/// Longest line allowed in a 7bit body (RFC 5322).
const MAX_7BIT_LINE: usize = 998;

/// Content transfer encodings produced for outgoing parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII, written as-is.
    SevenBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

#[derive(Debug, Clone)]
enum Body {
    /// Already transfer-encoded content.
    Single {
        encoding: TransferEncoding,
        content: String,
    },
    Multipart {
        subtype: String,
        parts: Vec<Enclosure>,
    },
}

/// One MIME body part: text, HTML, binary data, a file attachment, or a
/// nested collection of parts.
#[derive(Debug, Clone)]
pub struct Enclosure {
    content_type: ContentType,
    headers: Headers,
    body: Body,
}

impl Enclosure {
    /// A `text/plain; charset=utf-8` part.
    #[must_use]
    pub fn plain_text(text: impl AsRef<str>) -> Self {
        Self::text(ContentType::text_plain("utf-8"), text.as_ref())
    }

    /// A `text/html; charset=utf-8` part.
    #[must_use]
    pub fn html(text: impl AsRef<str>) -> Self {
        Self::text(ContentType::text_html("utf-8"), text.as_ref())
    }

    fn text(content_type: ContentType, text: &str) -> Self {
        let fits_7bit = text.is_ascii() && text.lines().all(|line| line.len() <= MAX_7BIT_LINE);

        let body = if fits_7bit {
            Body::Single {
                encoding: TransferEncoding::SevenBit,
                content: normalize_newlines(text),
            }
        } else {
            Body::Single {
                encoding: TransferEncoding::QuotedPrintable,
                content: encode_quoted_printable(text),
            }
        };

        Self {
            content_type,
            headers: Headers::new(),
            body,
        }
    }

    /// A base64-encoded part of the given MIME type (e.g. `image/png`).
    ///
    /// # Errors
    ///
    /// Returns an error if `mimetype` is not a valid content type.
    pub fn binary(data: &[u8], mimetype: &str) -> Result<Self> {
        Ok(Self::base64(ContentType::parse(mimetype)?, data))
    }

    fn base64(content_type: ContentType, data: &[u8]) -> Self {
        Self {
            content_type,
            headers: Headers::new(),
            body: Body::Single {
                encoding: TransferEncoding::Base64,
                content: encode_base64_wrapped(data),
            },
        }
    }

    /// A file attachment. The content type is guessed from the file
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn attachment(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Attachment {
            path: path.display().to_string(),
            source,
        })?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        let mut enclosure = Self::base64(ContentType::from_path(path), &data);
        enclosure
            .headers
            .add(content_disposition("attachment", filename.as_deref()));
        Ok(enclosure)
    }

    /// A nested `multipart/<subtype>` part holding other enclosures, e.g.
    /// `alternative` for a text + HTML pair.
    #[must_use]
    pub fn collection(parts: Vec<Self>, subtype: impl Into<String>) -> Self {
        let subtype = subtype.into();
        Self {
            content_type: ContentType::new("multipart", subtype.clone()),
            headers: Headers::new(),
            body: Body::Multipart { subtype, parts },
        }
    }

    /// Adds an extra header to this part.
    #[must_use]
    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.add(header);
        self
    }

    /// Returns the content type (without the boundary for collections).
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Returns the transfer encoding, or `None` for collections.
    #[must_use]
    pub const fn transfer_encoding(&self) -> Option<TransferEncoding> {
        match &self.body {
            Body::Single { encoding, .. } => Some(*encoding),
            Body::Multipart { .. } => None,
        }
    }

    /// Returns the extra headers of this part.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Writes the part (headers, blank line, body) to `out`.
    pub(crate) fn write_to(&self, out: &mut String) {
        match &self.body {
            Body::Single { encoding, content } => {
                push_line(out, &format!("Content-Type: {}", self.content_type));
                push_line(out, &format!("Content-Transfer-Encoding: {encoding}"));
                out.push_str(&self.headers.to_string());
                out.push_str("\r\n");
                out.push_str(content);
            }
            Body::Multipart { subtype, parts } => {
                write_multipart(out, subtype, parts, &self.headers);
            }
        }
    }
}

/// Writes a `multipart/<subtype>` entity with a fresh boundary.
pub(crate) fn write_multipart(out: &mut String, subtype: &str, parts: &[Enclosure], headers: &Headers) {
    let boundary = new_boundary();
    let content_type = ContentType::multipart(subtype, boundary.as_str());

    push_line(out, &format!("Content-Type: {content_type}"));
    out.push_str(&headers.to_string());
    out.push_str("\r\n");

    for part in parts {
        push_line(out, &format!("--{boundary}"));
        part.write_to(out);
        if !out.ends_with("\r\n") {
            out.push_str("\r\n");
        }
    }
    push_line(out, &format!("--{boundary}--"));
}

/// Generates a boundary that cannot occur in base64 or quoted-printable
/// output (`=_` is never produced by either).
fn new_boundary() -> String {
    format!("=_{}", uuid::Uuid::new_v4().simple())
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}

fn normalize_newlines(text: &str) -> String {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\r\n")
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
    use crate::headers::Header;

    fn render(enclosure: &Enclosure) -> String {
        let mut out = String::new();
        enclosure.write_to(&mut out);
        out
    }

    #[test]
    fn test_plain_text_ascii_is_7bit() {
        let enclosure = Enclosure::plain_text("Hi!\nBye");
        assert_eq!(enclosure.transfer_encoding(), Some(TransferEncoding::SevenBit));
        assert_eq!(
            render(&enclosure),
            "Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 7bit\r\n\
             \r\n\
             Hi!\r\nBye"
        );
    }

    #[test]
    fn test_html_non_ascii_is_quoted_printable() {
        let enclosure = Enclosure::html("<p>Héllo</p>");
        assert_eq!(
            enclosure.transfer_encoding(),
            Some(TransferEncoding::QuotedPrintable)
        );
        let rendered = render(&enclosure);
        assert!(rendered.starts_with("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(rendered.ends_with("<p>H=C3=A9llo</p>"));
    }

    #[test]
    fn test_binary() {
        let enclosure = Enclosure::binary(b"Hello, World!", "application/octet-stream").unwrap();
        assert_eq!(enclosure.transfer_encoding(), Some(TransferEncoding::Base64));
        assert!(render(&enclosure).ends_with("\r\n\r\nSGVsbG8sIFdvcmxkIQ==\r\n"));
        assert!(Enclosure::binary(b"x", "nonsense").is_err());
    }

    #[test]
    fn test_attachment() {
        let path = std::env::temp_dir().join(format!("mailpost-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"attached").unwrap();

        let enclosure = Enclosure::attachment(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(enclosure.content_type().essence(), "text/plain");
        let disposition = enclosure.headers().get("content-disposition").unwrap();
        assert!(disposition.starts_with("attachment; filename=\"mailpost-"));
        assert!(render(&enclosure).contains("YXR0YWNoZWQ="));
    }

    #[test]
    fn test_attachment_missing_file() {
        let err = Enclosure::attachment("/definitely/not/here.bin").unwrap_err();
        assert!(matches!(err, Error::Attachment { .. }));
    }

    #[test]
    fn test_with_header() {
        let enclosure = Enclosure::plain_text("x")
            .with_header(Header::new("Content-ID", "<part1>").unwrap());
        assert!(render(&enclosure).contains("Content-ID: <part1>\r\n\r\nx"));
    }

    #[test]
    fn test_collection() {
        let enclosure = Enclosure::collection(
            vec![Enclosure::plain_text("text"), Enclosure::html("<b>html</b>")],
            "alternative",
        );
        assert_eq!(enclosure.transfer_encoding(), None);

        let rendered = render(&enclosure);
        let first = rendered.lines().next().unwrap();
        let boundary = first.split("boundary=\"").nth(1).unwrap().trim_end_matches('"');
        assert!(first.starts_with("Content-Type: multipart/alternative;"));
        assert_eq!(rendered.matches(&format!("--{boundary}\r\n")).count(), 2);
        assert!(rendered.ends_with(&format!("--{boundary}--\r\n")));
    }
}
