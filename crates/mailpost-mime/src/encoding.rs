//! Content-transfer and header encoders.
//!
//! Only the encoding direction is needed for outgoing mail: Base64,
//! Quoted-Printable and RFC 2047 encoded-words.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as a single line of Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-terminated lines of at most
/// 76 characters, suitable for a MIME body.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);

    // Base64 output is pure ASCII, so byte chunks are char boundaries.
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Hard line breaks (`\n` or `\r\n`) are kept as CRLF; long lines get soft
/// breaks; whitespace at the end of a line is escaped.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        encode_qp_line(line.as_bytes(), &mut result);
        if lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (idx, byte) in line.iter().enumerate() {
        let is_last = idx + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' | b'\t' => !is_last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the trailing "=" of a soft break.
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(char::from(*byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Encodes a header value as an RFC 2047 encoded-word when needed.
///
/// Plain ASCII text without `=?` sequences is returned unchanged.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if !needs_header_encoding(text) {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}

/// Returns true if a header value cannot be written verbatim.
#[must_use]
pub fn needs_header_encoding(text: &str) -> bool {
    !text.is_ascii() || text.contains("=?") || text.contains(['\r', '\n'])
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode() {
        assert_eq!(encode_base64(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_base64_wrapped_lines() {
        let data = vec![0u8; 200];
        let encoded = encode_base64_wrapped(&data);
        let lines: Vec<_> = encoded.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert!(lines.iter().all(|l| l.len() <= MAX_LINE_LENGTH));
        assert_eq!(lines.concat(), encode_base64(&data));
    }

    #[test]
    fn test_quoted_printable_ascii_passthrough() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii() {
        let encoded = encode_quoted_printable("Héllo");
        assert_eq!(encoded, "H=C3=A9llo");
    }

    #[test]
    fn test_quoted_printable_equals_sign() {
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_keeps_hard_breaks() {
        assert_eq!(encode_quoted_printable("one\ntwo\r\nthree"), "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable("end \nnext"), "end=20\r\nnext");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let long = "x".repeat(200);
        let encoded = encode_quoted_printable(&long);
        assert!(encoded.contains("=\r\n"));
        assert_eq!(encoded.replace("=\r\n", ""), long);
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");
        assert_eq!(encode_rfc2047("Héllo", "utf-8"), "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_encodes_newlines() {
        assert!(encode_rfc2047("a\r\nBcc: x@y.z", "utf-8").starts_with("=?utf-8?B?"));
    }

    proptest! {
        #[test]
        fn quoted_printable_lines_stay_short(text in "\\PC{0,300}") {
            let encoded = encode_quoted_printable(&text);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
        }

        #[test]
        fn quoted_printable_output_is_ascii(text in "\\PC{0,300}") {
            prop_assert!(encode_quoted_printable(&text).is_ascii());
        }
    }
}
