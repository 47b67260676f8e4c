//! Email address and mailbox types.

use crate::encoding::{encode_rfc2047, needs_header_encoding};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Characters that force a display name to be quoted (RFC 5322 `specials`).
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// A bare `local@domain` address, as used on the SMTP envelope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or("", |(local, _)| local)
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }

    /// Returns the form handed to a transport for `MAIL FROM` / `RCPT TO`.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0.clone()
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains illegal characters: {addr}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!("Address must contain @: {addr}")));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(format!(
                "Address must have exactly one @: {addr}"
            )));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Local and domain parts cannot be empty: {addr}"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.trim())
    }
}

/// Mailbox (optional display name + address), as written in headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: Address,
}

impl Mailbox {
    /// Creates a new mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            address: Address::new(address)?,
        })
    }

    /// Creates a new mailbox with a display name and address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: Some(name.into()),
            address: Address::new(address)?,
        })
    }

    /// Parses a single mailbox.
    ///
    /// Accepts `Name <addr>`, `"Quoted, Name" <addr>`, `<addr>` and `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the angle brackets are unbalanced or the address
    /// is invalid.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let Some(open) = input.rfind('<') else {
            return Self::new(input);
        };

        let rest = &input[open + 1..];
        let close = rest
            .find('>')
            .ok_or_else(|| Error::InvalidAddress(format!("Unterminated angle address: {input}")))?;

        let address = Address::new(rest[..close].trim())?;
        let name = unquote(input[..open].trim());

        Ok(Self {
            name: (!name.is_empty()).then_some(name),
            address,
        })
    }

    /// Parses a comma-separated mailbox list.
    ///
    /// Commas inside quoted names and angle brackets do not split entries.
    /// Empty entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is not a valid mailbox.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        split_list(input)
            .into_iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            None => write!(f, "{}", self.address),
            Some(name) if needs_header_encoding(name) => {
                let encoded = encode_rfc2047(name, "utf-8");
                write!(f, "{encoded} <{}>", self.address)
            }
            Some(name) if name.contains(SPECIALS) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.address)
            }
            Some(name) => write!(f, "{name} <{}>", self.address),
        }
    }
}

impl FromStr for Mailbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Address> for Mailbox {
    fn from(address: Address) -> Self {
        Self {
            name: None,
            address,
        }
    }
}

/// Strips surrounding double quotes and resolves backslash escapes.
fn unquote(name: &str) -> String {
    let Some(inner) = name
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return name.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn split_list(input: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                entries.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    entries.push(&input[start..]);
    entries
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
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.local_part(), "user");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("").is_err());
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("a@b@c").is_err());
        assert!(Address::new("a b@example.com").is_err());
        assert!(Address::new("<a@example.com>").is_err());
    }

    #[test]
    fn test_encode_is_wire_form() {
        let addr = Address::new("him@mail.com").unwrap();
        assert_eq!(addr.encode(), "him@mail.com");
    }

    #[test]
    fn test_parse_name_and_angle_address() {
        let mailbox = Mailbox::parse("Me <me@mail.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Me"));
        assert_eq!(mailbox.address.as_str(), "me@mail.com");
    }

    #[test]
    fn test_parse_bare_and_bracketed() {
        let bare = Mailbox::parse("  him@mail.com ").unwrap();
        assert!(bare.name.is_none());
        assert_eq!(bare.address.as_str(), "him@mail.com");

        let bracketed = Mailbox::parse("<him@mail.com>").unwrap();
        assert!(bracketed.name.is_none());
        assert_eq!(bracketed.address.as_str(), "him@mail.com");
    }

    #[test]
    fn test_parse_quoted_name() {
        let mailbox = Mailbox::parse(r#""Doe, \"JD\" John" <jd@example.com>"#).unwrap();
        assert_eq!(mailbox.name.as_deref(), Some(r#"Doe, "JD" John"#));
    }

    #[test]
    fn test_parse_unterminated() {
        assert!(Mailbox::parse("Me <me@mail.com").is_err());
    }

    #[test]
    fn test_parse_list() {
        let list =
            Mailbox::parse_list(r#"a@x.com, "Last, First" <b@y.com>,, C <c@z.com>"#).unwrap();
        let addrs: Vec<_> = list.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(addrs, vec!["a@x.com", "b@y.com", "c@z.com"]);
        assert_eq!(list[1].name.as_deref(), Some("Last, First"));
    }

    #[test]
    fn test_display() {
        let plain = Mailbox::with_name("John Doe", "john@example.com").unwrap();
        assert_eq!(plain.to_string(), "John Doe <john@example.com>");

        let special = Mailbox::with_name("Doe, John", "john@example.com").unwrap();
        assert_eq!(special.to_string(), "\"Doe, John\" <john@example.com>");

        let unicode = Mailbox::with_name("Jöhn", "john@example.com").unwrap();
        assert!(unicode.to_string().starts_with("=?utf-8?B?"));

        let bare = Mailbox::new("john@example.com").unwrap();
        assert_eq!(bare.to_string(), "john@example.com");
    }

    #[test]
    fn test_display_encodes_line_breaks_in_name() {
        let mailbox = Mailbox::parse("Evil\r\nBcc: injected <me@x.com>").unwrap();
        let rendered = mailbox.to_string();
        assert!(!rendered.contains(['\r', '\n']));
        assert!(rendered.starts_with("=?utf-8?B?"));
        assert!(rendered.ends_with(" <me@x.com>"));
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let original = Mailbox::with_name("Doe, \"JD\"", "jd@example.com").unwrap();
        let reparsed = Mailbox::parse(&original.to_string()).unwrap();
        assert_eq!(reparsed, original);
    }
}
