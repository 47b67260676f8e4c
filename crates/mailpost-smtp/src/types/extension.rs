//! Service extensions advertised in the EHLO reply.

use std::collections::BTreeMap;

/// Extensions from an EHLO reply, keyed by upper-cased keyword.
///
/// Lookup is case-insensitive. Parameters are kept verbatim, so
/// `SIZE 52428800` maps `SIZE` to `"52428800"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    features: BTreeMap<String, String>,
}

impl Extensions {
    /// Parses the extension lines of an EHLO reply (every line after the
    /// first, which carries the server's greeting).
    #[must_use]
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut features: BTreeMap<String, String> = BTreeMap::new();

        for line in lines {
            let line = line.trim();
            // Pre-RFC servers advertise "AUTH=LOGIN PLAIN" alongside "AUTH".
            if let Some(mechanisms) = line
                .get(..5)
                .filter(|prefix| prefix.eq_ignore_ascii_case("AUTH="))
                .map(|_| line[5..].trim())
            {
                let entry = features.entry("AUTH".to_string()).or_default();
                if !entry.is_empty() {
                    entry.push(' ');
                }
                entry.push_str(mechanisms);
                continue;
            }

            let (keyword, params) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(k, p)| (k, p.trim()));
            if keyword.is_empty() {
                continue;
            }

            let keyword = keyword.to_ascii_uppercase();
            if keyword == "AUTH" {
                let entry = features.entry(keyword).or_default();
                if !entry.is_empty() {
                    entry.push(' ');
                }
                entry.push_str(params);
            } else {
                features.insert(keyword, params.to_string());
            }
        }

        Self { features }
    }

    /// Checks if the server advertised an extension.
    #[must_use]
    pub fn has(&self, keyword: &str) -> bool {
        self.features.contains_key(&keyword.to_ascii_uppercase())
    }

    /// Returns the parameters of an advertised extension.
    #[must_use]
    pub fn params(&self, keyword: &str) -> Option<&str> {
        self.features
            .get(&keyword.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Returns the maximum message size, if advertised with a limit.
    #[must_use]
    pub fn max_size(&self) -> Option<usize> {
        self.params("SIZE")
            .and_then(|p| p.parse().ok())
            .filter(|size| *size > 0)
    }

    /// Returns the authentication mechanisms the client knows, in the order
    /// the server listed them.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        let mut mechanisms = Vec::new();
        for name in self.params("AUTH").unwrap_or_default().split_whitespace() {
            if let Some(mechanism) = AuthMechanism::parse(name) {
                if !mechanisms.contains(&mechanism) {
                    mechanisms.push(mechanism);
                }
            }
        }
        mechanisms
    }

    /// Iterates over `(keyword, params)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if nothing was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` (Google/Microsoft)
    XOAuth2,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
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

    fn ehlo_lines() -> Extensions {
        Extensions::parse([
            "PIPELINING",
            "SIZE 52428800",
            "starttls",
            "AUTH PLAIN LOGIN XOAUTH2",
            "8BITMIME",
        ])
    }

    #[test]
    fn has_is_case_insensitive() {
        let ext = ehlo_lines();
        assert!(ext.has("STARTTLS"));
        assert!(ext.has("starttls"));
        assert!(ext.has("8bitmime"));
        assert!(!ext.has("SMTPUTF8"));
    }

    #[test]
    fn size_limit() {
        assert_eq!(ehlo_lines().max_size(), Some(52_428_800));
        assert_eq!(Extensions::parse(["SIZE"]).max_size(), None);
        assert_eq!(Extensions::parse(["SIZE 0"]).max_size(), None);
    }

    #[test]
    fn auth_mechanisms_in_server_order() {
        assert_eq!(
            ehlo_lines().auth_mechanisms(),
            vec![AuthMechanism::Plain, AuthMechanism::Login, AuthMechanism::XOAuth2]
        );
    }

    #[test]
    fn legacy_auth_equals_syntax() {
        let ext = Extensions::parse(["AUTH=LOGIN", "AUTH PLAIN LOGIN"]);
        assert_eq!(
            ext.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::Plain]
        );
    }

    #[test]
    fn unknown_mechanisms_are_skipped() {
        let ext = Extensions::parse(["AUTH GSSAPI NTLM PLAIN"]);
        assert_eq!(ext.auth_mechanisms(), vec![AuthMechanism::Plain]);
    }

    #[test]
    fn empty_lines_ignored() {
        assert!(Extensions::parse(["", "  "]).is_empty());
    }

    #[test]
    fn mechanism_names() {
        assert_eq!(AuthMechanism::parse("cram-md5"), Some(AuthMechanism::CramMd5));
        assert_eq!(AuthMechanism::Login.as_str(), "LOGIN");
        assert_eq!(AuthMechanism::parse("UNKNOWN"), None);
    }
}
