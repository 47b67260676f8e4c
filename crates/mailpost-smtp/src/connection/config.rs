//! Client session settings.

use std::str::FromStr;
use std::time::Duration;

/// How the TCP connection is secured when it is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Security {
    /// Plain TCP. STARTTLS can still upgrade the session later.
    #[default]
    None,
    /// Implicit TLS from the first byte (usually port 465).
    Tls,
}

impl FromStr for Security {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "tls" | "ssl" => Ok(Self::Tls),
            other => Err(crate::Error::InvalidConfig(format!("unknown security mode: {other}"))),
        }
    }
}

/// Settings for [`Client`](super::Client) sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Name announced in EHLO/HELO.
    pub local_hostname: String,
    /// Connect, read and write timeout. `None` blocks indefinitely.
    pub timeout: Option<Duration>,
    /// Transport security for the initial connection.
    pub security: Security,
}

impl ClientConfig {
    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn with_local_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.local_hostname = hostname.into();
        self
    }

    /// Sets the socket timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the transport security.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            local_hostname: mailpost_mime::headers::local_hostname(),
            timeout: None,
            security: Security::None,
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
    fn test_security_from_str() {
        assert_eq!("none".parse::<Security>().unwrap(), Security::None);
        assert_eq!("TLS".parse::<Security>().unwrap(), Security::Tls);
        assert_eq!("ssl".parse::<Security>().unwrap(), Security::Tls);
        assert!("starttls-ish".parse::<Security>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.local_hostname, mailpost_mime::headers::local_hostname());
        assert_eq!(config.timeout, None);
        assert_eq!(config.security, Security::None);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::default()
            .with_local_hostname("client.example.com")
            .with_timeout(Duration::from_secs(5))
            .with_security(Security::Tls);
        assert_eq!(config.local_hostname, "client.example.com");
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.security, Security::Tls);
    }
}
