//! Postman configuration.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options handed to the transport when a connection is opened.
///
/// `debug_level` is applied by the postman itself; every other key is kept
/// as JSON and interpreted by the transport factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Debug level set on the transport before the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_level: Option<u8>,
    /// Transport-specific keys, passed through unchanged.
    #[serde(flatten)]
    pub transport: BTreeMap<String, serde_json::Value>,
}

impl Options {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport debug level.
    #[must_use]
    pub const fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = Some(level);
        self
    }

    /// Sets a transport-specific key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.transport.insert(key.into(), value.into());
        self
    }

    /// Reads a transport-specific key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is present but does not deserialize
    /// into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.transport
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }
}

/// Everything needed to build a postman, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostmanConfig {
    /// Relay host.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Connection options.
    #[serde(default)]
    pub options: Options,
}

impl PostmanConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serde`] if the JSON is malformed or misses
    /// `host`/`port`, and [`Error::Config`] if the host is blank or the
    /// port is zero.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.host.trim().is_empty() {
            return Err(Error::Config("host cannot be empty".into()));
        }
        if config.port == 0 {
            return Err(Error::Config("port cannot be 0".into()));
        }
        Ok(config)
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
    fn test_flattened_transport_keys() {
        let options: Options =
            serde_json::from_str(r#"{"debug_level": 1, "security": "tls", "timeout_secs": 30}"#)
                .unwrap();

        assert_eq!(options.debug_level, Some(1));
        assert_eq!(options.get::<String>("security").unwrap().as_deref(), Some("tls"));
        assert_eq!(options.get::<u64>("timeout_secs").unwrap(), Some(30));
        assert_eq!(options.get::<u64>("missing").unwrap(), None);
        assert!(options.get::<u64>("security").is_err());
    }

    #[test]
    fn test_builder_round_trips_through_json() {
        let options = Options::new().with_debug_level(2).with("local_hostname", "client.test");
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"debug_level": 2, "local_hostname": "client.test"})
        );
    }

    #[test]
    fn test_config_from_json() {
        let config = PostmanConfig::from_json(r#"{"host": "mx.example.com", "port": 587}"#).unwrap();
        assert_eq!(config.host, "mx.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.options, Options::default());

        assert!(matches!(
            PostmanConfig::from_json(r#"{"host": "mx.example.com"}"#),
            Err(Error::Serde(_))
        ));
    }

    #[test]
    fn test_config_rejects_blank_host_and_zero_port() {
        assert!(matches!(
            PostmanConfig::from_json(r#"{"host": " ", "port": 25}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PostmanConfig::from_json(r#"{"host": "mx.example.com", "port": 0}"#),
            Err(Error::Config(_))
        ));
    }
}
