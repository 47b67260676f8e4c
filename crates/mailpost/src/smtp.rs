//! SMTP as the default transport.
//!
//! Recognized option keys:
//!
//! - `security`: `"none"` (default) or `"tls"` for implicit TLS
//! - `timeout_secs`: socket timeout in seconds
//! - `local_hostname`: name announced in EHLO

use crate::options::Options;
use crate::response::{Rejection, Rejections};
use crate::transport::{Login, StartTls, Transport, TransportFactory};
use mailpost_smtp::{Client, ClientConfig, Security};
use std::time::Duration;

/// Opens [`mailpost_smtp::Client`] sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Smtp;

impl TransportFactory for Smtp {
    type Transport = Client;

    fn connect(&self, host: &str, port: u16, options: &Options) -> mailpost_smtp::Result<Client> {
        Client::connect(host, port, client_config(options)?)
    }
}

/// Builds the SMTP client settings from postman options.
///
/// # Errors
///
/// Returns [`mailpost_smtp::Error::InvalidConfig`] if a recognized key has
/// the wrong type or value.
pub fn client_config(options: &Options) -> mailpost_smtp::Result<ClientConfig> {
    let mut config = ClientConfig::default();

    if let Some(security) = option::<String>(options, "security")? {
        config = config.with_security(security.parse::<Security>()?);
    }
    if let Some(secs) = option::<f64>(options, "timeout_secs")? {
        let timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
            mailpost_smtp::Error::InvalidConfig(format!("timeout_secs: {e}"))
        })?;
        config = config.with_timeout(timeout);
    }
    if let Some(hostname) = option::<String>(options, "local_hostname")? {
        config = config.with_local_hostname(hostname);
    }

    Ok(config)
}

fn option<T: serde::de::DeserializeOwned>(
    options: &Options,
    key: &str,
) -> mailpost_smtp::Result<Option<T>> {
    options
        .get(key)
        .map_err(|e| mailpost_smtp::Error::InvalidConfig(format!("{key}: {e}")))
}

impl Transport for Client {
    type Error = mailpost_smtp::Error;

    fn set_debug_level(&mut self, level: u8) {
        Self::set_debug_level(self, level);
    }

    fn ehlo(&mut self) -> mailpost_smtp::Result<()> {
        Self::ehlo(self).map(|_| ())
    }

    fn send_mail(
        &mut self,
        sender: &str,
        receivers: &[String],
        body: &[u8],
    ) -> mailpost_smtp::Result<Rejections> {
        let refused = Self::send_mail(self, sender, receivers, body)?;
        Ok(refused
            .into_iter()
            .map(|(address, reply)| {
                let rejection = Rejection::new(reply.code.as_u16(), reply.message_text());
                (address, rejection)
            })
            .collect())
    }

    fn quit(&mut self) -> mailpost_smtp::Result<()> {
        Self::quit(self)
    }
}

impl StartTls for Client {
    fn has_extension(&self, name: &str) -> bool {
        Self::has_extension(self, name)
    }

    fn starttls(&mut self) -> mailpost_smtp::Result<()> {
        Self::starttls(self)
    }
}

impl Login for Client {
    fn login(&mut self, username: &str, password: &str) -> mailpost_smtp::Result<()> {
        Self::login(self, username, password)
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
    fn test_client_config_from_options() {
        let options = Options::new()
            .with("security", "tls")
            .with("timeout_secs", 2.5)
            .with("local_hostname", "client.test");
        let config = client_config(&options).unwrap();

        assert_eq!(config.security, Security::Tls);
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.local_hostname, "client.test");
    }

    #[test]
    fn test_client_config_defaults() {
        let config = client_config(&Options::new().with_debug_level(1)).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_client_config_rejects_bad_values() {
        let bad_security = Options::new().with("security", "carrier-pigeon");
        assert!(matches!(
            client_config(&bad_security),
            Err(mailpost_smtp::Error::InvalidConfig(_))
        ));

        let bad_timeout = Options::new().with("timeout_secs", -1);
        assert!(matches!(
            client_config(&bad_timeout),
            Err(mailpost_smtp::Error::InvalidConfig(_))
        ));

        let wrong_type = Options::new().with("local_hostname", 42);
        assert!(client_config(&wrong_type).is_err());
    }
}
