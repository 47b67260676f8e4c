//! The contract between the postman and a mail relay client.
//!
//! A [`Transport`] speaks the wire protocol; a [`TransportFactory`] opens
//! one per connection. The postman never talks to the relay directly, so any
//! type implementing these traits can stand in for SMTP (tests use a
//! recording mock).

use crate::options::Options;
use crate::response::Rejections;

/// An open session with a mail relay.
pub trait Transport {
    /// Error returned by the transport.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sets how much of the conversation the transport logs.
    fn set_debug_level(&mut self, level: u8);

    /// Performs the protocol handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay refuses the greeting.
    fn ehlo(&mut self) -> Result<(), Self::Error>;

    /// Sends one message.
    ///
    /// Returns the recipients the relay refused. Refusals are data: an
    /// implementation must not fail because some or all recipients were
    /// refused.
    ///
    /// # Errors
    ///
    /// Returns an error if the session itself fails.
    fn send_mail(
        &mut self,
        sender: &str,
        receivers: &[String],
        body: &[u8],
    ) -> Result<Rejections, Self::Error>;

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the goodbye exchange fails.
    fn quit(&mut self) -> Result<(), Self::Error>;
}

/// A transport that can upgrade its session to TLS.
pub trait StartTls: Transport {
    /// Checks if the relay advertised an extension in its handshake.
    fn has_extension(&self, name: &str) -> bool;

    /// Upgrades the session to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay refuses the upgrade.
    fn starttls(&mut self) -> Result<(), Self::Error>;
}

/// A transport that can authenticate.
pub trait Login: Transport {
    /// Authenticates with a username and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay rejects the credentials.
    fn login(&mut self, username: &str, password: &str) -> Result<(), Self::Error>;
}

/// Opens transports.
pub trait TransportFactory {
    /// The transport this factory opens.
    type Transport: Transport;

    /// Opens a transport to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay cannot be reached or the options are
    /// invalid for this transport.
    fn connect(
        &self,
        host: &str,
        port: u16,
        options: &Options,
    ) -> Result<Self::Transport, <Self::Transport as Transport>::Error>;
}

/// Factory built from a closure, see [`factory_fn`].
#[derive(Debug, Clone, Copy)]
pub struct FactoryFn<F>(F);

/// Uses a closure as a [`TransportFactory`].
#[must_use]
pub const fn factory_fn<F, T>(connect: F) -> FactoryFn<F>
where
    F: Fn(&str, u16, &Options) -> Result<T, T::Error>,
    T: Transport,
{
    FactoryFn(connect)
}

impl<F, T> TransportFactory for FactoryFn<F>
where
    F: Fn(&str, u16, &Options) -> Result<T, T::Error>,
    T: Transport,
{
    type Transport = T;

    fn connect(&self, host: &str, port: u16, options: &Options) -> Result<T, T::Error> {
        (self.0)(host, port, options)
    }
}
