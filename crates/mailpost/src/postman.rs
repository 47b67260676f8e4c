//! Connection lifecycle and delivery.

use crate::error::{Error, Result};
use crate::middleware::Middleware;
use crate::options::{Options, PostmanConfig};
use crate::response::Response;
use crate::smtp::Smtp;
use crate::transport::{Transport, TransportFactory};
use mailpost_mime::{Address, Envelope};
use std::ops::{Deref, DerefMut};

/// An open transport that is closed when dropped.
///
/// Derefs to the transport. Dropping the guard sends `quit` exactly once,
/// whichever way the owning scope is left; a failed `quit` on drop is only
/// logged. Use [`Connection::close`] to observe that error instead.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    transport: T,
    closed: bool,
}

impl<T: Transport> Connection<T> {
    const fn new(transport: T) -> Self {
        Self {
            transport,
            closed: false,
        }
    }

    /// Closes the connection now.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if `quit` fails.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.transport.quit().map_err(Error::transport)
    }

    /// Swaps in a new transport and closes the old one.
    fn replace(&mut self, transport: T) {
        let mut old = std::mem::replace(&mut self.transport, transport);
        quit_logged(&mut old);
    }
}

impl<T: Transport> Deref for Connection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> DerefMut for Connection<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            quit_logged(&mut self.transport);
        }
    }
}

fn quit_logged<T: Transport>(transport: &mut T) {
    match transport.quit() {
        Ok(()) => tracing::trace!("Transport connection closed"),
        Err(e) => tracing::warn!(error = %e, "Failed to close transport connection"),
    }
}

/// Delivers envelopes to one relay.
///
/// A postman holds the relay address, the options passed to the transport,
/// and the middleware run on each new connection. It keeps no per-delivery
/// state, so one instance serves any number of [`send`](Self::send) calls.
///
/// # Example
///
/// ```no_run
/// use mailpost::{Postman, middleware};
/// use mailpost_mime::{Enclosure, Envelope, headers};
///
/// # fn main() -> mailpost::Result<()> {
/// let mut postman = Postman::new("smtp.example.com", 587);
/// postman.use_middleware(middleware::tls(false));
/// postman.use_middleware(middleware::auth("me@example.com", "secret"));
///
/// let envelope = Envelope::new(
///     vec![
///         headers::from("Me <me@example.com>"),
///         headers::to(["you@example.com"]),
///         headers::subject("Hello"),
///     ],
///     vec![Enclosure::plain_text("Hi!")],
/// );
///
/// let response = postman.send(&envelope)?;
/// assert!(response.ok());
/// # Ok(())
/// # }
/// ```
pub struct Postman<F: TransportFactory = Smtp> {
    host: String,
    port: u16,
    options: Options,
    transport: F,
    middlewares: Vec<Middleware<F::Transport>>,
}

impl Postman<Smtp> {
    /// Creates an SMTP postman with default options.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_options(host, port, Options::default())
    }

    /// Creates an SMTP postman with the given options.
    #[must_use]
    pub fn with_options(host: impl Into<String>, port: u16, options: Options) -> Self {
        Self::with_transport(host, port, options, Smtp)
    }

    /// Creates an SMTP postman from a loaded configuration.
    #[must_use]
    pub fn from_config(config: PostmanConfig) -> Self {
        Self::with_options(config.host, config.port, config.options)
    }
}

impl<F: TransportFactory> Postman<F> {
    /// Creates a postman that opens connections through `transport`.
    #[must_use]
    pub fn with_transport(host: impl Into<String>, port: u16, options: Options, transport: F) -> Self {
        Self {
            host: host.into(),
            port,
            options,
            transport,
            middlewares: Vec::new(),
        }
    }

    /// Starts building a postman that opens connections through `transport`.
    #[must_use]
    pub fn builder(host: impl Into<String>, port: u16, transport: F) -> PostmanBuilder<F> {
        PostmanBuilder {
            postman: Self::with_transport(host, port, Options::default(), transport),
        }
    }

    /// Returns the relay host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the relay port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the connection options.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the number of registered middleware.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    /// Registers a middleware, run after any already registered.
    ///
    /// When a middleware returns `Ok(Some(replacement))`, the transport it
    /// was given is quit right away and the replacement is used from then
    /// on. A replacement must therefore own its session: wrapping a handle
    /// to the same underlying connection does not work, since that
    /// connection is closed by the quit.
    pub fn use_middleware<M>(&mut self, middleware: M)
    where
        M: Fn(&mut F::Transport) -> Result<Option<F::Transport>> + Send + Sync + 'static,
    {
        self.middlewares.push(Box::new(middleware));
    }

    /// Opens a connection, performs the handshake and runs the middleware.
    ///
    /// The debug level from the options is applied before the handshake.
    /// If the handshake or a middleware fails, the connection is closed
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the transport cannot be opened,
    /// [`Error::Transport`] if the handshake fails, or whatever error a
    /// middleware returns.
    pub fn connection(&self) -> Result<Connection<F::Transport>> {
        tracing::debug!(host = %self.host, port = self.port, "Opening connection");

        let transport = self
            .transport
            .connect(&self.host, self.port, &self.options)
            .map_err(|e| Error::Connect {
                host: self.host.clone(),
                port: self.port,
                source: Box::new(e),
            })?;

        let mut conn = Connection::new(transport);
        if let Some(level) = self.options.debug_level {
            conn.set_debug_level(level);
        }
        conn.ehlo().map_err(Error::transport)?;

        for middleware in &self.middlewares {
            if let Some(replacement) = middleware(&mut *conn)? {
                conn.replace(replacement);
            }
        }
        tracing::trace!(middlewares = self.middlewares.len(), "Connection ready");

        Ok(conn)
    }

    /// Delivers an envelope over an open connection.
    ///
    /// Recipients the relay refuses end up in the [`Response`]; they are
    /// not errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Envelope`] if no sender can be derived from the
    /// envelope, or [`Error::Transport`] if the transport fails.
    #[allow(clippy::unused_self)]
    pub fn deliver(&self, conn: &mut F::Transport, envelope: &Envelope) -> Result<Response> {
        let sender = envelope.sender()?.encode();
        let receivers: Vec<String> = envelope
            .receivers()?
            .iter()
            .map(Address::encode)
            .collect();
        let body = envelope.string();

        let rejected = conn
            .send_mail(&sender, &receivers, &body)
            .map_err(Error::transport)?;
        let response = Response::new(rejected);

        tracing::debug!(
            sender = %sender,
            receivers = receivers.len(),
            rejected = response.rejected().len(),
            "Envelope delivered"
        );
        Ok(response)
    }

    /// Opens a connection, delivers the envelope and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns any error from [`connection`](Self::connection) or
    /// [`deliver`](Self::deliver).
    pub fn send(&self, envelope: &Envelope) -> Result<Response> {
        let mut conn = self.connection()?;
        self.deliver(&mut conn, envelope)
    }
}

impl<F> std::fmt::Debug for Postman<F>
where
    F: TransportFactory + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Postman")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("options", &self.options)
            .field("transport", &self.transport)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// Builder returned by [`Postman::builder`].
pub struct PostmanBuilder<F: TransportFactory> {
    postman: Postman<F>,
}

impl<F: TransportFactory> PostmanBuilder<F> {
    /// Sets the connection options.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.postman.options = options;
        self
    }

    /// Sets the transport debug level.
    #[must_use]
    pub const fn debug_level(mut self, level: u8) -> Self {
        self.postman.options.debug_level = Some(level);
        self
    }

    /// Adds a middleware.
    #[must_use]
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Fn(&mut F::Transport) -> Result<Option<F::Transport>> + Send + Sync + 'static,
    {
        self.postman.use_middleware(middleware);
        self
    }

    /// Builds the postman.
    #[must_use]
    pub fn build(self) -> Postman<F> {
        self.postman
    }
}
