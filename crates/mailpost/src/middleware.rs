//! Hooks run on every new connection, right after the handshake.
//!
//! A middleware gets the live transport and may prepare it in place
//! (`Ok(None)`), hand back a replacement (`Ok(Some(new))`), or abort the
//! connection with an error.

use crate::error::{Error, Result};
use crate::transport::{Login, StartTls};

/// A connection hook.
pub type Middleware<T> = Box<dyn Fn(&mut T) -> Result<Option<T>> + Send + Sync>;

/// Boxes a closure as a [`Middleware`].
#[must_use]
pub fn from_fn<T, F>(f: F) -> Middleware<T>
where
    F: Fn(&mut T) -> Result<Option<T>> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Upgrades the session with STARTTLS, then repeats the handshake.
///
/// Without `force`, the upgrade only happens when the relay advertises
/// STARTTLS.
#[must_use]
pub fn tls<T>(force: bool) -> Middleware<T>
where
    T: StartTls + 'static,
{
    Box::new(move |conn: &mut T| -> Result<Option<T>> {
        if force || conn.has_extension("STARTTLS") {
            conn.starttls().map_err(Error::transport)?;
            conn.ehlo().map_err(Error::transport)?;
            tracing::debug!("Session upgraded to TLS");
        }
        Ok(None)
    })
}

/// Logs in with the given credentials.
#[must_use]
pub fn auth<T>(username: impl Into<String>, password: impl Into<String>) -> Middleware<T>
where
    T: Login + 'static,
{
    let username = username.into();
    let password = password.into();
    Box::new(move |conn: &mut T| -> Result<Option<T>> {
        conn.login(&username, &password).map_err(Error::transport)?;
        tracing::debug!(username = %username, "Authenticated");
        Ok(None)
    })
}
