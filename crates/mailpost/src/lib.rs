//! # mailpost
//!
//! Delivers email envelopes through a pluggable mail transport.
//!
//! A [`Postman`] opens a connection per delivery, runs the handshake and
//! any registered middleware (STARTTLS, login, ...), hands the envelope to
//! the transport and reports which recipients were refused. The connection
//! is closed on every exit path.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailpost::{EmailParams, Options, email, postman};
//!
//! # fn main() -> mailpost::Result<()> {
//! let envelope = email(EmailParams {
//!     sender: Some("Me <me@example.com>".into()),
//!     receivers: vec!["you@example.com".into()],
//!     subject: Some("Hello".into()),
//!     content: "<p>Hi!</p>".into(),
//!     ..EmailParams::default()
//! })?;
//!
//! let postman = postman("smtp.example.com", 587, Some(("me", "secret")), false, Options::new());
//! let response = postman.send(&envelope)?;
//! for (address, rejection) in response.rejected() {
//!     eprintln!("{address} refused: {} {}", rejection.code, rejection.reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`transport`]: the transport contract and factories
//! - [`middleware`]: connection hooks and the built-in TLS/login hooks
//! - [`smtp`]: SMTP as the default transport

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod api;
mod error;
pub mod middleware;
mod options;
mod postman;
mod response;
pub mod smtp;
pub mod transport;

pub use api::{EmailParams, email, postman};
pub use error::{BoxError, Error, Result};
pub use middleware::Middleware;
pub use options::{Options, PostmanConfig};
pub use postman::{Connection, Postman, PostmanBuilder};
pub use response::{Rejection, Rejections, Response};
pub use smtp::Smtp;
pub use transport::{FactoryFn, Login, StartTls, Transport, TransportFactory, factory_fn};

pub use mailpost_mime as mime;
