//! # mailpost-smtp
//!
//! A blocking SMTP client implementing the client side of RFC 5321.
//!
//! ## Features
//!
//! - **Runtime session state**: greetings are issued on demand, and a
//!   closed session refuses further commands
//! - **TLS support**: implicit TLS (port 465) and STARTTLS
//! - **Authentication**: PLAIN and LOGIN
//! - **Extensions**: SIZE and 8BITMIME are used when advertised
//! - **Per-recipient refusals**: refused recipients are returned as data,
//!   a transaction only fails when the sender or the message is refused
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailpost_smtp::{Client, ClientConfig};
//!
//! fn main() -> mailpost_smtp::Result<()> {
//!     let mut client = Client::connect("smtp.example.com", 587, ClientConfig::default())?;
//!     client.ehlo()?;
//!     client.starttls()?;
//!     client.ehlo()?;
//!     client.login("user@example.com", "password")?;
//!
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let refused = client.send_mail(
//!         "sender@example.com",
//!         &["recipient@example.com".to_string()],
//!         message,
//!     )?;
//!     assert!(refused.is_empty());
//!
//!     client.quit()
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Streams and the session client
//! - [`parser`]: Reply parser
//! - [`types`]: Replies and EHLO extensions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Client, ClientConfig, Refused, Security};
pub use error::{Error, Result};
pub use types::{AuthMechanism, Extensions, Reply, ReplyCode};
