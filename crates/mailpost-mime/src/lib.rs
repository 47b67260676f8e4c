//! # mailpost-mime
//!
//! Builds the envelope handed to a mail transport: ordered headers, body
//! parts ("enclosures"), and the SMTP sender/receivers derived from them.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost_mime::{Enclosure, Envelope, headers};
//!
//! let envelope = Envelope::new(
//!     vec![
//!         headers::from("Me <me@mail.com>"),
//!         headers::to(["him@mail.com"]),
//!         headers::subject("Hello"),
//!     ],
//!     vec![Enclosure::plain_text("Hi!")],
//! );
//!
//! assert_eq!(envelope.sender()?.as_str(), "me@mail.com");
//! let wire = envelope.string();
//! ```
//!
//! ## Modules
//!
//! - [`headers`]: header builders and the ordered [`Headers`] collection
//! - [`encoding`]: Base64, Quoted-Printable and RFC 2047 encoders

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod enclosure;
mod envelope;
mod error;

pub mod encoding;
pub mod headers;

pub use address::{Address, Mailbox};
pub use content_type::ContentType;
pub use enclosure::{Enclosure, TransferEncoding};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use headers::{Header, Headers};
