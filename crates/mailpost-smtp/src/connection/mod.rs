//! SMTP connection management.

mod client;
mod config;
mod stream;

pub use client::{Client, Refused};
pub use config::{ClientConfig, Security};
pub use stream::{SmtpStream, connect, connect_tls};
