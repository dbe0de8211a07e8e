/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! # mail-relay
//!
//! _mail-relay_ turns a JSON request describing an e-mail (recipients, subject,
//! bodies and the credentials of an upstream SMTP server) into exactly one
//! outbound SMTP transaction, and reports back whether the message was
//! accepted or at which stage the attempt failed.
//!
//! - Lenient encryption selection: **STARTTLS** (_RFC 3207_), implicit TLS or
//!   clear text.
//! - SMTP Service Extension for Authentication (_RFC 4954_) with automatic
//!   mechanism negotiation (from most secure to least secure):
//!   - CRAM-MD5 (_RFC 2195_)
//!   - DIGEST-MD5 (_RFC 2831_; obsolete but still supported)
//!   - LOGIN
//!   - PLAIN
//! - Plain text, HTML or `multipart/alternative` bodies built with
//!   [`mail-builder`](https://crates.io/crates/mail-builder).
//! - Independent connect and send timeouts, no retries, no connection reuse.
//! - Full async (requires Tokio).
//!
//! ## Usage Example
//!
//! ```rust
//!     let request: RawRequest = serde_json::from_str(r#"{
//!         "smtp_host": "smtp.example.com",
//!         "smtp_port": 587,
//!         "smtp_user": "john@example.com",
//!         "smtp_pass": "abcd efgh ijkl mnop",
//!         "encryption": "starttls",
//!         "to": ["jane@example.com"],
//!         "subject": "Hi!",
//!         "text": "Hello world!"
//!     }"#).unwrap();
//!
//!     // Validate the request, connect, authenticate and send.
//!     Relay::new(RelayConfig::default())
//!         .relay(request)
//!         .await
//!         .unwrap();
//! ```
//!
//! Every call opens a new session and sends a new message: relaying the same
//! request twice delivers two copies.
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

pub mod relay;
pub mod smtp;

use std::{fmt::Display, time::Duration};

pub use mail_builder;
pub use relay::{
    config::RelayConfig,
    error::{BuildError, Outcome, RelayError, Stage, ValidationError},
    executor::Relay,
    request::{Body, MailRequest, RawRequest},
};
pub use smtp::auth::Credentials;
pub use smtp_proto;
use smtp_proto::Response;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(Box<rustls::Error>),

    /// Base64 decode error
    Base64(base64::DecodeError),

    // SMTP authentication error.
    Auth(smtp::auth::Error),

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(Response<String>),

    /// SMTP authentication failure.
    AuthenticationFailed(Response<String>),

    /// Invalid TLS name provided.
    InvalidTLSName,

    /// Missing authentication credentials.
    MissingCredentials,

    /// Missing message sender.
    MissingMailFrom,

    /// Missing message recipients.
    MissingRcptTo,

    /// The server does no support any of the available authentication methods.
    UnsupportedAuthMechanism,

    /// Connection timeout.
    Timeout,

    /// STARTTLS not available
    MissingStartTls,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Transport security applied to the SMTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encryption {
    /// Connect in clear text and upgrade with `STARTTLS`.
    #[default]
    StartTls,
    /// Negotiate TLS before the SMTP greeting.
    ImplicitTls,
    /// Clear text only, never upgraded.
    None,
}

/// SMTP client builder.
#[derive(Clone)]
pub struct SmtpClientBuilder<T: AsRef<str>> {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub tls_connector: TlsConnector,
    pub tls_hostname: T,
    pub encryption: Encryption,
    pub credentials: Option<Credentials<T>>,
    pub addr: String,
    pub local_host: String,
}

/// SMTP client.
pub struct SmtpClient<T: AsyncRead + AsyncWrite> {
    pub(crate) stream: T,
    pub(crate) timeout: Duration,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Tls(e) => write!(f, "TLS error: {e}"),
            Error::Base64(e) => write!(f, "Base64 decode error: {e}"),
            Error::Auth(e) => write!(f, "SMTP authentication error: {e}"),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => write!(f, "Unexpected reply: {e}"),
            Error::AuthenticationFailed(e) => write!(f, "Authentication failed: {e}"),
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::MissingCredentials => write!(f, "Missing authentication credentials"),
            Error::MissingMailFrom => write!(f, "Missing message sender"),
            Error::MissingRcptTo => write!(f, "Missing message recipients"),
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does no support any of the available authentication methods"
            ),
            Error::Timeout => write!(f, "Connection timeout"),
            Error::MissingStartTls => write!(f, "STARTTLS extension unavailable"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}

impl From<smtp::auth::Error> for Error {
    fn from(err: smtp::auth::Error) -> Self {
        Error::Auth(err)
    }
}
