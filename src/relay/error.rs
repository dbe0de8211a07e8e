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

use std::fmt::Display;

use serde::{Serialize, Serializer};

/// The request was malformed or incomplete. Raised before any network activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The request could not be decoded.
    Malformed(String),

    /// One or more SMTP settings are missing, empty or zero.
    MissingFields(Vec<&'static str>),

    /// No `to` recipient was provided.
    MissingRecipients,

    /// Neither a text nor an HTML body was provided.
    MissingBody,
}

/// The message could not be built. Nothing has been transmitted.
#[derive(Debug)]
pub enum BuildError {
    /// An address is not usable in an SMTP envelope.
    InvalidAddress {
        field: &'static str,
        address: String,
    },

    /// The MIME writer failed.
    Io(std::io::Error),
}

/// Failure of a relay attempt, classified by the component that raised it.
#[derive(Debug)]
pub enum RelayError {
    /// Malformed or incomplete request.
    Validation(ValidationError),

    /// Network, TLS or authentication failure while opening the session.
    Connect(crate::Error),

    /// Malformed message contents.
    Build(BuildError),

    /// Failure during the MAIL FROM, RCPT TO or DATA exchange.
    Transmit(crate::Error),
}

/// Point of the relay attempt where a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Validate,
    Connect,
    Authenticate,
    BuildMessage,
    Transmit,
}

/// Result of one relay attempt, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Failed { stage: Stage, detail: String },
}

impl RelayError {
    /// Returns the stage at which the attempt failed.
    ///
    /// Authentication happens while the session is being opened, so an
    /// authentication failure is a [`RelayError::Connect`] reported with
    /// [`Stage::Authenticate`].
    pub fn stage(&self) -> Stage {
        match self {
            RelayError::Validation(_) => Stage::Validate,
            RelayError::Connect(
                crate::Error::AuthenticationFailed(_)
                | crate::Error::UnsupportedAuthMechanism
                | crate::Error::MissingCredentials
                | crate::Error::Auth(_),
            ) => Stage::Authenticate,
            RelayError::Connect(_) => Stage::Connect,
            RelayError::Build(_) => Stage::BuildMessage,
            RelayError::Transmit(_) => Stage::Transmit,
        }
    }
}

impl Outcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Outcome::Sent)
    }
}

impl From<Result<(), RelayError>> for Outcome {
    fn from(result: Result<(), RelayError>) -> Self {
        match result {
            Ok(()) => Outcome::Sent,
            Err(err) => Outcome::Failed {
                stage: err.stage(),
                detail: err.to_string(),
            },
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Report<'x> {
            ok: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            stage: Option<Stage>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'x str>,
        }

        match self {
            Outcome::Sent => Report {
                ok: true,
                stage: None,
                error: None,
            },
            Outcome::Failed { stage, detail } => Report {
                ok: false,
                stage: Some(*stage),
                error: Some(detail),
            },
        }
        .serialize(serializer)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Malformed(err) => write!(f, "Malformed request: {err}"),
            ValidationError::MissingFields(fields) => {
                write!(f, "Missing required fields: {}", fields.join(", "))
            }
            ValidationError::MissingRecipients => write!(f, "At least one 'to' recipient is required"),
            ValidationError::MissingBody => write!(f, "Either 'html' or 'text' must be provided"),
        }
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::InvalidAddress { field, address } => {
                write!(f, "Invalid '{field}' address: {address:?}")
            }
            BuildError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Validation(err) => write!(f, "Invalid request: {err}"),
            RelayError::Connect(err) => write!(f, "SMTP connection failed: {err}"),
            RelayError::Build(err) => write!(f, "Failed to build message: {err}"),
            RelayError::Transmit(err) => write!(f, "Failed to send message: {err}"),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Validate => "validate",
            Stage::Connect => "connect",
            Stage::Authenticate => "authenticate",
            Stage::BuildMessage => "buildMessage",
            Stage::Transmit => "transmit",
        })
    }
}

impl std::error::Error for ValidationError {}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Io(err) => Some(err),
            BuildError::InvalidAddress { .. } => None,
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Validation(err) => Some(err),
            RelayError::Connect(err) | RelayError::Transmit(err) => Some(err),
            RelayError::Build(err) => Some(err),
        }
    }
}

impl From<ValidationError> for RelayError {
    fn from(err: ValidationError) -> Self {
        RelayError::Validation(err)
    }
}

impl From<BuildError> for RelayError {
    fn from(err: BuildError) -> Self {
        RelayError::Build(err)
    }
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        BuildError::Io(err)
    }
}
