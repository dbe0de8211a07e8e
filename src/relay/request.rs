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

use serde::Deserialize;

use crate::{Credentials, Encryption};

use super::error::ValidationError;

/// Relay request as received from the caller, before validation.
///
/// Every field is optional at this point so that an incomplete request is
/// reported as a [`ValidationError`] naming the missing fields rather than as
/// a decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawRequest {
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub encryption: Option<String>,
    pub from: Option<String>,
    pub to: Option<Vec<String>>,
    pub cc: Option<Vec<String>>,
    pub bcc: Option<Vec<String>>,
    pub subject: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
}

/// Message body, at least one representation is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Html(String),
    /// Plain text part followed by an HTML alternative.
    Alternative { text: String, html: String },
}

/// Validated and normalized relay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailRequest {
    host: String,
    port: u16,
    credentials: Credentials<String>,
    encryption: Encryption,
    from: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    body: Body,
}

impl RawRequest {
    /// Decodes a JSON request.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(bytes).map_err(|err| ValidationError::Malformed(err.to_string()))
    }

    /// Checks the required fields and normalizes the request. No network
    /// activity takes place here.
    pub fn validate(self) -> Result<MailRequest, ValidationError> {
        let host = non_empty(self.smtp_host.as_deref().map(str::trim));
        let port = self.smtp_port.filter(|port| *port != 0);
        let user = non_empty(self.smtp_user.as_deref());
        // Some providers display app passwords in groups separated by spaces
        let pass = self
            .smtp_pass
            .map(|pass| pass.chars().filter(|ch| !ch.is_whitespace()).collect::<String>())
            .filter(|pass| !pass.is_empty());

        let (host, port, user, pass) = match (host, port, user, pass) {
            (Some(host), Some(port), Some(user), Some(pass)) => {
                (host.to_string(), port, user.to_string(), pass)
            }
            (host, port, user, pass) => {
                let mut missing = Vec::with_capacity(4);
                for (field, is_missing) in [
                    ("smtp_host", host.is_none()),
                    ("smtp_port", port.is_none()),
                    ("smtp_user", user.is_none()),
                    ("smtp_pass", pass.is_none()),
                ] {
                    if is_missing {
                        missing.push(field);
                    }
                }
                return Err(ValidationError::MissingFields(missing));
            }
        };

        let to = addresses(self.to);
        if to.is_empty() {
            return Err(ValidationError::MissingRecipients);
        }

        let body = match (
            self.text.filter(|text| !text.is_empty()),
            self.html.filter(|html| !html.is_empty()),
        ) {
            (Some(text), Some(html)) => Body::Alternative { text, html },
            (Some(text), None) => Body::Text(text),
            (None, Some(html)) => Body::Html(html),
            (None, None) => return Err(ValidationError::MissingBody),
        };

        // Many servers refuse senders other than the authenticated account
        let from = non_empty(self.from.as_deref().map(str::trim))
            .unwrap_or(user.as_str())
            .to_string();

        Ok(MailRequest {
            encryption: Encryption::parse(self.encryption.as_deref().unwrap_or_default()),
            credentials: Credentials::new(user, pass),
            host,
            port,
            from,
            to,
            cc: addresses(self.cc),
            bcc: addresses(self.bcc),
            subject: self.subject.unwrap_or_default(),
            body,
        })
    }
}

impl TryFrom<RawRequest> for MailRequest {
    type Error = ValidationError;

    fn try_from(request: RawRequest) -> Result<Self, Self::Error> {
        request.validate()
    }
}

impl MailRequest {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> &Credentials<String> {
        &self.credentials
    }

    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    pub fn bcc(&self) -> &[String] {
        &self.bcc
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

impl Body {
    pub fn text(&self) -> Option<&str> {
        match self {
            Body::Text(text) | Body::Alternative { text, .. } => Some(text),
            Body::Html(_) => None,
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            Body::Html(html) | Body::Alternative { html, .. } => Some(html),
            Body::Text(_) => None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn addresses(list: Option<Vec<String>>) -> Vec<String> {
    list.unwrap_or_default()
        .into_iter()
        .map(|addr| addr.trim().to_string())
        .collect()
}
