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

use std::time::Duration;

/// Settings shared by every relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Time allowed to open the session: TCP connect, greeting, TLS and
    /// authentication.
    pub connect_timeout: Duration,

    /// Time allowed for each command of the mail transaction.
    pub send_timeout: Duration,

    /// Accept any server certificate.
    pub allow_invalid_certs: bool,

    /// Name announced in `EHLO`, defaults to the local hostname.
    pub helo_host: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            connect_timeout: Duration::from_secs(20),
            send_timeout: Duration::from_secs(30),
            allow_invalid_certs: false,
            helo_host: None,
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn allow_invalid_certs(mut self, allow: bool) -> Self {
        self.allow_invalid_certs = allow;
        self
    }

    /// Blank names are ignored.
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.helo_host = if host.trim().is_empty() {
            None
        } else {
            Some(host.trim().to_string())
        };
        self
    }
}
