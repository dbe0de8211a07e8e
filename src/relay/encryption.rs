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

use std::{convert::Infallible, fmt::Display, str::FromStr};

use crate::Encryption;

impl Encryption {
    /// Resolves a free-form encryption token, ignoring case and surrounding
    /// whitespace.
    ///
    /// - `STARTTLS` upgrades a clear text connection.
    /// - `SSLTLS`, `SSL` and `TLS` negotiate TLS before the greeting.
    /// - `NONE` and the empty string disable encryption.
    ///
    /// Any other value falls back to [`Encryption::StartTls`], this function
    /// never fails.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();

        if value.eq_ignore_ascii_case("STARTTLS") {
            Encryption::StartTls
        } else if ["SSLTLS", "SSL", "TLS"]
            .iter()
            .any(|token| value.eq_ignore_ascii_case(token))
        {
            Encryption::ImplicitTls
        } else if value.is_empty() || value.eq_ignore_ascii_case("NONE") {
            Encryption::None
        } else {
            Encryption::default()
        }
    }
}

impl FromStr for Encryption {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Encryption::parse(s))
    }
}

impl Display for Encryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encryption::StartTls => write!(f, "STARTTLS"),
            Encryption::ImplicitTls => write!(f, "SSLTLS"),
            Encryption::None => write!(f, "NONE"),
        }
    }
}
