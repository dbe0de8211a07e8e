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

use smtp_proto::Response;

pub mod auth;
pub mod builder;
pub mod client;
pub mod ehlo;
pub mod envelope;
pub mod message;
pub mod stream;
pub mod tls;

pub trait AssertReply: Sized {
    fn is_positive_completion(&self) -> bool;
    fn assert_positive_completion(self) -> crate::Result<()>;
    fn assert_code(self, code: u16) -> crate::Result<()>;
}

impl AssertReply for Response<String> {
    /// Returns `true` if the reply is a positive completion.
    #[inline(always)]
    fn is_positive_completion(&self) -> bool {
        (200..=299).contains(&self.code)
    }

    /// Returns Ok if the reply has the specified severity.
    #[inline(always)]
    fn assert_positive_completion(self) -> crate::Result<()> {
        if (200..=299).contains(&self.code) {
            Ok(())
        } else {
            Err(crate::Error::UnexpectedReply(self))
        }
    }

    /// Returns Ok if the reply returned the specified code.
    #[inline(always)]
    fn assert_code(self, code: u16) -> crate::Result<()> {
        if self.code == code {
            Ok(())
        } else {
            Err(crate::Error::UnexpectedReply(self))
        }
    }
}

#[cfg(test)]
mod test {
    use smtp_proto::Response;

    use super::AssertReply;

    fn reply(code: u16) -> Response<String> {
        Response {
            code,
            esc: [0, 0, 0],
            message: "test".to_string(),
        }
    }

    #[test]
    fn assert_reply() {
        assert!(reply(250).is_positive_completion());
        assert!(!reply(354).is_positive_completion());
        assert!(reply(221).assert_positive_completion().is_ok());
        assert!(matches!(
            reply(535).assert_positive_completion(),
            Err(crate::Error::UnexpectedReply(r)) if r.code == 535
        ));
        assert!(reply(354).assert_code(354).is_ok());
        assert!(reply(250).assert_code(354).is_err());
    }
}
