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

use mail_builder::{headers::address::Address, MessageBuilder};

use crate::smtp::message::Message;

use super::{error::BuildError, request::MailRequest};

/// Builds the envelope and the MIME message for a validated request.
///
/// Addresses may carry a display name (`Jane Doe <jane@example.com>`), which
/// is only written to the headers. The envelope lists the bare address of
/// every `to`, `cc` and `bcc` recipient while the headers only carry `To` and
/// `Cc`.
pub fn build_message(request: &MailRequest) -> Result<Message<'_>, BuildError> {
    let from = Mailbox::parse("from", request.from())?;
    let to = mailboxes("to", request.to())?;
    let cc = mailboxes("cc", request.cc())?;
    let bcc = mailboxes("bcc", request.bcc())?;

    let mut builder = MessageBuilder::new()
        .from(from.header())
        .to(header_list(&to));
    if !cc.is_empty() {
        builder = builder.cc(header_list(&cc));
    }
    if !request.subject().is_empty() {
        builder = builder.subject(request.subject());
    }
    if let Some(text) = request.body().text() {
        builder = builder.text_body(text);
    }
    if let Some(html) = request.body().html() {
        builder = builder.html_body(html);
    }

    Ok(Message::new(
        from.address,
        to.iter().chain(&cc).chain(&bcc).map(|mailbox| mailbox.address),
        builder.write_to_vec()?,
    ))
}

/// Address as written by the caller, split into its display name and the
/// bare address used in the SMTP envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mailbox<'x> {
    name: Option<&'x str>,
    address: &'x str,
}

impl<'x> Mailbox<'x> {
    /// Accepts `local@domain`, `<local@domain>` and `Name <local@domain>`,
    /// the name optionally quoted.
    fn parse(field: &'static str, value: &'x str) -> Result<Self, BuildError> {
        let value = value.trim();
        let (name, address) = match value.strip_suffix('>').and_then(|v| v.rsplit_once('<')) {
            Some((name, address)) => {
                let name = name.trim();
                let name = name
                    .strip_prefix('"')
                    .and_then(|name| name.strip_suffix('"'))
                    .unwrap_or(name)
                    .trim();
                ((!name.is_empty()).then_some(name), address.trim())
            }
            None => (None, value),
        };

        let has_valid_name = !name.is_some_and(|name| {
            name.chars()
                .any(|ch| ch.is_control() || ch == '<' || ch == '>')
        });
        if has_valid_name && is_valid_address(address) {
            Ok(Mailbox { name, address })
        } else {
            Err(BuildError::InvalidAddress {
                field,
                address: value.to_string(),
            })
        }
    }

    fn header(&self) -> Address<'x> {
        Address::new_address(self.name, self.address)
    }
}

fn mailboxes<'x>(
    field: &'static str,
    addresses: &'x [String],
) -> Result<Vec<Mailbox<'x>>, BuildError> {
    addresses
        .iter()
        .map(|address| Mailbox::parse(field, address))
        .collect()
}

fn header_list<'x>(mailboxes: &[Mailbox<'x>]) -> Address<'x> {
    Address::new_list(mailboxes.iter().map(Mailbox::header).collect())
}

/// Checks a bare `local@domain` address that can be placed in an SMTP path.
/// The local part may only contain `@` when quoted.
fn is_valid_address(address: &str) -> bool {
    let (local, domain, is_quoted) = match address.strip_prefix('"') {
        Some(quoted) => match quoted.split_once("\"@") {
            Some((local, domain)) => (local, domain, true),
            None => return false,
        },
        None => match address.split_once('@') {
            Some((local, domain)) => (local, domain, false),
            None => return false,
        },
    };

    !local.is_empty()
        && !domain.is_empty()
        && local.chars().all(|ch| {
            if is_quoted {
                !ch.is_control() && ch != '"'
            } else {
                ch.is_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(ch)
            }
        })
        && domain
            .chars()
            .all(|ch| ch.is_alphanumeric() || "-.[]:".contains(ch))
}
