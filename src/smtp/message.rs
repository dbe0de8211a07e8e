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

use std::borrow::Cow;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

/// Envelope and raw RFC 5322 body of a message.
#[derive(Debug, Default, Clone)]
pub struct Message<'x> {
    pub mail_from: Cow<'x, str>,
    pub rcpt_to: Vec<Cow<'x, str>>,
    pub body: Cow<'x, [u8]>,
}

impl<'x> Message<'x> {
    /// Create a new message
    pub fn new<T, U, V>(from: T, to: U, body: V) -> Self
    where
        T: Into<Cow<'x, str>>,
        U: IntoIterator<Item = T>,
        V: Into<Cow<'x, [u8]>>,
    {
        Message {
            mail_from: from.into(),
            rcpt_to: to.into_iter().map(Into::into).collect(),
            body: body.into(),
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Sends a message to the server as a single transaction: one
    /// MAIL FROM, one RCPT TO per recipient and DATA. Any rejected
    /// recipient aborts the transaction before DATA.
    pub async fn send(&mut self, message: &Message<'_>) -> crate::Result<()> {
        if message.mail_from.is_empty() {
            return Err(crate::Error::MissingMailFrom);
        } else if message.rcpt_to.is_empty() {
            return Err(crate::Error::MissingRcptTo);
        }

        // Send mail-from
        self.mail_from(message.mail_from.as_ref()).await?;

        // Send rcpt-to
        for rcpt in &message.rcpt_to {
            self.rcpt_to(rcpt.as_ref()).await?;
        }

        // Send message
        self.data(message.body.as_ref()).await
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use crate::SmtpClient;

    use super::Message;

    #[test]
    fn message_from_parts() {
        let message = Message::new(
            "jdoe@example.com",
            ["jane@example.com", "james@test.com"],
            "Subject: Hi\r\n\r\nHello".as_bytes(),
        );
        assert_eq!(message.mail_from, "jdoe@example.com");
        assert_eq!(message.rcpt_to, vec!["jane@example.com", "james@test.com"]);
        assert_eq!(message.body.as_ref(), b"Subject: Hi\r\n\r\nHello");
    }

    #[tokio::test]
    async fn send_transaction() {
        let (client, server) = tokio::io::duplex(4096);
        let mut client = SmtpClient {
            stream: client,
            timeout: Duration::from_secs(5),
        };

        let server = tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(server);
            let mut lines = BufReader::new(reader).lines();
            let mut transcript = Vec::new();
            let mut in_data = false;

            while let Ok(Some(line)) = lines.next_line().await {
                let reply: Option<&[u8]> = if in_data {
                    if line == "." {
                        in_data = false;
                        Some(&b"250 2.0.0 Queued\r\n"[..])
                    } else {
                        None
                    }
                } else if line == "DATA" {
                    in_data = true;
                    Some(&b"354 Go ahead\r\n"[..])
                } else if line == "RCPT TO:<nobody@test.com>" {
                    Some(&b"550 5.1.1 No such user\r\n"[..])
                } else {
                    Some(&b"250 2.1.0 OK\r\n"[..])
                };
                transcript.push(line);
                if let Some(reply) = reply {
                    writer.write_all(reply).await.unwrap();
                }
            }
            transcript
        });

        client
            .send(&Message::new(
                "jdoe@example.com",
                ["jane@example.com", "james@test.com"],
                "Subject: Hi\r\n\r\n.Hello".as_bytes(),
            ))
            .await
            .unwrap();

        assert!(matches!(
            client
                .send(&Message::new(
                    "jdoe@example.com",
                    ["nobody@test.com"],
                    "Subject: Hi\r\n\r\nHello".as_bytes(),
                ))
                .await,
            Err(crate::Error::UnexpectedReply(reply)) if reply.code == 550
        ));
        drop(client);

        assert_eq!(
            server.await.unwrap(),
            vec![
                "MAIL FROM:<jdoe@example.com>",
                "RCPT TO:<jane@example.com>",
                "RCPT TO:<james@test.com>",
                "DATA",
                "Subject: Hi",
                "",
                "..Hello",
                ".",
                "MAIL FROM:<jdoe@example.com>",
                "RCPT TO:<nobody@test.com>",
            ]
        );
    }

    #[tokio::test]
    async fn send_requires_envelope() {
        let (client, _server) = tokio::io::duplex(64);
        let mut client = SmtpClient {
            stream: client,
            timeout: Duration::from_secs(5),
        };

        assert!(matches!(
            client
                .send(&Message::new("", ["jane@example.com"], &b"Hi"[..]))
                .await,
            Err(crate::Error::MissingMailFrom)
        ));
        assert!(matches!(
            client
                .send(&Message::new("jdoe@example.com", [], &b"Hi"[..]))
                .await,
            Err(crate::Error::MissingRcptTo)
        ));
    }
}
