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

use base64::{engine::general_purpose::STANDARD, Engine};
use smtp_proto::{EhloResponse, AUTH_CRAM_MD5, AUTH_DIGEST_MD5, AUTH_LOGIN, AUTH_PLAIN};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

/// Username and secret used to authenticate against the SMTP server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials<T: AsRef<str>> {
    pub(crate) username: T,
    pub(crate) secret: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidChallenge,
}

/// Mechanisms tried during negotiation, most secure first.
pub const MECHANISMS: &[u64] = &[
    #[cfg(feature = "cram-md5")]
    AUTH_CRAM_MD5,
    #[cfg(feature = "digest-md5")]
    AUTH_DIGEST_MD5,
    AUTH_LOGIN,
    AUTH_PLAIN,
];

impl<T: AsRef<str>> Credentials<T> {
    /// Creates a new `Credentials` instance.
    pub fn new(username: T, secret: T) -> Credentials<T> {
        Credentials { username, secret }
    }

    pub fn username(&self) -> &str {
        self.username.as_ref()
    }

    pub fn secret(&self) -> &str {
        self.secret.as_ref()
    }

    pub(crate) fn encode(&self, mechanism: u64, challenge: &str) -> crate::Result<String> {
        let username = self.username.as_ref();
        let secret = self.secret.as_ref();

        Ok(STANDARD.encode(
            match mechanism {
                AUTH_PLAIN => {
                    format!("\u{0}{username}\u{0}{secret}")
                }

                AUTH_LOGIN => {
                    let challenge = STANDARD.decode(challenge)?;

                    if b"user name"
                        .eq_ignore_ascii_case(challenge.get(0..9).unwrap_or_default())
                        || b"username".eq_ignore_ascii_case(
                            // Because Google makes its own standards
                            challenge.get(0..8).ok_or(Error::InvalidChallenge)?,
                        )
                    {
                        username
                    } else if b"password"
                        .eq_ignore_ascii_case(challenge.get(0..8).ok_or(Error::InvalidChallenge)?)
                    {
                        secret
                    } else {
                        return Err(Error::InvalidChallenge.into());
                    }
                    .to_string()
                }

                #[cfg(feature = "digest-md5")]
                AUTH_DIGEST_MD5 => {
                    let mut buf = Vec::with_capacity(10);
                    let mut key = None;
                    let mut in_quote = false;
                    let mut values = std::collections::HashMap::new();
                    let challenge = STANDARD.decode(challenge)?;
                    let challenge_len = challenge.len();

                    for (pos, byte) in challenge.into_iter().enumerate() {
                        let add_key = match byte {
                            b'=' if !in_quote => {
                                if key.is_none() && !buf.is_empty() {
                                    key = String::from_utf8_lossy(&buf).into_owned().into();
                                    buf.clear();
                                } else {
                                    return Err(Error::InvalidChallenge.into());
                                }
                                false
                            }
                            b',' if !in_quote => true,
                            b'"' => {
                                in_quote = !in_quote;
                                false
                            }
                            _ => {
                                buf.push(byte);
                                false
                            }
                        };

                        if (add_key || pos == challenge_len - 1) && !buf.is_empty() {
                            if let Some(key) = key.take() {
                                values.insert(key, String::from_utf8_lossy(&buf).into_owned());
                                buf.clear();
                            }
                        }
                    }

                    let (digest_uri, realm, realm_response) =
                        if let Some(realm) = values.get("realm") {
                            (
                                format!("smtp/{realm}"),
                                realm.as_str(),
                                format!(",realm=\"{realm}\""),
                            )
                        } else {
                            ("smtp/localhost".to_string(), "", "".to_string())
                        };

                    let credentials =
                        md5::compute(format!("{username}:{realm}:{secret}").as_bytes());

                    let a2 = md5::compute(
                        if values.get("qpop").is_some_and(|v| v == "auth") {
                            format!("AUTHENTICATE:{digest_uri}")
                        } else {
                            format!("AUTHENTICATE:{digest_uri}:00000000000000000000000000000000")
                        }
                        .as_bytes(),
                    );

                    #[allow(unused_variables)]
                    let cnonce = {
                        use rand::RngCore;
                        let mut buf = [0u8; 16];
                        rand::thread_rng().fill_bytes(&mut buf);
                        STANDARD.encode(buf)
                    };

                    #[cfg(test)]
                    let cnonce = "OA6MHXh6VqTrRk".to_string();
                    let nonce = values.remove("nonce").unwrap_or_default();
                    let qop = values.remove("qop").unwrap_or_default();
                    let charset = values
                        .remove("charset")
                        .unwrap_or_else(|| "utf-8".to_string());

                    format!(
                        concat!(
                            "charset={},username=\"{}\",realm=\"{}\",nonce=\"{}\",nc=00000001,",
                            "cnonce=\"{}\",digest-uri=\"{}\",response={:x},qop={}"
                        ),
                        charset,
                        username,
                        realm_response,
                        nonce,
                        cnonce,
                        digest_uri,
                        md5::compute(
                            format!("{credentials:x}:{nonce}:00000001:{cnonce}:{qop}:{a2:x}")
                                .as_bytes()
                        ),
                        qop
                    )
                }

                #[cfg(feature = "cram-md5")]
                AUTH_CRAM_MD5 => {
                    let mut secret_opad: Vec<u8> = vec![0x5c; 64];
                    let mut secret_ipad: Vec<u8> = vec![0x36; 64];

                    if secret.len() < 64 {
                        for (pos, byte) in secret.as_bytes().iter().enumerate() {
                            secret_opad[pos] = *byte ^ 0x5c;
                            secret_ipad[pos] = *byte ^ 0x36;
                        }
                    } else {
                        for (pos, byte) in md5::compute(secret.as_bytes()).iter().enumerate() {
                            secret_opad[pos] = *byte ^ 0x5c;
                            secret_ipad[pos] = *byte ^ 0x36;
                        }
                    }

                    secret_ipad.extend_from_slice(&STANDARD.decode(challenge)?);
                    secret_opad.extend_from_slice(&md5::compute(&secret_ipad).0);

                    format!("{} {:x}", username, md5::compute(&secret_opad))
                }

                _ => return Err(crate::Error::UnsupportedAuthMechanism),
            }
            .as_bytes(),
        ))
    }
}

impl<T: AsRef<str>> From<(T, T)> for Credentials<T> {
    fn from(credentials: (T, T)) -> Self {
        Credentials {
            username: credentials.0,
            secret: credentials.1,
        }
    }
}

impl<T: AsRef<str>> std::fmt::Debug for Credentials<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_ref())
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidChallenge => write!(f, "Invalid challenge received."),
        }
    }
}

pub(crate) fn mechanism_name(mechanism: u64) -> &'static str {
    match mechanism {
        AUTH_PLAIN => "PLAIN",
        AUTH_LOGIN => "LOGIN",
        AUTH_DIGEST_MD5 => "DIGEST-MD5",
        AUTH_CRAM_MD5 => "CRAM-MD5",
        _ => "UNKNOWN",
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Authenticates using the most secure mechanism advertised by the server.
    pub async fn authenticate<U: AsRef<str>>(
        &mut self,
        credentials: &Credentials<U>,
        capabilities: &EhloResponse<String>,
    ) -> crate::Result<&mut Self> {
        // Try authenticating from most secure to least secure
        let mut has_err = None;

        for &mechanism in MECHANISMS {
            if capabilities.auth_mechanisms & mechanism == 0 {
                continue;
            }
            match self.auth(mechanism, credentials).await {
                Ok(_) => {
                    return Ok(self);
                }
                Err(err) => match err {
                    crate::Error::UnexpectedReply(reply) => {
                        // Bad credentials, other mechanisms will not help
                        let has_failed = reply.code == 535;
                        has_err = reply.into();
                        if has_failed {
                            break;
                        }
                    }
                    crate::Error::UnsupportedAuthMechanism => (),
                    _ => return Err(err),
                },
            }
        }

        if let Some(has_err) = has_err {
            Err(crate::Error::AuthenticationFailed(has_err))
        } else {
            Err(crate::Error::UnsupportedAuthMechanism)
        }
    }

    pub(crate) async fn auth<U: AsRef<str>>(
        &mut self,
        mechanism: u64,
        credentials: &Credentials<U>,
    ) -> crate::Result<()> {
        let mut reply = if mechanism == AUTH_PLAIN {
            self.cmd(
                format!(
                    "AUTH {} {}\r\n",
                    mechanism_name(mechanism),
                    credentials.encode(mechanism, "")?,
                )
                .as_bytes(),
            )
            .await?
        } else {
            self.cmd(format!("AUTH {}\r\n", mechanism_name(mechanism)).as_bytes())
                .await?
        };

        for _ in 0..3 {
            match reply.code {
                334 => {
                    reply = self
                        .cmd(
                            format!("{}\r\n", credentials.encode(mechanism, &reply.message)?)
                                .as_bytes(),
                        )
                        .await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(crate::Error::UnexpectedReply(reply));
                }
            }
        }

        Err(crate::Error::UnexpectedReply(reply))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use smtp_proto::{EhloResponse, AUTH_CRAM_MD5, AUTH_DIGEST_MD5, AUTH_LOGIN, AUTH_PLAIN};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use crate::{smtp::auth::Credentials, SmtpClient};

    #[test]
    fn auth_encode() {
        // Digest-MD5
        #[cfg(feature = "digest-md5")]
        assert_eq!(
            Credentials::new("chris", "secret")
                .encode(
                    AUTH_DIGEST_MD5,
                    concat!(
                        "cmVhbG09ImVsd29vZC5pbm5vc29mdC5jb20iLG5vbmNlPSJPQTZNRzl0",
                        "RVFHbTJoaCIscW9wPSJhdXRoIixhbGdvcml0aG09bWQ1LXNlc3MsY2hh",
                        "cnNldD11dGYtOA=="
                    ),
                )
                .unwrap(),
            concat!(
                "Y2hhcnNldD11dGYtOCx1c2VybmFtZT0iY2hyaXMiLHJlYWxtPSIscmVhbG0",
                "9ImVsd29vZC5pbm5vc29mdC5jb20iIixub25jZT0iT0E2TUc5dEVRR20yaG",
                "giLG5jPTAwMDAwMDAxLGNub25jZT0iT0E2TUhYaDZWcVRyUmsiLGRpZ2Vzd",
                "C11cmk9InNtdHAvZWx3b29kLmlubm9zb2Z0LmNvbSIscmVzcG9uc2U9NDQ2",
                "NjIxODg3MzlmYzcxOGNlYmYyZjA4MTk4MWI4ZDIscW9wPWF1dGg=",
            )
        );

        // Challenge-Response Authentication Mechanism (CRAM)
        #[cfg(feature = "cram-md5")]
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(
                    AUTH_CRAM_MD5,
                    "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+",
                )
                .unwrap(),
            "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw"
        );

        // Login
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(AUTH_LOGIN, "VXNlciBOYW1lAA==",)
                .unwrap(),
            "dGlt"
        );
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(AUTH_LOGIN, "UGFzc3dvcmQA",)
                .unwrap(),
            "dGFuc3RhYWZ0YW5zdGFhZg=="
        );
        assert!(matches!(
            Credentials::new("tim", "tanstaaftanstaaf").encode(AUTH_LOGIN, "SGVsbG8gdGhlcmU="),
            Err(crate::Error::Auth(super::Error::InvalidChallenge))
        ));

        // Plain
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(AUTH_PLAIN, "",)
                .unwrap(),
            "AHRpbQB0YW5zdGFhZnRhbnN0YWFm"
        );
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let debug = format!("{:?}", Credentials::new("tim", "tanstaaftanstaaf"));
        assert!(debug.contains("tim"));
        assert!(!debug.contains("tanstaaf"));
    }

    fn capabilities(auth_mechanisms: u64) -> EhloResponse<String> {
        let mut response: EhloResponse<String> = EhloResponse::default();
        response.auth_mechanisms = auth_mechanisms;
        response
    }

    async fn expect(server: &mut DuplexStream, line: &str, reply: &str) {
        let mut buf = vec![0u8; 256];
        let br = server.read(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&buf[..br]), line);
        server.write_all(reply.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn negotiate_login_before_plain() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut client = SmtpClient {
            stream: client,
            timeout: Duration::from_secs(5),
        };

        let server = tokio::spawn(async move {
            expect(&mut server, "AUTH LOGIN\r\n", "334 VXNlcm5hbWU6\r\n").await;
            expect(&mut server, "dGlt\r\n", "334 UGFzc3dvcmQ6\r\n").await;
            expect(
                &mut server,
                "dGFuc3RhYWZ0YW5zdGFhZg==\r\n",
                "235 2.7.0 Authentication successful\r\n",
            )
            .await;
            server
        });

        client
            .authenticate(
                &Credentials::new("tim", "tanstaaftanstaaf"),
                &capabilities(AUTH_PLAIN | AUTH_LOGIN),
            )
            .await
            .unwrap();
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn rejected_credentials_stop_negotiation() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut client = SmtpClient {
            stream: client,
            timeout: Duration::from_secs(5),
        };

        let server = tokio::spawn(async move {
            expect(
                &mut server,
                "AUTH PLAIN AHRpbQB3cm9uZw==\r\n",
                "535 5.7.8 Authentication credentials invalid\r\n",
            )
            .await;
            server
        });

        assert!(matches!(
            client
                .authenticate(
                    &Credentials::new("tim", "wrong"),
                    &capabilities(AUTH_PLAIN)
                )
                .await,
            Err(crate::Error::AuthenticationFailed(reply)) if reply.code == 535
        ));
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn no_common_mechanism() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut client = SmtpClient {
            stream: client,
            timeout: Duration::from_secs(5),
        };

        assert!(matches!(
            client
                .authenticate(&Credentials::new("tim", "secret"), &capabilities(0))
                .await,
            Err(crate::Error::UnsupportedAuthMechanism)
        ));
    }
}
