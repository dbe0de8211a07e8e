/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::time::Duration;

use smtp_proto::EXT_START_TLS;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::{Credentials, Encryption, SmtpClient, SmtpClientBuilder};

use super::{stream::SmtpStream, tls::build_tls_connector};

impl<T: AsRef<str>> SmtpClientBuilder<T> {
    pub fn new(hostname: T, port: u16) -> Self {
        SmtpClientBuilder {
            addr: format!("{}:{}", hostname.as_ref(), port),
            connect_timeout: Duration::from_secs(20),
            timeout: Duration::from_secs(30),
            tls_connector: build_tls_connector(false),
            tls_hostname: hostname,
            encryption: Encryption::default(),
            credentials: None,
            local_host: gethostname::gethostname()
                .to_str()
                .unwrap_or("[127.0.0.1]")
                .to_string(),
        }
    }

    /// Use an existing TLS connector
    pub fn tls_connector(mut self, tls_connector: TlsConnector) -> Self {
        self.tls_connector = tls_connector;
        self
    }

    /// Start connection in TLS, upgrade with STARTTLS or stay in clear text
    pub fn encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Set the EHLO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Authenticate after the session is established
    pub fn credentials(mut self, credentials: impl Into<Credentials<T>>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Sets the time allowed to connect, negotiate TLS and authenticate
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SMTP command timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect using the configured encryption and authenticate.
    pub async fn connect(&self) -> crate::Result<SmtpClient<SmtpStream>> {
        tokio::time::timeout(self.connect_timeout, async {
            let mut client = SmtpClient {
                stream: TcpStream::connect(&self.addr).await?,
                timeout: self.timeout,
            };

            let mut client = match self.encryption {
                Encryption::ImplicitTls => {
                    let mut client = client
                        .into_tls(&self.tls_connector, self.tls_hostname.as_ref())
                        .await?;
                    client.greeting().await?;
                    client
                }
                Encryption::StartTls => {
                    client.greeting().await?;

                    let response = client.ehlo(&self.local_host).await?;
                    if response.has_capability(EXT_START_TLS) {
                        client
                            .start_tls(&self.tls_connector, self.tls_hostname.as_ref())
                            .await?
                    } else {
                        return Err(crate::Error::MissingStartTls);
                    }
                }
                Encryption::None => {
                    client.greeting().await?;
                    client.into_plain()
                }
            };

            // Capabilities may change after a TLS upgrade
            let capabilities = client.ehlo(&self.local_host).await?;

            if let Some(credentials) = &self.credentials {
                client.authenticate(credentials, &capabilities).await?;
            }

            Ok(client)
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }
}
