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

use log::{debug, info, warn};
use tokio_rustls::TlsConnector;

use crate::{smtp::tls::build_tls_connector, SmtpClientBuilder};

use super::{
    config::RelayConfig,
    error::RelayError,
    message::build_message,
    request::{MailRequest, RawRequest},
};

/// Performs one SMTP transaction per request.
///
/// A `Relay` holds no session state and can be shared between tasks, every
/// call opens and closes its own connection.
#[derive(Clone)]
pub struct Relay {
    config: RelayConfig,
    tls_connector: TlsConnector,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Relay {
            tls_connector: build_tls_connector(config.allow_invalid_certs),
            config,
        }
    }

    /// Validates the request and sends it.
    pub async fn relay(&self, request: RawRequest) -> Result<(), RelayError> {
        let request = request.validate()?;
        self.send(&request).await
    }

    /// Sends a validated request: connect and authenticate, build the message,
    /// then run a single `MAIL FROM`, `RCPT TO`, `DATA` sequence. Nothing is
    /// retried.
    pub async fn send(&self, request: &MailRequest) -> Result<(), RelayError> {
        let credentials = request.credentials();
        let mut builder = SmtpClientBuilder::new(request.host(), request.port())
            .encryption(request.encryption())
            .tls_connector(self.tls_connector.clone())
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.send_timeout)
            .credentials((credentials.username(), credentials.secret()));
        if let Some(helo_host) = &self.config.helo_host {
            builder = builder.helo_host(helo_host);
        }

        debug!(
            "Connecting to {}:{} ({}) as {}",
            request.host(),
            request.port(),
            request.encryption(),
            credentials.username()
        );
        let mut client = builder.connect().await.map_err(RelayError::Connect)?;
        debug!(
            "Authenticated with {}:{} as {}",
            request.host(),
            request.port(),
            credentials.username()
        );

        let message = match build_message(request) {
            Ok(message) => message,
            Err(err) => {
                if let Err(err) = client.quit().await {
                    debug!("QUIT after failed build: {err}");
                }
                return Err(RelayError::Build(err));
            }
        };
        debug!(
            "Built message from {} to {} recipient(s), {} bytes",
            message.mail_from,
            message.rcpt_to.len(),
            message.body.len()
        );

        client.send(&message).await.map_err(RelayError::Transmit)?;
        info!(
            "Message from {} accepted by {}:{} for {} recipient(s)",
            message.mail_from,
            request.host(),
            request.port(),
            message.rcpt_to.len()
        );

        // The message is already queued upstream
        if let Err(err) = client.quit().await {
            warn!(
                "QUIT failed on {}:{} after delivery: {err}",
                request.host(),
                request.port()
            );
        }

        Ok(())
    }
}
