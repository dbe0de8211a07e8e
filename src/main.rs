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

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use log::{error, info};
use mail_relay::{Outcome, RawRequest, Relay, RelayConfig, RelayError, Stage};
use tokio::io::AsyncReadExt;

#[derive(Parser, Debug)]
#[command(
    name = "mail-relay",
    version,
    about = "Relays a JSON e-mail request to an upstream SMTP server"
)]
struct Args {
    /// JSON request file, reads standard input when absent or `-`
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Seconds allowed to connect, negotiate TLS and authenticate
    #[arg(long, env = "MAIL_RELAY_CONNECT_TIMEOUT", default_value_t = 20)]
    connect_timeout: u64,

    /// Seconds allowed for each command of the mail transaction
    #[arg(long, env = "MAIL_RELAY_SEND_TIMEOUT", default_value_t = 30)]
    send_timeout: u64,

    /// Accept any server certificate
    #[arg(long, env = "MAIL_RELAY_ALLOW_INVALID_CERTS")]
    allow_invalid_certs: bool,

    /// Name announced in EHLO, defaults to the local hostname
    #[arg(long, env = "MAIL_RELAY_HELO_HOST")]
    helo_host: Option<String>,
}

impl Args {
    fn config(&self) -> RelayConfig {
        let config = RelayConfig::new()
            .connect_timeout(Duration::from_secs(self.connect_timeout))
            .send_timeout(Duration::from_secs(self.send_timeout))
            .allow_invalid_certs(self.allow_invalid_certs);
        match &self.helo_host {
            Some(helo_host) => config.helo_host(helo_host),
            None => config,
        }
    }

    async fn read_request(&self) -> std::io::Result<Vec<u8>> {
        match &self.path {
            Some(path) if path.as_os_str() != "-" => tokio::fs::read(path).await,
            _ => {
                let mut bytes = Vec::new();
                tokio::io::stdin().read_to_end(&mut bytes).await?;
                Ok(bytes)
            }
        }
    }
}

fn exit_code(outcome: &Outcome) -> ExitCode {
    ExitCode::from(match outcome {
        Outcome::Sent => 0,
        Outcome::Failed { stage, .. } => match stage {
            Stage::Validate => 2,
            Stage::Connect | Stage::Authenticate => 3,
            Stage::BuildMessage => 4,
            Stage::Transmit => 5,
        },
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let bytes = match args.read_request().await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to read request: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match RawRequest::from_slice(&bytes) {
        Ok(request) => Relay::new(args.config()).relay(request).await,
        Err(err) => Err(RelayError::Validation(err)),
    };
    if let Err(err) = &result {
        error!("Relay failed at stage {}: {err}", err.stage());
    }

    let outcome = Outcome::from(result);
    match serde_json::to_string(&outcome) {
        Ok(report) => println!("{report}"),
        Err(err) => error!("Failed to serialize outcome: {err}"),
    }
    if outcome.is_sent() {
        info!("Message sent");
    }

    exit_code(&outcome)
}
