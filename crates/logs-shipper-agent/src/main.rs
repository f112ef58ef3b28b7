// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use logs_shipper::{
    record::format_timestamp, LogShipper, LogTransport, RawRecord, ShipperConfig,
};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGS_SHIPPER_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ShipperConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error loading logs shipper configuration: {e}");
            return;
        }
    };

    let shipper = match LogShipper::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Error creating logs shipper: {e}");
            return;
        }
    };
    shipper.init().await;
    info!(
        "Shipping logs from stdin to {}",
        shipper.config().api_url
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(record) = parse_line(&line) {
                        shipper.log(record, Box::new(|| {}));
                    }
                }
                Ok(None) => {
                    debug!("Reached end of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, shutting down");
                break;
            }
        }
    }

    LogTransport::close(&shipper).await;
    let stats = shipper.stats();
    debug!(
        "Shutdown complete, {} records left in memory",
        stats.queued + stats.retrying
    );
}

/// JSON objects are passed through as-is; any other non-empty line becomes
/// an `info` record stamped with the current time.
fn parse_line(line: &str) -> Option<RawRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<RawRecord>(line) {
        Ok(value) if value.is_object() => Some(value),
        _ => Some(serde_json::json!({
            "level": "info",
            "message": line,
            "timestamp": format_timestamp(chrono::Utc::now()),
        })),
    }
}
