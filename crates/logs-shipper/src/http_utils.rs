// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use reqwest::StatusCode;

use crate::error::SendError;

/// Builds the HTTP client used to reach the collector.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().use_rustls_tls().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

/// Maps a collector response status to a delivery outcome.
///
/// 401, 403, 400 and 404 are permanent: the same payload will be rejected
/// again. Every other non-success status is treated as transient.
pub fn classify_status(status: StatusCode) -> Result<(), SendError> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::UNAUTHORIZED => SendError::Unauthorized,
        StatusCode::FORBIDDEN => SendError::Forbidden,
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => SendError::Permanent(status.as_u16()),
        other => SendError::Transient(format!("collector responded with {other}")),
    })
}
