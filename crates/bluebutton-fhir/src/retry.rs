//! Retry loop for resource GETs
//!
//! Attempts a request up to `total + 1` times. A response whose status is in
//! the policy's forcelist, a connection failure, a timeout or a body cut
//! short triggers another attempt; any other response is returned as is. With `total == 0` the
//! request is sent exactly once and whatever comes back is returned.

use std::time::Duration;

use common::{ClientConfig, RetryPolicy};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metrics;
use crate::request::FhirResponse;

/// GET `url` under the configured retry policy.
pub(crate) async fn get_with_retry(
    client: &reqwest::Client,
    config: &ClientConfig,
    url: &str,
    params: &[(String, String)],
    headers: HeaderMap,
) -> Result<FhirResponse> {
    let policy = config.retry();
    let max_attempts = policy.max_attempts();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(attempt, max_attempts, "sending resource request");

        let sent = client
            .get(url)
            .headers(headers.clone())
            .query(params)
            .timeout(config.timeout())
            .send()
            .await;

        let delay = match sent {
            Ok(response) => {
                let status = response.status().as_u16();
                if !(policy.is_enabled() && policy.is_retryable_status(status)) {
                    match FhirResponse::read(response).await {
                        Ok(read) => return Ok(read),
                        Err(e) if policy.is_enabled() && attempt < max_attempts => {
                            warn!(error = %e, status, attempt, "response body cut short, retrying");
                            metrics::record_retry("transport");
                            policy.backoff(attempt)
                        }
                        Err(e) => {
                            warn!(error = %e, status, attempts = attempt, "reading response body failed");
                            return Err(Error::Transport {
                                url: url.to_string(),
                                attempts: attempt,
                                last_status: Some(status),
                                reason: format!("reading response body: {e}"),
                            });
                        }
                    }
                } else if attempt >= max_attempts {
                    metrics::record_request(status);
                    warn!(status, attempts = attempt, "retryable status persisted, giving up");
                    return Err(Error::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        last_status: Some(status),
                        reason: format!("status {status} persisted after {attempt} attempt(s)"),
                    });
                } else {
                    warn!(status, attempt, "retryable status, retrying");
                    metrics::record_retry("status");
                    retry_after(response.headers()).unwrap_or_else(|| policy.backoff(attempt))
                }
            }
            Err(e) => {
                if !(policy.is_enabled() && is_transient(&e)) || attempt >= max_attempts {
                    warn!(error = %e, attempts = attempt, "resource request failed");
                    return Err(Error::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        last_status: None,
                        reason: e.to_string(),
                    });
                }
                warn!(error = %e, attempt, "transport error, retrying");
                metrics::record_retry("transport");
                policy.backoff(attempt)
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Send failures worth another attempt: the request may not have reached
/// the provider or the answer never arrived.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

/// Delay requested by the provider via `Retry-After: <seconds>`.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(RetryPolicy::MAX_BACKOFF))
}
