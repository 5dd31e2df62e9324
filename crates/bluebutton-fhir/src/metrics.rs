//! Request metrics
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the
//! embedding application installs a recorder.
//!
//! - `bluebutton_fhir_requests_total` (counter): label `status`
//! - `bluebutton_fhir_retries_total` (counter): label `reason`
//! - `bluebutton_token_refresh_total` (counter): label `trigger`
//! - `bluebutton_fhir_pages_total` (counter)

/// Record a completed resource request with its final status code.
pub fn record_request(status: u16) {
    metrics::counter!("bluebutton_fhir_requests_total", "status" => status.to_string()).increment(1);
}

/// Record a retry; `reason` is `status` or `transport`.
pub fn record_retry(reason: &'static str) {
    metrics::counter!("bluebutton_fhir_retries_total", "reason" => reason).increment(1);
}

/// Record a token refresh; `trigger` is `expired` or `caller`.
pub fn record_token_refresh(trigger: &'static str) {
    metrics::counter!("bluebutton_token_refresh_total", "trigger" => trigger).increment(1);
}

/// Record one page collected by the walker.
pub fn record_page() {
    metrics::counter!("bluebutton_fhir_pages_total").increment(1);
}
