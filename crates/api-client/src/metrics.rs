//! Request metrics
//!
//! - `api_requests_total` (counter): labels `method`, `status`
//! - `api_request_retries_total` (counter): requests replayed after a renewal

/// Record one transport round trip.
pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a replay after token renewal.
pub fn record_retry() {
    metrics::counter!("api_request_retries_total").increment(1);
}
