//! Firestore request metrics.

use std::time::Duration;

use metrics::{counter, histogram};

const REQUESTS: &str = "firestore_requests_total";
const RETRIES: &str = "firestore_retries_total";
const LATENCY: &str = "firestore_request_seconds";

/// One finished request, retries included in `elapsed`.
pub fn record_request(operation: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!(REQUESTS, "operation" => operation, "outcome" => outcome).increment(1);
    histogram!(LATENCY, "operation" => operation).record(elapsed.as_secs_f64());
}

pub fn record_retry(operation: &'static str) {
    counter!(RETRIES, "operation" => operation).increment(1);
}
