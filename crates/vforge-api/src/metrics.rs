//! Prometheus metrics for HTTP traffic and session sockets.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS: &str = "vforge_http_requests_total";
const HTTP_DURATION: &str = "vforge_http_request_duration_seconds";
const HTTP_IN_FLIGHT: &str = "vforge_http_requests_in_flight";

const WS_CONNECTIONS: &str = "vforge_ws_connections_total";
const WS_ACTIVE: &str = "vforge_ws_connections_active";
const WS_SENT: &str = "vforge_ws_messages_sent_total";
const WS_RECEIVED: &str = "vforge_ws_messages_received_total";
const WS_REJECTED: &str = "vforge_ws_rejected_events_total";

/// Route label for requests no route matched.
const UNMATCHED_PATH: &str = "unmatched";

/// Install the global recorder. The handle renders `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_http_request(method: String, path: String, status: u16, duration_secs: f64) {
    let labels = [("method", method), ("path", path), ("status", status.to_string())];
    counter!(HTTP_REQUESTS, &labels).increment(1);
    histogram!(HTTP_DURATION, &labels).record(duration_secs);
}

pub fn record_ws_connection(endpoint: &'static str) {
    counter!(WS_CONNECTIONS, "endpoint" => endpoint).increment(1);
}

pub fn set_ws_active_connections(count: i64) {
    gauge!(WS_ACTIVE).set(count as f64);
}

pub fn record_ws_message_sent(endpoint: &'static str, event_type: &'static str) {
    counter!(WS_SENT, "endpoint" => endpoint, "type" => event_type).increment(1);
}

pub fn record_ws_message_received(endpoint: &'static str) {
    counter!(WS_RECEIVED, "endpoint" => endpoint).increment(1);
}

/// Inbound event answered with an `error` event.
pub fn record_ws_rejected_event(reason: &'static str) {
    counter!(WS_REJECTED, "reason" => reason).increment(1);
}

/// Labels requests by their route template, not the raw path.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_PATH, MatchedPath::as_str)
        .to_string();
    let start = Instant::now();

    gauge!(HTTP_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(HTTP_IN_FLIGHT).decrement(1.0);

    record_http_request(method, path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}
