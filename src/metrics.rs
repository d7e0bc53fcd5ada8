use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Histogram, IntCounterVec, TextEncoder, register_counter, register_histogram,
    register_int_counter_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("storefront_requests_total", "Total number of backend requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "storefront_client_rate_limited_total",
        "Requests rejected by the client-side limiter",
        &["class"]
    )
    .unwrap();
    pub static ref TIMEOUTS_TOTAL: Counter =
        register_counter!("storefront_request_timeouts_total", "Requests that timed out or were aborted").unwrap();
    pub static ref HTTP_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "storefront_http_errors_total",
        "Non-success responses by status code",
        &["status"]
    )
    .unwrap();
    pub static ref AUTH_REDIRECTS: Counter =
        register_counter!("storefront_auth_redirects_total", "Login redirects after a 401").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "storefront_request_latency_seconds",
        "Backend request latency in seconds"
    )
    .unwrap();
}

// Text exposition of everything registered in the default registry
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
