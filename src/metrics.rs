use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of gated requests").unwrap();
    pub static ref ADMITTED: Counter =
        register_counter!("gateway_admitted_total", "Requests admitted by the quota store").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("gateway_rate_limited_total", "Requests rejected by the quota store").unwrap();
    pub static ref UPSTREAM_ERRORS: Counter =
        register_counter!("gateway_upstream_errors_total", "Non-success upstream replies").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "gateway_upstream_latency_seconds",
        "Upstream image request latency in seconds"
    )
    .unwrap();
    pub static ref QUOTA_KEYS: Gauge =
        register_gauge!("gateway_quota_keys", "Caller keys currently tracked by the quota store").unwrap();
}
