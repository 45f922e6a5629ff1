//! Prometheus metrics for the retrain monitor, registered once in the default registry.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, register_int_gauge_vec, IntCounter, IntCounterVec, IntGaugeVec};

pub struct MonitorMetrics {
    pub requests_total: IntCounterVec,
    pub polls_total: IntCounter,
    pub poll_failures_total: IntCounter,
    pub stale_responses_total: IntCounter,
    pub progress_regressions_total: IntCounter,
    pub invariant_violations_total: IntCounter,
    /// Per status store, labelled `store`.
    pub last_progress_percent: IntGaugeVec,
    /// Per status store, labelled `store`.
    pub active_subscribers: IntGaugeVec,
}

fn build() -> prometheus::Result<MonitorMetrics> {
    Ok(MonitorMetrics {
        requests_total: register_int_counter_vec!("hoaxguard_backend_requests_total", "Backend requests by endpoint and outcome", &["endpoint", "outcome"])?,
        polls_total: register_int_counter!("hoaxguard_retrain_polls_total", "Progress polls issued")?,
        poll_failures_total: register_int_counter!("hoaxguard_retrain_poll_failures_total", "Progress polls that failed (network, status or decode)")?,
        stale_responses_total: register_int_counter!("hoaxguard_retrain_stale_responses_total", "Poll responses discarded because a newer poll already applied")?,
        progress_regressions_total: register_int_counter!("hoaxguard_retrain_progress_regressions_total", "Snapshots whose progress went backwards while running")?,
        invariant_violations_total: register_int_counter!("hoaxguard_retrain_invariant_violations_total", "Snapshot invariant violations other than regressions")?,
        last_progress_percent: register_int_gauge_vec!("hoaxguard_retrain_progress_percent", "Progress of the last applied snapshot", &["store"])?,
        active_subscribers: register_int_gauge_vec!("hoaxguard_status_subscribers", "Live status store subscriptions", &["store"])?,
    })
}

// Registration only fails on duplicate names, which `Lazy` rules out.
pub static METRICS: Lazy<MonitorMetrics> = Lazy::new(|| build().unwrap_or_else(|e| panic!("metric registration failed: {e}")));

pub fn record_request(endpoint: &str, ok: bool) {
    METRICS.requests_total.with_label_values(&[endpoint, if ok { "ok" } else { "error" }]).inc();
}

/// Text exposition of the default registry.
pub fn gather_text() -> Result<String, prometheus::Error> {
    use prometheus::{Encoder, TextEncoder};
    let families = prometheus::gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
