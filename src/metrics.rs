//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login flow
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lunch_login_login_attempts_total", "Total number of completed OAuth callbacks"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "lunch_login_provider_request_duration_seconds",
            "Duration of outbound requests to the OAuth provider in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lunch_login_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; repeated registrations are logged and skipped.
pub fn init_metrics() {
    let collectors: [(&str, Box<dyn prometheus::core::Collector>); 3] = [
        ("LOGIN_ATTEMPTS_TOTAL", Box::new(LOGIN_ATTEMPTS_TOTAL.clone())),
        (
            "PROVIDER_REQUEST_DURATION_SECONDS",
            Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()),
        ),
        ("ERRORS_TOTAL", Box::new(ERRORS_TOTAL.clone())),
    ];

    for (name, collector) in collectors {
        if let Err(error) = REGISTRY.register(collector) {
            tracing::debug!(metric = name, %error, "Metric already registered");
        }
    }

    tracing::info!("Metrics registry initialized");
}
