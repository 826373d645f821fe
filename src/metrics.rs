//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Authorization flow metrics
    pub static ref AUTH_FLOWS_STARTED_TOTAL: IntCounter = IntCounter::new(
        "sneknet_auth_flows_started_total",
        "Total number of authorization flows started"
    ).expect("metric can be created");
    pub static ref AUTH_FLOWS_COMPLETED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sneknet_auth_flows_completed_total", "Total number of authorization callbacks handled"),
        &["outcome"]
    ).expect("metric can be created");

    // Provider metrics
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sneknet_provider_requests_total", "Total number of identity provider requests"),
        &["endpoint", "status"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "sneknet_provider_request_duration_seconds",
            "Identity provider request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Database metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sneknet_db_queries_total", "Total number of database queries"),
        &["operation", "table"]
    ).expect("metric can be created");

    // Session metrics
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "sneknet_sessions_active",
        "Approximate number of live server-side sessions"
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sneknet_errors_total", "Total number of errors returned to clients"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(AUTH_FLOWS_STARTED_TOTAL.clone()))
        .expect("AUTH_FLOWS_STARTED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTH_FLOWS_COMPLETED_TOTAL.clone()))
        .expect("AUTH_FLOWS_COMPLETED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PROVIDER_REQUESTS_TOTAL.clone()))
        .expect("PROVIDER_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()))
        .expect("PROVIDER_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(DB_QUERIES_TOTAL.clone()))
        .expect("DB_QUERIES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSIONS_ACTIVE.clone()))
        .expect("SESSIONS_ACTIVE can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record one provider round trip.
pub fn observe_provider_request(endpoint: &str, status: &str, elapsed: Duration) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}
