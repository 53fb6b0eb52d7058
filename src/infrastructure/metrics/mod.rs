//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Orders placed by payment provider
//! - Webhook deliveries by provider and reconciliation outcome
//! - Download token redemptions
//! - Database connection pool gauges

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace("storefront"),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace("storefront")
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Orders placed, by payment provider
pub static ORDERS_PLACED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_placed_total", "Total number of orders placed").namespace("storefront"),
        &["provider"],
    )
    .expect("Failed to create ORDERS_PLACED_TOTAL metric")
});

/// Webhook deliveries, by provider and reconciliation outcome
pub static WEBHOOK_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("webhook_events_total", "Payment webhook deliveries processed")
            .namespace("storefront"),
        &["provider", "outcome"],
    )
    .expect("Failed to create WEBHOOK_EVENTS_TOTAL metric")
});

/// Successful download token redemptions
pub static DOWNLOADS_REDEEMED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("downloads_redeemed_total", "Download tokens redeemed").namespace("storefront"),
    )
    .expect("Failed to create DOWNLOADS_REDEEMED_TOTAL metric")
});

/// Database connection pool stats
pub static DB_POOL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_pool_connections", "Database connection pool statistics")
            .namespace("storefront"),
        &["state"], // "idle", "active", "max"
    )
    .expect("Failed to create DB_POOL_CONNECTIONS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(ORDERS_PLACED_TOTAL.clone()))
        .expect("Failed to register ORDERS_PLACED_TOTAL");
    registry
        .register(Box::new(WEBHOOK_EVENTS_TOTAL.clone()))
        .expect("Failed to register WEBHOOK_EVENTS_TOTAL");
    registry
        .register(Box::new(DOWNLOADS_REDEEMED_TOTAL.clone()))
        .expect("Failed to register DOWNLOADS_REDEEMED_TOTAL");
    registry
        .register(Box::new(DB_POOL_CONNECTIONS.clone()))
        .expect("Failed to register DB_POOL_CONNECTIONS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_order_placed(provider: &str) {
    ORDERS_PLACED_TOTAL.with_label_values(&[provider]).inc();
}

pub fn record_webhook_event(provider: &str, outcome: &str) {
    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[provider, outcome])
        .inc();
}

pub fn record_download_redeemed() {
    DOWNLOADS_REDEEMED_TOTAL.inc();
}

/// Helper to update database pool stats
pub fn update_db_pool_stats(idle: u32, active: u32, max: u32) {
    DB_POOL_CONNECTIONS
        .with_label_values(&["idle"])
        .set(idle as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["active"])
        .set(active as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["max"])
        .set(max as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*ORDERS_PLACED_TOTAL;
        let _ = &*WEBHOOK_EVENTS_TOTAL;
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, 0.001);
        let metrics = gather_metrics();
        assert!(metrics.contains("storefront_http_requests_total"));
    }

    #[test]
    fn test_record_webhook_event() {
        record_webhook_event("stripe", "applied");
        let metrics = gather_metrics();
        assert!(metrics.contains("storefront_webhook_events_total"));
        assert!(metrics.contains("outcome=\"applied\""));
    }
}
