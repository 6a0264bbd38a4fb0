//! # Prometheus Metrics
//!
//! Exposes operational metrics for the vault node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it
/// can be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of vaults created through this node.
    pub vaults_created_total: IntCounter,
    /// Total number of deposits accepted (creation deposits included).
    pub deposits_total: IntCounter,
    /// Total number of withdrawals paid out (early withdrawals included).
    pub withdrawals_total: IntCounter,
    /// Total penalty amount collected from early withdrawals, in sats.
    pub penalties_collected_sats: IntCounter,
    /// Total yield paid out or compounded, in sats.
    pub yield_harvested_sats: IntCounter,
    /// Current logical block height.
    pub block_height: IntGauge,
    /// Histogram of vault-operation handler latency in seconds.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("ember".into()), None)
            .expect("failed to create prometheus registry");

        let vaults_created_total =
            IntCounter::new("vaults_created_total", "Total number of vaults created")
                .expect("metric creation");
        registry
            .register(Box::new(vaults_created_total.clone()))
            .expect("metric registration");

        let deposits_total =
            IntCounter::new("deposits_total", "Total number of accepted deposits")
                .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total = IntCounter::new(
            "withdrawals_total",
            "Total number of withdrawals, early withdrawals included",
        )
        .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let penalties_collected_sats = IntCounter::new(
            "penalties_collected_sats",
            "Total early-withdrawal penalty amount collected, in sats",
        )
        .expect("metric creation");
        registry
            .register(Box::new(penalties_collected_sats.clone()))
            .expect("metric registration");

        let yield_harvested_sats = IntCounter::new(
            "yield_harvested_sats",
            "Total yield paid out or compounded, in sats",
        )
        .expect("metric creation");
        registry
            .register(Box::new(yield_harvested_sats.clone()))
            .expect("metric registration");

        let block_height = IntGauge::new("block_height", "Current logical block height")
            .expect("metric creation");
        registry
            .register(Box::new(block_height.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Vault-operation handler latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            vaults_created_total,
            deposits_total,
            withdrawals_total,
            penalties_collected_sats,
            yield_harvested_sats,
            block_height,
            operation_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
