//! Prometheus self-metrics for the exporter.
//!
//! The recorder is installed without its own HTTP listener; the exporter's
//! web server renders it at the configured telemetry path.
//!
//! # Exporter Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `proxysql_exporter_scrapes_total` | Counter | - | Scrapes served |
//! | `proxysql_exporter_scrape_duration_seconds` | Histogram | - | Time to render a scrape |
//! | `proxysql_exporter_collector_enabled` | Gauge | `collector` | 1 if the collector is enabled |
//! | `proxysql_exporter_build_info` | Gauge | `version` | Always 1 |

use std::time::Duration;

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Scrapes served.
pub const SCRAPES_TOTAL: &str = "proxysql_exporter_scrapes_total";
/// Time spent rendering a scrape.
pub const SCRAPE_DURATION_SECONDS: &str = "proxysql_exporter_scrape_duration_seconds";
/// Collector enable flags.
pub const COLLECTOR_ENABLED: &str = "proxysql_exporter_collector_enabled";
/// Build information.
pub const BUILD_INFO: &str = "proxysql_exporter_build_info";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Histogram buckets for scrape duration.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Handle used to render the exporter's metrics.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: Option<PrometheusHandle>,
}

impl MetricsRegistry {
    /// Creates a registry that renders through `handle`.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Creates a registry that renders nothing (metrics disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self { handle: None }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}

/// Builds the Prometheus recorder configured by `config`.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the bucket layout is rejected.
pub fn build_recorder(
    config: &MetricsConfig,
) -> TelemetryResult<metrics_exporter_prometheus::PrometheusRecorder> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(SCRAPE_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    Ok(builder.build_recorder())
}

/// Installs the global recorder and registers metric descriptions.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if a global recorder is already
/// installed or the configuration is rejected.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let recorder = build_recorder(config)?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();

    Ok(MetricsRegistry::new(handle))
}

/// Registers descriptions for all exporter metrics.
pub fn register_metric_descriptions() {
    describe_counter!(SCRAPES_TOTAL, "Total number of scrapes served");
    describe_histogram!(
        SCRAPE_DURATION_SECONDS,
        "Time spent rendering a scrape in seconds"
    );
    describe_gauge!(
        COLLECTOR_ENABLED,
        "Whether a collector is enabled (1) or disabled (0)"
    );
    describe_gauge!(BUILD_INFO, "Exporter build information");
}

/// Records a served scrape.
pub fn record_scrape(duration: Duration) {
    counter!(SCRAPES_TOTAL).increment(1);
    histogram!(SCRAPE_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Publishes a collector's enable flag.
pub fn set_collector_enabled(collector: &str, enabled: bool) {
    gauge!(COLLECTOR_ENABLED, "collector" => collector.to_string())
        .set(if enabled { 1.0 } else { 0.0 });
}

/// Publishes the build info gauge.
pub fn set_build_info(version: &str) {
    gauge!(BUILD_INFO, "version" => version.to_string()).set(1.0);
}
