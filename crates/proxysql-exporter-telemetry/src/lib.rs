//! Observability for proxysql-exporter.
//!
//! - **Logging**: structured JSON (or pretty) logs via `tracing-subscriber`
//! - **Metrics**: the exporter's own Prometheus metrics via the `metrics` crate
//!
//! # Example
//!
//! ```rust,ignore
//! use proxysql_exporter_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};
//!
//! init_logging(&LogConfig::default())?;
//! let registry = init_metrics(&MetricsConfig::default())?;
//! let body = registry.render();
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, MetricsConfig, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
