//! ProxySQL exporter.
//!
//! Serves Prometheus metrics for a ProxySQL admin interface. Settings come
//! from three layers, highest first: flags typed on the command line (plus
//! `DATA_SOURCE_NAME` for the dsn), the TOML config file, compiled-in
//! defaults.
//!
//! # Modes
//!
//! - `--version` prints version information and exits.
//! - `PROXYSQL_EXPORTER_COMMIT=true` writes the typed flags into the config
//!   file and exits, so later starts need no flags.
//! - Otherwise the exporter resolves its settings and serves.
//!
//! ```bash
//! # Bake a new listen address into the config file
//! $ PROXYSQL_EXPORTER_COMMIT=true proxysql_exporter --web.listen-address=:9999
//!
//! # Start with whatever the file says
//! $ proxysql_exporter --config /etc/proxysql_exporter/proxysql_exporter.toml
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod cli;
pub mod error;
pub mod mode;
pub mod server;

use std::path::Path;

use proxysql_exporter_config::{
    schema, CommitReport, Environment, ExporterSettings, OverrideSet, Persister, Resolver,
    SettingsDocument,
};
use proxysql_exporter_telemetry::metrics::{set_build_info, set_collector_enabled};
use proxysql_exporter_telemetry::{init_metrics, MetricsConfig};
use tracing::{debug, info, warn};

pub use auth::BasicAuth;
pub use cli::{Cli, Invocation};
pub use error::{ExporterError, ExporterResult};
pub use mode::RunMode;
pub use server::{ExporterServer, MetricsHandler};

/// Version of the exporter.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name used in version output and logs.
pub const PROGRAM: &str = "proxysql_exporter";

/// Version line printed by `--version`.
pub fn version_string() -> String {
    format!("{PROGRAM}, version {VERSION}")
}

/// Run the selected mode to completion.
///
/// Logging must already be initialized.
pub async fn run(mode: RunMode, invocation: Invocation, environment: Environment) -> ExporterResult<()> {
    if mode == RunMode::Version {
        println!("{}", version_string());
        return Ok(());
    }

    let config_path = invocation.cli.config;
    info!(
        version = VERSION,
        config = %config_path.display(),
        mode = %mode,
        "Starting {PROGRAM}"
    );

    let overrides = invocation
        .overrides
        .with_data_source(environment.data_source_name);

    match mode {
        RunMode::Commit => commit(&config_path, &overrides).map(|_| ()),
        RunMode::Serve | RunMode::Version => {
            let resolver = Resolver::new(load_document(&config_path)?, overrides);
            serve(&resolver).await
        }
    }
}

/// Load the config file, warning about keys the exporter does not know.
pub fn load_document(path: &Path) -> ExporterResult<SettingsDocument> {
    let document = SettingsDocument::load(path)?;
    for key in document.unknown_keys() {
        warn!(key = %key, path = %path.display(), "Unknown configuration key, keeping it as is");
    }
    Ok(document)
}

/// Write `overrides` into the config file at `path`.
pub fn commit(path: &Path, overrides: &OverrideSet) -> ExporterResult<CommitReport> {
    if overrides.is_empty() {
        info!("Nothing to commit, rewriting the config file unchanged");
    }
    Ok(Persister::new(path, overrides).commit()?)
}

/// Resolve and validate the settings the server runs with.
pub fn resolve_settings(resolver: &Resolver) -> ExporterResult<ExporterSettings> {
    let settings = ExporterSettings::resolve(resolver);
    settings.validate()?;

    for entry in schema::leaves() {
        debug!(key = %entry.key, source = %resolver.source(&entry.key), "Resolved setting");
    }
    info!(
        dsn = %settings.masked_dsn(),
        listen_address = %settings.web.listen_address,
        telemetry_path = %settings.web.telemetry_path,
        "Resolved settings"
    );

    Ok(settings)
}

/// Resolve the settings and serve until Ctrl-C.
pub async fn serve(resolver: &Resolver) -> ExporterResult<()> {
    let settings = resolve_settings(resolver)?;

    let registry = init_metrics(&MetricsConfig::default())?;
    set_build_info(VERSION);
    for (collector, enabled) in settings.collect.collectors() {
        info!(collector, enabled, "Collector");
        set_collector_enabled(collector, enabled);
    }

    let auth = settings.auth_file().map(BasicAuth::load).transpose()?;
    if let Some(auth) = &auth {
        info!(user = %auth.user(), "Basic authentication enabled");
    }

    ExporterServer::new(&settings, registry, auth)?.run().await
}
