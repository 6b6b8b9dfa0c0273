//! Layered configuration for proxysql-exporter.
//!
//! Every setting the exporter uses is declared once in the [schema](schema)
//! and resolved with a fixed precedence:
//!
//! 1. Values explicitly passed on the command line (the [`OverrideSet`]),
//!    plus `DATA_SOURCE_NAME` for `dsn`
//! 2. The config file ([`SettingsDocument`])
//! 3. The compiled-in default supplied by the caller
//!
//! Defaults are never recorded as overrides, so a flag the operator did not
//! pass cannot shadow the config file.
//!
//! In commit mode the [`Persister`] writes the overrides back into the config
//! file, leaving every other key untouched, so the next plain start picks them
//! up from the file.
//!
//! # Example
//!
//! ```no_run
//! use proxysql_exporter_config::{
//!     ExporterSettings, OverrideSet, Resolver, SettingsDocument,
//! };
//!
//! # fn main() -> Result<(), proxysql_exporter_config::ConfigError> {
//! let document = SettingsDocument::load("/etc/proxysql_exporter/proxysql_exporter.toml")?;
//! let resolver = Resolver::new(document, OverrideSet::new());
//! let settings = ExporterSettings::resolve(&resolver);
//!
//! println!("Exporter will listen on: {}", settings.web.listen_address);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! dsn = "stats:stats@tcp(localhost:6032)/"
//!
//! [web]
//! listen-address = ":42004"
//! telemetry-path = "/metrics"
//! ssl-cert-file = ""
//! ssl-key-file = ""
//! auth-file = "/etc/proxysql_exporter/auth.yml"
//!
//! [collect]
//! mysql_status = true
//! mysql_connection_pool = true
//! ```

#![warn(missing_docs)]

mod document;
mod error;
mod overrides;
mod persister;
mod resolver;
pub mod schema;
mod settings;

pub use document::SettingsDocument;
pub use error::ConfigError;
pub use overrides::{Environment, OverrideSet, COMMIT_ENV, DATA_SOURCE_ENV};
pub use persister::{CommitReport, Persister};
pub use resolver::{Resolver, ValueSource};
pub use schema::{keys, SettingLeaf, SettingSection, SettingType, SettingValue, ValueKind};
pub use settings::{
    mask_dsn, CollectSettings, ExporterSettings, WebSettings, DEFAULT_DATA_SOURCE,
    DEFAULT_LISTEN_ADDRESS, DEFAULT_TELEMETRY_PATH,
};
