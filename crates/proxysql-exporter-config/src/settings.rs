//! Typed settings handed to the serving layer.
//!
//! [`ExporterSettings::resolve`] is the only place compiled-in defaults live;
//! every field is obtained through [`Resolver::resolve`].

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use crate::schema::keys;
use crate::{ConfigError, Resolver};

/// Data source used when neither flag, environment nor file names one.
pub const DEFAULT_DATA_SOURCE: &str = "stats:stats@tcp(localhost:6032)/";

/// Default listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = ":42004";

/// Default telemetry path.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Web-facing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSettings {
    /// Address to listen on, Go style (`:42004` means all interfaces).
    pub listen_address: String,
    /// Path under which metrics are exposed.
    pub telemetry_path: String,
    /// TLS certificate file, empty when unset.
    pub ssl_cert_file: String,
    /// TLS key file, empty when unset.
    pub ssl_key_file: String,
    /// Basic auth credentials file. `None` when absent from every source.
    pub auth_file: Option<String>,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
            ssl_cert_file: String::new(),
            ssl_key_file: String::new(),
            auth_file: None,
        }
    }
}

/// Per-collector enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectSettings {
    /// Collect from `stats_mysql_global`.
    pub mysql_status: bool,
    /// Collect from `stats_mysql_connection_pool`.
    pub mysql_connection_pool: bool,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            mysql_status: true,
            mysql_connection_pool: true,
        }
    }
}

impl CollectSettings {
    /// Collector names paired with their enable flag.
    pub fn collectors(&self) -> [(&'static str, bool); 2] {
        [
            ("mysql_status", self.mysql_status),
            ("mysql_connection_pool", self.mysql_connection_pool),
        ]
    }
}

/// Everything the exporter needs to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterSettings {
    /// Data source name of the ProxySQL admin interface.
    pub dsn: String,
    /// Web settings.
    pub web: WebSettings,
    /// Collector flags.
    pub collect: CollectSettings,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            dsn: DEFAULT_DATA_SOURCE.to_string(),
            web: WebSettings::default(),
            collect: CollectSettings::default(),
        }
    }
}

impl ExporterSettings {
    /// Resolve every setting, using [`ExporterSettings::default`] as fallback.
    pub fn resolve(resolver: &Resolver) -> Self {
        let defaults = Self::default();

        Self {
            dsn: resolver.resolve(keys::DSN, defaults.dsn),
            web: WebSettings {
                listen_address: resolver
                    .resolve(keys::WEB_LISTEN_ADDRESS, defaults.web.listen_address),
                telemetry_path: resolver
                    .resolve(keys::WEB_TELEMETRY_PATH, defaults.web.telemetry_path),
                ssl_cert_file: resolver.resolve(keys::WEB_SSL_CERT_FILE, defaults.web.ssl_cert_file),
                ssl_key_file: resolver.resolve(keys::WEB_SSL_KEY_FILE, defaults.web.ssl_key_file),
                auth_file: resolver
                    .resolve_optional(keys::WEB_AUTH_FILE)
                    .or(defaults.web.auth_file),
            },
            collect: CollectSettings {
                mysql_status: resolver
                    .resolve(keys::COLLECT_MYSQL_STATUS, defaults.collect.mysql_status),
                mysql_connection_pool: resolver.resolve(
                    keys::COLLECT_MYSQL_CONNECTION_POOL,
                    defaults.collect.mysql_connection_pool,
                ),
            },
        }
    }

    /// Whether both TLS files are configured.
    pub fn tls_enabled(&self) -> bool {
        !self.web.ssl_cert_file.is_empty() && !self.web.ssl_key_file.is_empty()
    }

    /// Basic auth file, if one is configured with a non-empty path.
    pub fn auth_file(&self) -> Option<&Path> {
        self.web
            .auth_file
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(Path::new)
    }

    /// Socket address for the listen address.
    ///
    /// A bare `:PORT` binds every interface.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the address cannot be resolved.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = self.web.listen_address.trim();
        let address = if address.starts_with(':') {
            format!("0.0.0.0{address}")
        } else {
            address.to_string()
        };

        address
            .to_socket_addrs()
            .map_err(|e| ConfigError::invalid_value(keys::WEB_LISTEN_ADDRESS, format!("{address}: {e}")))?
            .next()
            .ok_or_else(|| {
                ConfigError::invalid_value(keys::WEB_LISTEN_ADDRESS, format!("{address}: no address"))
            })
    }

    /// Data source name with the password replaced, safe to log.
    pub fn masked_dsn(&self) -> String {
        mask_dsn(&self.dsn)
    }

    /// Validate the resolved settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The listen address is invalid
    /// - The telemetry path does not start with `/`
    /// - Only one of the TLS files is set
    /// - A configured TLS file does not exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_socket_addr()?;

        if !self.web.telemetry_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                keys::WEB_TELEMETRY_PATH,
                format!("must start with '/': {}", self.web.telemetry_path),
            ));
        }

        if self.web.ssl_cert_file.is_empty() != self.web.ssl_key_file.is_empty() {
            return Err(ConfigError::validation_error(format!(
                "{} and {} must be set together",
                keys::WEB_SSL_CERT_FILE,
                keys::WEB_SSL_KEY_FILE
            )));
        }

        if self.tls_enabled() {
            for (key, file) in [
                (keys::WEB_SSL_CERT_FILE, &self.web.ssl_cert_file),
                (keys::WEB_SSL_KEY_FILE, &self.web.ssl_key_file),
            ] {
                if !Path::new(file).exists() {
                    return Err(ConfigError::invalid_value(
                        key,
                        format!("file does not exist: {file}"),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Replace the password in a `user:password@...` data source name.
pub fn mask_dsn(dsn: &str) -> String {
    let Some((credentials, rest)) = dsn.rsplit_once('@') else {
        return dsn.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{user}:***@{rest}"),
        None => dsn.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OverrideSet, SettingsDocument};

    fn resolver(content: &str, overrides: OverrideSet) -> Resolver {
        let document = SettingsDocument::from_toml_str(content, "/tmp/proxysql_exporter.toml").unwrap();
        Resolver::new(document, overrides)
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings = ExporterSettings::resolve(&resolver("", OverrideSet::new()));
        assert_eq!(settings, ExporterSettings::default());
        assert_eq!(settings.dsn, DEFAULT_DATA_SOURCE);
        assert_eq!(settings.web.listen_address, ":42004");
        assert_eq!(settings.web.telemetry_path, "/metrics");
        assert!(settings.collect.mysql_status);
        assert_eq!(settings.web.auth_file, None);
    }

    #[test]
    fn test_layers_combine() {
        let mut overrides = OverrideSet::new();
        overrides.record(keys::WEB_LISTEN_ADDRESS, "127.0.0.1:9104");
        let settings = ExporterSettings::resolve(&resolver(
            "[web]\nlisten-address = \":1\"\ntelemetry-path = \"/scrape\"\n[collect]\nmysql_status = 0\n",
            overrides,
        ));

        assert_eq!(settings.web.listen_address, "127.0.0.1:9104");
        assert_eq!(settings.web.telemetry_path, "/scrape");
        assert!(!settings.collect.mysql_status);
        assert!(settings.collect.mysql_connection_pool);
    }

    #[test]
    fn test_auth_file_empty_string_disables_auth() {
        let settings = ExporterSettings::resolve(&resolver(
            "[web]\nauth-file = \"\"\n",
            OverrideSet::new(),
        ));
        assert_eq!(settings.web.auth_file, Some(String::new()));
        assert_eq!(settings.auth_file(), None);
    }

    #[test]
    fn test_auth_file_path() {
        let settings = ExporterSettings::resolve(&resolver(
            "[web]\nauth-file = \"/etc/proxysql_exporter/auth.yml\"\n",
            OverrideSet::new(),
        ));
        assert_eq!(
            settings.auth_file(),
            Some(Path::new("/etc/proxysql_exporter/auth.yml"))
        );
    }

    #[test]
    fn test_listen_socket_addr_go_style() {
        let settings = ExporterSettings::default();
        assert_eq!(
            settings.listen_socket_addr().unwrap(),
            "0.0.0.0:42004".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_listen_socket_addr_invalid() {
        let mut settings = ExporterSettings::default();
        settings.web.listen_address = "not an address".to_string();
        assert!(settings.listen_socket_addr().is_err());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(ExporterSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_telemetry_path() {
        let mut settings = ExporterSettings::default();
        settings.web.telemetry_path = "metrics".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains(keys::WEB_TELEMETRY_PATH));
    }

    #[test]
    fn test_validate_tls_files_must_exist() {
        let mut settings = ExporterSettings::default();
        settings.web.ssl_cert_file = "/nonexistent/cert.pem".to_string();
        settings.web.ssl_key_file = "/nonexistent/key.pem".to_string();
        assert!(settings.tls_enabled());
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }

    #[test]
    fn test_validate_tls_files_set_together() {
        let mut settings = ExporterSettings::default();
        settings.web.ssl_cert_file = "/etc/ssl/cert.pem".to_string();
        assert!(!settings.tls_enabled());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_tls_files_present() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();

        let mut settings = ExporterSettings::default();
        settings.web.ssl_cert_file = cert.display().to_string();
        settings.web.ssl_key_file = key.display().to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_mask_dsn() {
        assert_eq!(
            mask_dsn("stats:stats@tcp(localhost:6032)/"),
            "stats:***@tcp(localhost:6032)/"
        );
        assert_eq!(mask_dsn("stats@tcp(localhost:6032)/"), "stats@tcp(localhost:6032)/");
        assert_eq!(mask_dsn("p@ss:w@rd@tcp(h:1)/"), "p@ss:***@tcp(h:1)/");
        assert_eq!(mask_dsn("localhost"), "localhost");
    }
}
