//! Error types for the exporter binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use proxysql_exporter_config::ConfigError;
use proxysql_exporter_telemetry::TelemetryError;
use thiserror::Error;

/// Exporter errors. Every variant is fatal and ends the process with exit code 1.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Configuration could not be loaded, resolved or committed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialized.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The listen socket could not be bound.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address we tried to bind.
        address: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The basic auth file could not be read.
    #[error("Failed to read auth file {path}: {source}")]
    AuthFileRead {
        /// Path of the auth file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The basic auth file is not valid YAML or lacks credentials.
    #[error("Invalid auth file {path}: {reason}")]
    AuthFileInvalid {
        /// Path of the auth file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// TLS files are configured but this build only serves plain HTTP.
    #[error(
        "TLS is configured (cert: {cert_file}, key: {key_file}) but not supported; \
         terminate TLS in front of the exporter and clear web.ssl-cert-file/web.ssl-key-file"
    )]
    TlsUnsupported {
        /// Configured certificate file.
        cert_file: String,
        /// Configured key file.
        key_file: String,
    },
}

impl ExporterError {
    /// Create a bind error.
    pub fn bind(address: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { address, source }
    }

    /// Create an auth file read error.
    pub fn auth_file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::AuthFileRead {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid auth file error.
    pub fn auth_file_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::AuthFileInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for exporter operations.
pub type ExporterResult<T> = Result<T, ExporterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: ExporterError = ConfigError::file_not_found("/etc/x.toml").into();
        assert!(matches!(err, ExporterError::Config(_)));
        assert!(err.to_string().contains("/etc/x.toml"));
    }

    #[test]
    fn test_bind_error_display() {
        let address: SocketAddr = "127.0.0.1:42004".parse().unwrap();
        let err = ExporterError::bind(
            address,
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to bind 127.0.0.1:42004: address in use"
        );
    }

    #[test]
    fn test_tls_unsupported_names_files() {
        let err = ExporterError::TlsUnsupported {
            cert_file: "/etc/ssl/cert.pem".to_string(),
            key_file: "/etc/ssl/key.pem".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/etc/ssl/cert.pem"));
        assert!(message.contains("/etc/ssl/key.pem"));
    }
}
