//! HTTP basic authentication.
//!
//! Credentials live in a small YAML file:
//!
//! ```yaml
//! server_user: prometheus
//! server_password: s3cret
//! ```

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::HeaderValue;
use serde::Deserialize;

use crate::error::{ExporterError, ExporterResult};

/// Realm announced in `WWW-Authenticate`.
pub const REALM: &str = "proxysql_exporter";

/// Expected basic auth credentials.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct BasicAuth {
    server_user: String,
    server_password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("server_user", &self.server_user)
            .field("server_password", &"***")
            .finish()
    }
}

impl BasicAuth {
    /// Create credentials directly.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server_user: user.into(),
            server_password: password.into(),
        }
    }

    /// Load credentials from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ExporterError::AuthFileRead` if the file cannot be read and
    /// `ExporterError::AuthFileInvalid` if it is not valid or the user is empty.
    pub fn load(path: &Path) -> ExporterResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ExporterError::auth_file_read(path, e))?;
        Self::from_yaml(&content, path)
    }

    /// Parse credentials from YAML text. `path` is used in error messages.
    ///
    /// # Errors
    ///
    /// Returns `ExporterError::AuthFileInvalid` on malformed YAML or an empty user.
    pub fn from_yaml(content: &str, path: &Path) -> ExporterResult<Self> {
        let auth: Self = serde_yaml::from_str(content)
            .map_err(|e| ExporterError::auth_file_invalid(path, e.to_string()))?;
        if auth.server_user.is_empty() {
            return Err(ExporterError::auth_file_invalid(path, "server_user is empty"));
        }
        Ok(auth)
    }

    /// User name clients must present.
    pub fn user(&self) -> &str {
        &self.server_user
    }

    /// Check an `Authorization` header against these credentials.
    pub fn authorize(&self, header: Option<&HeaderValue>) -> bool {
        let Some(encoded) = header
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };

        match decoded.split_once(':') {
            Some((user, password)) => {
                constant_time_eq(user.as_bytes(), self.server_user.as_bytes())
                    & constant_time_eq(password.as_bytes(), self.server_password.as_bytes())
            }
            None => false,
        }
    }

    /// Value for the `WWW-Authenticate` header of a rejected request.
    pub fn challenge() -> HeaderValue {
        HeaderValue::from_static("Basic realm=\"proxysql_exporter\"")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
