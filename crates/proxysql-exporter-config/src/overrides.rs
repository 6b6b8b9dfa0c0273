//! Explicitly supplied configuration values.
//!
//! The [`OverrideSet`] only ever holds values the operator actually passed on
//! this invocation. Inputs that merely carry their compiled-in default must
//! never be recorded here, otherwise they would shadow the config file.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;

use crate::schema::{keys, parse_bool, SettingValue};
use crate::ConfigError;

/// Environment variable carrying the data source name.
pub const DATA_SOURCE_ENV: &str = "DATA_SOURCE_NAME";

/// Environment variable that switches the process into commit mode.
pub const COMMIT_ENV: &str = "PROXYSQL_EXPORTER_COMMIT";

/// Values explicitly supplied by the invoking context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    entries: BTreeMap<String, SettingValue>,
    data_source: Option<SettingValue>,
}

impl OverrideSet {
    /// Create an empty override set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an explicitly supplied value for `key`.
    ///
    /// Recording the same key twice keeps the last value.
    pub fn record(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Attach the environment-sourced data source name.
    ///
    /// An empty string counts as unset.
    #[must_use]
    pub fn with_data_source(mut self, dsn: Option<String>) -> Self {
        self.data_source = dsn.filter(|d| !d.is_empty()).map(SettingValue::Str);
        self
    }

    /// Whether any source overrides `key`.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Effective override for `key`.
    ///
    /// For `dsn` the environment value wins over an explicit entry.
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        if key == keys::DSN {
            if let Some(dsn) = &self.data_source {
                return Some(dsn);
            }
        }
        self.entries.get(key)
    }

    /// Entry recorded from the command line for `key`, ignoring the environment.
    pub fn explicit(&self, key: &str) -> Option<&SettingValue> {
        self.entries.get(key)
    }

    /// Environment-sourced data source name, if any.
    pub fn data_source(&self) -> Option<&str> {
        match &self.data_source {
            Some(SettingValue::Str(dsn)) => Some(dsn),
            _ => None,
        }
    }

    /// Iterate over explicit entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of explicit entries (the environment override is not counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there is neither an explicit entry nor an environment override.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.data_source.is_none()
    }
}

/// Process environment relevant to configuration.
///
/// Read once at startup; everything downstream takes this value instead of
/// reading the environment again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Value of [`DATA_SOURCE_ENV`], if set and non-empty.
    pub data_source_name: Option<String>,
    /// Whether [`COMMIT_ENV`] is truthy.
    pub commit_requested: bool,
}

impl Environment {
    /// Read the process environment.
    ///
    /// Only [`DATA_SOURCE_ENV`] and [`COMMIT_ENV`] are looked at; other
    /// variables may hold anything.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` if either variable is not valid
    /// UTF-8 or the commit trigger is set to something that is not a boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_os_values(env::var_os(DATA_SOURCE_ENV), env::var_os(COMMIT_ENV))
    }

    /// Build from the raw values of [`DATA_SOURCE_ENV`] and [`COMMIT_ENV`].
    ///
    /// # Errors
    ///
    /// Same as [`Environment::from_env`].
    pub fn from_os_values(
        data_source: Option<OsString>,
        commit: Option<OsString>,
    ) -> Result<Self, ConfigError> {
        let mut vars = Vec::with_capacity(2);
        for (var, value) in [(DATA_SOURCE_ENV, data_source), (COMMIT_ENV, commit)] {
            if let Some(value) = value {
                let value = value
                    .into_string()
                    .map_err(|_| ConfigError::env_parse_error(var, "value is not valid UTF-8"))?;
                vars.push((var, value));
            }
        }
        Self::from_vars(vars)
    }

    /// Build from an explicit list of variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` if the commit trigger is set to
    /// something that is not a boolean.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut environment = Self::default();

        for (key, value) in vars {
            match key.as_ref() {
                DATA_SOURCE_ENV => {
                    let value = value.into();
                    environment.data_source_name = (!value.is_empty()).then_some(value);
                }
                COMMIT_ENV => {
                    let value = value.into();
                    environment.commit_requested = if value.is_empty() {
                        false
                    } else {
                        parse_bool(&value)
                            .ok_or_else(|| ConfigError::env_parse_error(COMMIT_ENV, "expected boolean"))?
                    };
                }
                _ => {}
            }
        }

        Ok(environment)
    }
}
