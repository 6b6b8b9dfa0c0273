//! Commit mode: bake explicit overrides into the config file.
//!
//! The persister loads the file fresh, writes every explicitly supplied value
//! into its leaf, applies `DATA_SOURCE_NAME` to `dsn` last, and rewrites the
//! file. Keys nobody overrode, including keys the schema does not know, are
//! written back unchanged.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::schema::{self, keys, SettingValue};
use crate::{ConfigError, OverrideSet, SettingsDocument};

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// File that was rewritten.
    pub path: PathBuf,
    /// Dotted keys that received a new value, in write order.
    pub written: Vec<String>,
}

/// Writes overrides back to the config file.
#[derive(Debug)]
pub struct Persister<'a> {
    path: PathBuf,
    overrides: &'a OverrideSet,
}

impl<'a> Persister<'a> {
    /// Create a persister for the file at `path`.
    pub fn new(path: impl AsRef<Path>, overrides: &'a OverrideSet) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Merge the overrides into the file and write it back.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be loaded, an override does
    /// not match its leaf's kind, or the file cannot be written. Nothing is
    /// written unless every step before the write succeeded.
    pub fn commit(&self) -> Result<CommitReport, ConfigError> {
        let mut document = SettingsDocument::load(&self.path)?;
        let written = self.merge(&mut document)?;
        document.save()?;

        info!(
            path = %self.path.display(),
            keys = ?written,
            "committed configuration"
        );

        Ok(CommitReport {
            path: self.path.clone(),
            written,
        })
    }

    /// Apply the overrides to `document` in memory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if an override's kind differs from
    /// its leaf's declared kind.
    pub fn merge(&self, document: &mut SettingsDocument) -> Result<Vec<String>, ConfigError> {
        let mut written = Vec::new();

        for entry in schema::leaves() {
            let Some(value) = self.overrides.explicit(&entry.key) else {
                continue;
            };
            if value.kind() != entry.leaf.kind {
                return Err(ConfigError::invalid_value(
                    &entry.key,
                    format!("expected {}, got {}", entry.leaf.kind, value.kind()),
                ));
            }
            debug!(key = %entry.key, %value, "writing override");
            document.set(&entry.section, entry.leaf.name, value.to_toml(&entry.key)?)?;
            written.push(entry.key);
        }

        if let Some(dsn) = self.overrides.data_source() {
            let (section, name) = schema::split_key(keys::DSN);
            document.set(section, name, SettingValue::from(dsn).to_toml(keys::DSN)?)?;
            if !written.iter().any(|key| key == keys::DSN) {
                written.push(keys::DSN.to_string());
            }
        }

        Ok(written)
    }
}
