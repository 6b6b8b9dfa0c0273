//! Precedence-ordered lookup of settings.
//!
//! For every dotted key the resolver consults, in order:
//! 1. The [`OverrideSet`] (command line, plus `DATA_SOURCE_NAME` for `dsn`)
//! 2. The [`SettingsDocument`] loaded from the config file
//! 3. The default supplied by the caller
//!
//! Lookups never fail. Unknown keys, absent optional values and values of a
//! different kind than requested all fall through to the default.

use std::fmt;

use crate::schema::{self, SettingType, SettingValue};
use crate::{OverrideSet, SettingsDocument};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Supplied on the command line.
    CommandLine,
    /// Supplied through the `DATA_SOURCE_NAME` environment variable.
    Environment,
    /// Read from the config file.
    Document,
    /// The caller's compiled-in default.
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CommandLine => "command line",
            Self::Environment => "environment",
            Self::Document => "config file",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// Resolves settings against overrides, the config file and defaults.
///
/// # Example
///
/// ```
/// use proxysql_exporter_config::{keys, OverrideSet, Resolver, SettingsDocument};
///
/// let document = SettingsDocument::from_toml_str(
///     "[collect]\nmysql_status = 0\n",
///     "proxysql_exporter.toml",
/// )
/// .unwrap();
/// let resolver = Resolver::new(document, OverrideSet::new());
///
/// assert!(!resolver.resolve(keys::COLLECT_MYSQL_STATUS, true));
/// assert_eq!(resolver.resolve(keys::WEB_LISTEN_ADDRESS, ":42004".to_string()), ":42004");
/// ```
#[derive(Debug, Clone)]
pub struct Resolver {
    document: SettingsDocument,
    overrides: OverrideSet,
}

impl Resolver {
    /// Create a resolver over a loaded document and the captured overrides.
    #[must_use]
    pub fn new(document: SettingsDocument, overrides: OverrideSet) -> Self {
        Self {
            document,
            overrides,
        }
    }

    /// The document this resolver reads from.
    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// The overrides this resolver consults first.
    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }

    /// Resolve `key` to a typed value, falling back to `default`.
    pub fn resolve<T: SettingType>(&self, key: &str, default: T) -> T {
        self.resolve_optional(key).unwrap_or(default)
    }

    /// Resolve `key`, returning `None` when neither an override nor the
    /// document supplies a value.
    ///
    /// This is how optional leaves are read: an absent value stays `None`,
    /// while an explicitly empty string is `Some("")`.
    ///
    /// An override always shadows the document. If its kind does not match
    /// `T` the result is `None`; the document is not consulted.
    pub fn resolve_optional<T: SettingType>(&self, key: &str) -> Option<T> {
        match self.overrides.get(key) {
            Some(value) => T::from_value(value),
            None => self.lookup(key).and_then(|value| T::from_value(&value)),
        }
    }

    /// Resolve `key` to an untyped value, falling back to `default`.
    pub fn resolve_value(&self, key: &str, default: SettingValue) -> SettingValue {
        if let Some(value) = self.overrides.get(key) {
            return value.clone();
        }
        self.lookup(key).unwrap_or(default)
    }

    /// Which source [`Resolver::resolve_value`] would use for `key`.
    pub fn source(&self, key: &str) -> ValueSource {
        if key == schema::keys::DSN && self.overrides.data_source().is_some() {
            ValueSource::Environment
        } else if self.overrides.is_set(key) {
            ValueSource::CommandLine
        } else if self.lookup(key).is_some() {
            ValueSource::Document
        } else {
            ValueSource::Default
        }
    }

    fn lookup(&self, key: &str) -> Option<SettingValue> {
        let (section, name) = schema::split_key(key);
        let leaf = schema::find_leaf(section, name)?;
        let raw = self.document.get(section, name)?;
        SettingValue::from_toml(&raw, leaf.kind)
    }
}
