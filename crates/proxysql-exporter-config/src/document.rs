//! File-backed settings document.
//!
//! The document is kept as an editable TOML tree, so comments, layout, and
//! keys the schema does not know about survive a commit unchanged. Only the
//! values that are written change. Known leaves are checked against their
//! declared kind at load time.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use toml_edit::{DocumentMut, Item, Table, TableLike};
use tracing::debug;

use crate::schema::{self, SettingValue};
use crate::ConfigError;

/// The loaded configuration file.
#[derive(Debug, Clone)]
pub struct SettingsDocument {
    path: PathBuf,
    document: DocumentMut,
}

impl SettingsDocument {
    /// Load and validate the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file is not valid TOML
    /// - A known setting holds a value of the wrong kind
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let document = Self::from_toml_str(&content, path)?;
        debug!(path = %path.display(), "loaded configuration file");
        Ok(document)
    }

    /// Parse and validate a document from a string.
    ///
    /// `path` is where the document belongs; it is used in error messages and
    /// by [`SettingsDocument::save`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the content is not valid TOML or a known
    /// setting holds a value of the wrong kind.
    pub fn from_toml_str(content: &str, path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let document = content
            .parse::<DocumentMut>()
            .map_err(|e| ConfigError::parse_error(&path, e))?;

        let document = Self { path, document };
        document.validate()?;
        Ok(document)
    }

    /// Path this document was loaded from and is saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scalar value of `name` inside the section at `section` (`""` is top level).
    ///
    /// Arrays, inline tables and datetimes read as `None`.
    pub fn get(&self, section: &str, name: &str) -> Option<toml::Value> {
        plain_value(self.item(section, name)?)
    }

    /// Typed value of a known leaf, or `None` if absent or not a known leaf.
    pub fn value(&self, key: &str) -> Option<SettingValue> {
        let (section, name) = schema::split_key(key);
        let leaf = schema::find_leaf(section, name)?;
        SettingValue::from_toml(&self.get(section, name)?, leaf.kind)
    }

    /// Write `value` to `name` inside the section at `section`.
    ///
    /// Missing sections are created. An existing key keeps its position and
    /// its surrounding comments. Every other key is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEntry` if a section on the path exists but
    /// is not a table, or if `value` is not a scalar.
    pub fn set(&mut self, section: &str, name: &str, value: toml::Value) -> Result<(), ConfigError> {
        let key = schema::join_key(section, name);
        let Some(mut value) = edit_value(value) else {
            return Err(ConfigError::invalid_entry(&self.path, key, "expected a scalar value"));
        };

        let parts: Vec<&str> = if section.is_empty() {
            Vec::new()
        } else {
            section.split(schema::KEY_SEPARATOR).collect()
        };
        let Some(table) = table_at(self.document.as_table_mut(), &parts) else {
            return Err(ConfigError::invalid_entry(
                &self.path,
                section,
                "expected a section table",
            ));
        };

        match table.get_mut(name) {
            Some(item) => {
                if let Some(existing) = item.as_value() {
                    *value.decor_mut() = existing.decor().clone();
                }
                *item = Item::Value(value);
            }
            None => {
                table.insert(name, Item::Value(value));
            }
        }
        Ok(())
    }

    /// Dotted keys present in the document that the schema does not declare.
    pub fn unknown_keys(&self) -> Vec<String> {
        let mut unknown = Vec::new();
        collect_unknown(self.document.as_table(), "", &mut unknown);
        unknown
    }

    /// Render the document as TOML text, comments and layout included.
    pub fn to_toml_string(&self) -> String {
        self.document.to_string()
    }

    /// Overwrite the file at [`SettingsDocument::path`] with this document.
    ///
    /// A symlinked path is resolved first, so the link's target is rewritten
    /// and the link itself stays. The content is written to a temporary file
    /// next to the target and then renamed over it, so a failed write leaves
    /// the original in place. The original file's permissions are carried
    /// over.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::WriteError` if any step of the write fails.
    pub fn save(&self) -> Result<(), ConfigError> {
        let content = self.to_toml_string();
        let write_error = |e| ConfigError::write_error(&self.path, e);

        let target = fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
        file.write_all(content.as_bytes()).map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;

        if let Ok(metadata) = fs::metadata(&target) {
            file.as_file()
                .set_permissions(metadata.permissions())
                .map_err(write_error)?;
        }

        file.persist(&target).map_err(|e| write_error(e.error))?;
        debug!(path = %self.path.display(), target = %target.display(), "wrote configuration file");
        Ok(())
    }

    fn section_table(&self, section: &str) -> Option<&dyn TableLike> {
        let root: &dyn TableLike = self.document.as_table();
        if section.is_empty() {
            return Some(root);
        }
        section
            .split(schema::KEY_SEPARATOR)
            .try_fold(root, |table, part| table.get(part)?.as_table_like())
    }

    fn item(&self, section: &str, name: &str) -> Option<&Item> {
        self.section_table(section)?.get(name)
    }

    // Every known leaf that is present must read as its declared kind, and
    // every known section that is present must be a table.
    fn validate(&self) -> Result<(), ConfigError> {
        for entry in schema::leaves() {
            if !entry.section.is_empty() {
                let (parent, name) = entry
                    .section
                    .rsplit_once(schema::KEY_SEPARATOR)
                    .unwrap_or(("", entry.section.as_str()));
                if let Some(item) = self.item(parent, name) {
                    if !item.is_table_like() {
                        return Err(ConfigError::invalid_entry(
                            &self.path,
                            &entry.section,
                            format!("expected a section table, found {}", item.type_name()),
                        ));
                    }
                }
            }

            let Some(item) = self.item(&entry.section, entry.leaf.name) else {
                continue;
            };
            let typed = plain_value(item)
                .and_then(|raw| SettingValue::from_toml(&raw, entry.leaf.kind));
            if typed.is_none() {
                return Err(ConfigError::invalid_entry(
                    &self.path,
                    &entry.key,
                    format!(
                        "expected {}, found {} {}",
                        entry.leaf.kind,
                        item.type_name(),
                        item.to_string().trim()
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn table_at<'a>(table: &'a mut dyn TableLike, path: &[&str]) -> Option<&'a mut dyn TableLike> {
    match path.split_first() {
        None => Some(table),
        Some((first, rest)) => {
            let item = table.entry(first).or_insert(Item::Table(Table::new()));
            table_at(item.as_table_like_mut()?, rest)
        }
    }
}

fn plain_value(item: &Item) -> Option<toml::Value> {
    use toml_edit::Value as V;

    match item.as_value()? {
        V::String(s) => Some(toml::Value::String(s.value().clone())),
        V::Integer(i) => Some(toml::Value::Integer(*i.value())),
        V::Float(f) => Some(toml::Value::Float(*f.value())),
        V::Boolean(b) => Some(toml::Value::Boolean(*b.value())),
        V::Datetime(_) | V::Array(_) | V::InlineTable(_) => None,
    }
}

fn edit_value(value: toml::Value) -> Option<toml_edit::Value> {
    match value {
        toml::Value::String(s) => Some(s.into()),
        toml::Value::Integer(i) => Some(i.into()),
        toml::Value::Float(f) => Some(f.into()),
        toml::Value::Boolean(b) => Some(b.into()),
        toml::Value::Datetime(_) | toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn collect_unknown(table: &dyn TableLike, section: &str, unknown: &mut Vec<String>) {
    let known = schema::find_section(section);
    for (name, item) in table.iter() {
        let key = schema::join_key(section, name);
        match (known, item.as_table_like()) {
            (Some(known), Some(inner)) if known.section(name).is_some() => {
                collect_unknown(inner, &key, unknown);
            }
            (Some(known), _) if known.leaf(name).is_some() => {}
            _ => unknown.push(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::keys;

    const SAMPLE: &str = r#"
dsn = "stats:stats@tcp(localhost:6032)/"

[web]
listen-address = ":42004"
telemetry-path = "/metrics"
ssl-cert-file = ""
ssl-key-file = ""

[collect]
mysql_status = true
mysql_connection_pool = false
"#;

    const COMMENTED: &str = r#"# managed by ops, see runbook
dsn = "stats:stats@tcp(localhost:6032)/" # prod proxysql

[web]
# keep in sync with the scrape config
listen-address = ":42004"   # default port
telemetry-path = "/metrics"
# auth-file = "/etc/proxysql_exporter/auth.yml"

[collect]
mysql_status = true
"#;

    fn sample() -> SettingsDocument {
        SettingsDocument::from_toml_str(SAMPLE, "/tmp/proxysql_exporter.toml").unwrap()
    }

    fn str_at(doc: &SettingsDocument, section: &str, name: &str) -> Option<String> {
        doc.get(section, name)
            .and_then(|v| v.as_str().map(ToString::to_string))
    }

    #[test]
    fn test_get_top_level_and_section() {
        let doc = sample();
        assert_eq!(
            str_at(&doc, "", "dsn").as_deref(),
            Some("stats:stats@tcp(localhost:6032)/")
        );
        assert_eq!(str_at(&doc, "web", "listen-address").as_deref(), Some(":42004"));
        assert!(doc.get("web", "auth-file").is_none());
        assert!(doc.get("missing", "dsn").is_none());
    }

    #[test]
    fn test_value_is_typed() {
        let doc = sample();
        assert_eq!(
            doc.value(keys::COLLECT_MYSQL_CONNECTION_POOL),
            Some(SettingValue::Bool(false))
        );
        assert_eq!(doc.value("web.unknown"), None);
    }

    #[test]
    fn test_inline_section_is_readable() {
        let doc = SettingsDocument::from_toml_str(
            "web = { listen-address = \":1\" }\n",
            "/tmp/x.toml",
        )
        .unwrap();
        assert_eq!(doc.value(keys::WEB_LISTEN_ADDRESS), Some(SettingValue::from(":1")));
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let err = SettingsDocument::from_toml_str(
            "[collect]\nmysql_status = \"sometimes\"\n",
            "/tmp/bad.toml",
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("collect.mysql_status"), "{message}");
        assert!(message.contains("/tmp/bad.toml"), "{message}");
    }

    #[test]
    fn test_rejects_array_for_scalar_leaf() {
        let err = SettingsDocument::from_toml_str("dsn = [\"a\"]\n", "/tmp/bad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEntry { ref key, .. } if key == "dsn"));
    }

    #[test]
    fn test_rejects_section_that_is_not_a_table() {
        let err = SettingsDocument::from_toml_str("web = 1\n", "/tmp/bad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEntry { ref key, .. } if key == "web"));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = SettingsDocument::from_toml_str("[web\n", "/tmp/bad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_integer_zero_is_a_valid_boolean() {
        let doc =
            SettingsDocument::from_toml_str("[collect]\nmysql_status = 0\n", "/tmp/x.toml").unwrap();
        assert_eq!(
            doc.value(keys::COLLECT_MYSQL_STATUS),
            Some(SettingValue::Bool(false))
        );
    }

    #[test]
    fn test_set_creates_missing_section() {
        let mut doc = SettingsDocument::from_toml_str("dsn = \"a\"\n", "/tmp/x.toml").unwrap();
        doc.set("web", "listen-address", toml::Value::String(":9999".into()))
            .unwrap();
        assert_eq!(str_at(&doc, "web", "listen-address").as_deref(), Some(":9999"));
        assert_eq!(str_at(&doc, "", "dsn").as_deref(), Some("a"));
        let rendered = doc.to_toml_string();
        assert!(rendered.starts_with("dsn = \"a\"\n"), "{rendered}");
        assert!(rendered.contains("[web]\nlisten-address = \":9999\"\n"), "{rendered}");
    }

    #[test]
    fn test_set_rejects_non_scalar() {
        let mut doc = sample();
        let err = doc
            .set("web", "listen-address", toml::Value::Array(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEntry { .. }));
    }

    #[test]
    fn test_untouched_document_renders_verbatim() {
        let doc = SettingsDocument::from_toml_str(COMMENTED, "/tmp/x.toml").unwrap();
        assert_eq!(doc.to_toml_string(), COMMENTED);
    }

    #[test]
    fn test_set_keeps_comments_around_the_key() {
        let mut doc = SettingsDocument::from_toml_str(COMMENTED, "/tmp/x.toml").unwrap();
        doc.set("web", "listen-address", toml::Value::String(":9999".into()))
            .unwrap();

        let expected = COMMENTED.replace(
            "listen-address = \":42004\"   # default port",
            "listen-address = \":9999\"   # default port",
        );
        assert_eq!(doc.to_toml_string(), expected);
    }

    #[test]
    fn test_unknown_keys() {
        let doc = SettingsDocument::from_toml_str(
            "dsn = \"a\"\nextra = 1\n[web]\nlisten-address = \":1\"\ncolor = \"red\"\n[other]\nx = 1\n",
            "/tmp/x.toml",
        )
        .unwrap();
        assert_eq!(doc.unknown_keys(), vec!["extra", "web.color", "other"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SettingsDocument::load("/nonexistent/proxysql_exporter.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
        assert!(err
            .to_string()
            .contains("/nonexistent/proxysql_exporter.toml"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.toml");
        fs::write(&path, SAMPLE).unwrap();

        let mut doc = SettingsDocument::load(&path).unwrap();
        doc.set("web", "telemetry-path", toml::Value::String("/m".into()))
            .unwrap();
        doc.save().unwrap();

        let reloaded = SettingsDocument::load(&path).unwrap();
        assert_eq!(str_at(&reloaded, "web", "telemetry-path").as_deref(), Some("/m"));
        assert_eq!(
            str_at(&reloaded, "web", "listen-address").as_deref(),
            Some(":42004")
        );
    }

    #[test]
    fn test_save_without_changes_keeps_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.toml");
        fs::write(&path, COMMENTED).unwrap();

        SettingsDocument::load(&path).unwrap().save().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), COMMENTED);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.toml");
        fs::write(&path, SAMPLE).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        SettingsDocument::load(&path).unwrap().save().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_through_symlink_writes_target() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.toml");
        let link = dir.path().join("link.toml");
        fs::write(&real, SAMPLE).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mut doc = SettingsDocument::load(&link).unwrap();
        doc.set("web", "listen-address", toml::Value::String(":9999".into()))
            .unwrap();
        doc.save().unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        let target = SettingsDocument::load(&real).unwrap();
        assert_eq!(str_at(&target, "web", "listen-address").as_deref(), Some(":9999"));
    }
}
