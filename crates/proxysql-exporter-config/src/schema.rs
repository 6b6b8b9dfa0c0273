//! Settings schema.
//!
//! Every configurable value is declared exactly once in [`ROOT`]: a top-level
//! group of bare leaves plus named sections. The resolver, the persister, the
//! document validator and the command line all walk this table, so adding a
//! setting means adding one [`SettingLeaf`] and nothing else.

use std::collections::VecDeque;
use std::fmt;

/// Dotted keys of the settings declared in [`ROOT`].
pub mod keys {
    /// Data source name used to reach the ProxySQL admin interface.
    pub const DSN: &str = "dsn";
    /// Address to listen on for the web interface and telemetry.
    pub const WEB_LISTEN_ADDRESS: &str = "web.listen-address";
    /// Path under which metrics are exposed.
    pub const WEB_TELEMETRY_PATH: &str = "web.telemetry-path";
    /// TLS certificate file.
    pub const WEB_SSL_CERT_FILE: &str = "web.ssl-cert-file";
    /// TLS key file.
    pub const WEB_SSL_KEY_FILE: &str = "web.ssl-key-file";
    /// Basic auth credentials file.
    pub const WEB_AUTH_FILE: &str = "web.auth-file";
    /// Collect from `stats_mysql_global`.
    pub const COLLECT_MYSQL_STATUS: &str = "collect.mysql_status";
    /// Collect from `stats_mysql_connection_pool`.
    pub const COLLECT_MYSQL_CONNECTION_POOL: &str = "collect.mysql_connection_pool";
}

/// Separator between a section path and a leaf name.
pub const KEY_SEPARATOR: char = '.';

/// The complete settings schema.
pub static ROOT: SettingSection = SettingSection {
    name: "",
    leaves: &[SettingLeaf::required(
        "dsn",
        ValueKind::Str,
        "Data source name of the ProxySQL admin interface.",
    )],
    sections: &[WEB_SECTION, COLLECT_SECTION],
};

const WEB_SECTION: SettingSection = SettingSection {
    name: "web",
    leaves: &[
        SettingLeaf::required(
            "listen-address",
            ValueKind::Str,
            "Address to listen on for web interface and telemetry.",
        ),
        SettingLeaf::required(
            "telemetry-path",
            ValueKind::Str,
            "Path under which to expose metrics.",
        ),
        SettingLeaf::required("ssl-cert-file", ValueKind::Str, "Path to SSL certificate file."),
        SettingLeaf::required("ssl-key-file", ValueKind::Str, "Path to SSL key file."),
        SettingLeaf::optional(
            "auth-file",
            ValueKind::Str,
            "Path to a YAML file with basic auth credentials.",
        ),
    ],
    sections: &[],
};

const COLLECT_SECTION: SettingSection = SettingSection {
    name: "collect",
    leaves: &[
        SettingLeaf::required(
            "mysql_status",
            ValueKind::Bool,
            "Collect from stats_mysql_global (SHOW MYSQL STATUS).",
        ),
        SettingLeaf::required(
            "mysql_connection_pool",
            ValueKind::Bool,
            "Collect from stats_mysql_connection_pool.",
        ),
    ],
    sections: &[],
};

/// Kind of value a setting holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `true` / `false`.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    Str,
    /// Unsigned 64-bit integer.
    Uint,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Str => "string",
            Self::Uint => "unsigned integer",
        };
        f.write_str(name)
    }
}

/// A single configurable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingLeaf {
    /// Leaf name inside its section.
    pub name: &'static str,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Whether absence is meaningful (modelled as `Option`).
    pub optional: bool,
    /// One-line help text, shown on the command line.
    pub help: &'static str,
}

impl SettingLeaf {
    /// Declares a leaf that always has a value (from somewhere).
    pub const fn required(name: &'static str, kind: ValueKind, help: &'static str) -> Self {
        Self {
            name,
            kind,
            optional: false,
            help,
        }
    }

    /// Declares a leaf whose absence is distinct from an empty value.
    pub const fn optional(name: &'static str, kind: ValueKind, help: &'static str) -> Self {
        Self {
            name,
            kind,
            optional: true,
            help,
        }
    }
}

/// A named group of leaves. The root group has an empty name.
#[derive(Debug, Clone, Copy)]
pub struct SettingSection {
    /// Section name (`""` for the top-level group).
    pub name: &'static str,
    /// Leaves declared directly in this section.
    pub leaves: &'static [SettingLeaf],
    /// Nested sections.
    pub sections: &'static [SettingSection],
}

impl SettingSection {
    /// Finds a leaf declared directly in this section.
    pub fn leaf(&self, name: &str) -> Option<&'static SettingLeaf> {
        self.leaves.iter().find(|leaf| leaf.name == name)
    }

    /// Finds a direct child section.
    pub fn section(&self, name: &str) -> Option<&'static SettingSection> {
        self.sections.iter().find(|section| section.name == name)
    }
}

/// A leaf together with its position in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry {
    /// Canonical dotted key (`section.name`, or bare `name`).
    pub key: String,
    /// Dotted path of the owning section (`""` for top-level leaves).
    pub section: String,
    /// Leaf declaration.
    pub leaf: &'static SettingLeaf,
}

/// Walks the schema breadth-first, starting with the top-level group.
pub fn leaves() -> Vec<LeafEntry> {
    let mut entries = Vec::new();
    let mut queue: VecDeque<(String, &'static SettingSection)> = VecDeque::new();
    queue.push_back((String::new(), &ROOT));

    while let Some((path, section)) = queue.pop_front() {
        for leaf in section.leaves {
            entries.push(LeafEntry {
                key: join_key(&path, leaf.name),
                section: path.clone(),
                leaf,
            });
        }
        for child in section.sections {
            queue.push_back((join_key(&path, child.name), child));
        }
    }

    entries
}

/// Finds a section by its dotted path (`""` is the top-level group).
pub fn find_section(path: &str) -> Option<&'static SettingSection> {
    if path.is_empty() {
        return Some(&ROOT);
    }
    path.split(KEY_SEPARATOR)
        .try_fold(&ROOT, |section, name| section.section(name))
}

/// Finds the leaf for `name` inside the section at `section`.
pub fn find_leaf(section: &str, name: &str) -> Option<&'static SettingLeaf> {
    find_section(section)?.leaf(name)
}

/// Splits a dotted key at the first separator into `(section, name)`.
///
/// A key without a separator is a top-level leaf and yields an empty section.
pub fn split_key(key: &str) -> (&str, &str) {
    key.split_once(KEY_SEPARATOR).unwrap_or(("", key))
}

/// Joins a section path and a leaf name into a dotted key.
pub fn join_key(section: &str, name: &str) -> String {
    if section.is_empty() {
        name.to_string()
    } else {
        format!("{section}{KEY_SEPARATOR}{name}")
    }
}

/// A typed setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    Str(String),
    /// Unsigned integer value.
    Uint(u64),
}

impl SettingValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Uint(_) => ValueKind::Uint,
        }
    }

    /// Reads a document value as `kind`.
    ///
    /// Booleans also accept the integers `0`/`1` and boolean-like strings.
    /// Floats accept integers. Returns `None` when the value does not fit.
    pub fn from_toml(value: &toml::Value, kind: ValueKind) -> Option<Self> {
        use toml::Value as T;

        match (kind, value) {
            (ValueKind::Bool, T::Boolean(b)) => Some(Self::Bool(*b)),
            (ValueKind::Bool, T::Integer(0)) => Some(Self::Bool(false)),
            (ValueKind::Bool, T::Integer(1)) => Some(Self::Bool(true)),
            (ValueKind::Bool, T::String(s)) => parse_bool(s).map(Self::Bool),
            (ValueKind::Int, T::Integer(i)) => Some(Self::Int(*i)),
            (ValueKind::Uint, T::Integer(i)) => u64::try_from(*i).ok().map(Self::Uint),
            (ValueKind::Float, T::Float(f)) => Some(Self::Float(*f)),
            #[allow(clippy::cast_precision_loss)]
            (ValueKind::Float, T::Integer(i)) => Some(Self::Float(*i as f64)),
            (ValueKind::Str, T::String(s)) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// Converts this value into its document representation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unsigned values that do not fit
    /// a TOML integer.
    pub fn to_toml(&self, key: &str) -> Result<toml::Value, crate::ConfigError> {
        Ok(match self {
            Self::Bool(b) => toml::Value::Boolean(*b),
            Self::Int(i) => toml::Value::Integer(*i),
            Self::Float(f) => toml::Value::Float(*f),
            Self::Str(s) => toml::Value::String(s.clone()),
            Self::Uint(u) => toml::Value::Integer(i64::try_from(*u).map_err(|_| {
                crate::ConfigError::invalid_value(key, format!("{u} does not fit a TOML integer"))
            })?),
        })
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Uint(u) => write!(f, "{u}"),
        }
    }
}

/// Rust types that can be read out of a [`SettingValue`].
pub trait SettingType: Sized {
    /// Kind this type maps to.
    const KIND: ValueKind;

    /// Extracts `Self` if `value` has the matching kind.
    fn from_value(value: &SettingValue) -> Option<Self>;

    /// Wraps `self` into a [`SettingValue`].
    fn into_value(self) -> SettingValue;
}

macro_rules! setting_type {
    ($ty:ty, $kind:ident) => {
        impl SettingType for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(value: &SettingValue) -> Option<Self> {
                match value {
                    SettingValue::$kind(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> SettingValue {
                SettingValue::$kind(self)
            }
        }

        impl From<$ty> for SettingValue {
            fn from(value: $ty) -> Self {
                SettingValue::$kind(value)
            }
        }
    };
}

setting_type!(bool, Bool);
setting_type!(i64, Int);
setting_type!(f64, Float);
setting_type!(String, Str);
setting_type!(u64, Uint);

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Parse a boolean from a string.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaves_walk_top_level_first() {
        let walked: Vec<String> = leaves().into_iter().map(|entry| entry.key).collect();
        assert_eq!(
            walked,
            vec![
                keys::DSN,
                keys::WEB_LISTEN_ADDRESS,
                keys::WEB_TELEMETRY_PATH,
                keys::WEB_SSL_CERT_FILE,
                keys::WEB_SSL_KEY_FILE,
                keys::WEB_AUTH_FILE,
                keys::COLLECT_MYSQL_STATUS,
                keys::COLLECT_MYSQL_CONNECTION_POOL,
            ]
        );
    }

    #[test]
    fn test_leaf_entries_carry_section() {
        let entries = leaves();
        let dsn = entries.iter().find(|e| e.key == keys::DSN).unwrap();
        assert_eq!(dsn.section, "");
        let status = entries
            .iter()
            .find(|e| e.key == keys::COLLECT_MYSQL_STATUS)
            .unwrap();
        assert_eq!(status.section, "collect");
        assert_eq!(status.leaf.kind, ValueKind::Bool);
    }

    #[test]
    fn test_only_auth_file_is_optional() {
        let optional: Vec<String> = leaves()
            .into_iter()
            .filter(|e| e.leaf.optional)
            .map(|e| e.key)
            .collect();
        assert_eq!(optional, vec![keys::WEB_AUTH_FILE]);
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("dsn"), ("", "dsn"));
        assert_eq!(split_key("web.listen-address"), ("web", "listen-address"));
        assert_eq!(split_key("a.b.c"), ("a", "b.c"));
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("", "dsn"), "dsn");
        assert_eq!(join_key("web", "auth-file"), "web.auth-file");
    }

    #[test]
    fn test_find_leaf() {
        assert!(find_leaf("", "dsn").is_some());
        assert!(find_leaf("web", "telemetry-path").is_some());
        assert!(find_leaf("web", "dsn").is_none());
        assert!(find_leaf("nope", "dsn").is_none());
        assert!(find_section("collect").is_some());
    }

    #[test]
    fn test_bool_coercion() {
        use toml::Value as T;
        assert_eq!(
            SettingValue::from_toml(&T::Integer(0), ValueKind::Bool),
            Some(SettingValue::Bool(false))
        );
        assert_eq!(
            SettingValue::from_toml(&T::Integer(1), ValueKind::Bool),
            Some(SettingValue::Bool(true))
        );
        assert_eq!(
            SettingValue::from_toml(&T::String("off".into()), ValueKind::Bool),
            Some(SettingValue::Bool(false))
        );
        assert_eq!(SettingValue::from_toml(&T::Integer(7), ValueKind::Bool), None);
    }

    #[test]
    fn test_numeric_coercion() {
        use toml::Value as T;
        assert_eq!(
            SettingValue::from_toml(&T::Integer(-3), ValueKind::Uint),
            None
        );
        assert_eq!(
            SettingValue::from_toml(&T::Integer(3), ValueKind::Uint),
            Some(SettingValue::Uint(3))
        );
        assert_eq!(
            SettingValue::from_toml(&T::Integer(2), ValueKind::Float),
            Some(SettingValue::Float(2.0))
        );
        assert_eq!(
            SettingValue::from_toml(&T::Integer(2), ValueKind::Str),
            None
        );
    }

    #[test]
    fn test_to_toml_by_kind() {
        assert_eq!(
            SettingValue::Str(":9999".into()).to_toml("k").unwrap(),
            toml::Value::String(":9999".into())
        );
        assert_eq!(
            SettingValue::Bool(false).to_toml("k").unwrap(),
            toml::Value::Boolean(false)
        );
        assert_eq!(
            SettingValue::Uint(42).to_toml("k").unwrap(),
            toml::Value::Integer(42)
        );
        assert!(SettingValue::Uint(u64::MAX).to_toml("k").is_err());
    }

    #[test]
    fn test_setting_type_round_trip() {
        assert_eq!(bool::from_value(&true.into_value()), Some(true));
        assert_eq!(
            String::from_value(&SettingValue::from("x")),
            Some("x".to_string())
        );
        assert_eq!(u64::from_value(&SettingValue::Int(1)), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));

        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));

        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }
}
