//! Command line parsing.
//!
//! Fixed flags (`--config`, `--version`, logging) come from the [`Cli`]
//! derive. One flag per schema leaf is added on top, named after the leaf's
//! dotted key (`--web.listen-address`, `--collect.mysql_status`, ...).
//!
//! Only flags the operator actually typed end up in the [`OverrideSet`]; the
//! provenance comes from clap's [`ValueSource`], never from comparing values
//! against their defaults.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgMatches, Command, CommandFactory, FromArgMatches, Parser};
use proxysql_exporter_config::schema::{self, LeafEntry};
use proxysql_exporter_config::{OverrideSet, SettingValue, ValueKind};
use proxysql_exporter_telemetry::{LogConfig, LogFormat};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PROXYSQL_EXPORTER_CONFIG";

/// Config file used when neither `--config` nor [`CONFIG_ENV`] is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/proxysql_exporter/proxysql_exporter.toml";

/// Fixed command line flags.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "proxysql_exporter",
    about = "Exports various ProxySQL metrics in Prometheus format.",
    long_about = "Exports various ProxySQL metrics in Prometheus format.\n\n\
                  DATA_SOURCE_NAME overrides the dsn. Set PROXYSQL_EXPORTER_COMMIT=true \
                  to write the flags given on this command line into the config file and exit.",
    disable_version_flag = true
)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_PATH, value_name = "PATH")]
    pub config: PathBuf,

    /// Print version information and exit.
    #[arg(long)]
    pub version: bool,

    /// Log filter, e.g. `info` or `proxysql_exporter=debug,warn`.
    #[arg(long = "log.level", default_value = "info", value_name = "FILTER")]
    pub log_level: String,

    /// Log format: `json` or `pretty`.
    #[arg(long = "log.format", default_value = "json", value_name = "FORMAT")]
    pub log_format: LogFormat,
}

impl Cli {
    /// Logging configuration requested on the command line.
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(self.log_level.clone(), self.log_format)
    }
}

/// A parsed command line.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Fixed flags.
    pub cli: Cli,
    /// Schema values typed on the command line.
    pub overrides: OverrideSet,
}

impl Invocation {
    /// Parse the process arguments.
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments, `--help` included.
    pub fn try_parse() -> Result<Self, clap::Error> {
        Self::try_parse_from(std::env::args_os())
    }

    /// Parse an explicit argument list. The first item is the program name.
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments, `--help` included.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        let cli = Cli::from_arg_matches(&matches)?;
        let overrides = capture_overrides(&matches);

        Ok(Self { cli, overrides })
    }
}

/// The full command: fixed flags plus one flag per schema leaf.
pub fn command() -> Command {
    schema::leaves()
        .iter()
        .fold(Cli::command(), |command, entry| command.arg(setting_arg(entry)))
}

fn setting_arg(entry: &LeafEntry) -> Arg {
    let arg = Arg::new(entry.key.clone())
        .long(entry.key.clone())
        .help(entry.leaf.help);

    match entry.leaf.kind {
        // `--collect.mysql_status` alone means true.
        ValueKind::Bool => arg
            .value_name("BOOL")
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new()),
        ValueKind::Int => arg.value_name("INT").value_parser(value_parser!(i64)),
        ValueKind::Uint => arg.value_name("UINT").value_parser(value_parser!(u64)),
        ValueKind::Float => arg.value_name("FLOAT").value_parser(value_parser!(f64)),
        ValueKind::Str => arg.value_name("VALUE").value_parser(value_parser!(String)),
    }
}

/// Collect the schema values whose source is the command line.
pub fn capture_overrides(matches: &ArgMatches) -> OverrideSet {
    let mut overrides = OverrideSet::new();

    for entry in schema::leaves() {
        if matches.value_source(&entry.key) != Some(ValueSource::CommandLine) {
            continue;
        }
        let value = match entry.leaf.kind {
            ValueKind::Bool => matches.get_one::<bool>(&entry.key).copied().map(SettingValue::Bool),
            ValueKind::Int => matches.get_one::<i64>(&entry.key).copied().map(SettingValue::Int),
            ValueKind::Uint => matches.get_one::<u64>(&entry.key).copied().map(SettingValue::Uint),
            ValueKind::Float => matches.get_one::<f64>(&entry.key).copied().map(SettingValue::Float),
            ValueKind::Str => matches.get_one::<String>(&entry.key).cloned().map(SettingValue::Str),
        };
        if let Some(value) = value {
            overrides.record(entry.key, value);
        }
    }

    overrides
}
