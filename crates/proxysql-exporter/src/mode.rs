//! Process mode selection.

use std::fmt;

use proxysql_exporter_config::Environment;

/// What this invocation does. Selected once, before anything else runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Print version information and exit.
    Version,
    /// Write the explicit overrides into the config file and exit.
    Commit,
    /// Resolve the settings and serve metrics.
    Serve,
}

impl RunMode {
    /// Pick the mode. `--version` beats the commit trigger.
    pub fn select(version_requested: bool, environment: &Environment) -> Self {
        if version_requested {
            Self::Version
        } else if environment.commit_requested {
            Self::Commit
        } else {
            Self::Serve
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => f.write_str("version"),
            Self::Commit => f.write_str("commit"),
            Self::Serve => f.write_str("serve"),
        }
    }
}
