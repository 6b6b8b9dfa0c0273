//! ProxySQL exporter entry point.

use std::process::ExitCode;

use proxysql_exporter::{Invocation, RunMode};
use proxysql_exporter_config::Environment;
use proxysql_exporter_telemetry::init_logging;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let invocation = match Invocation::try_parse() {
        Ok(invocation) => invocation,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                // --help lands here too and is not a failure
                ExitCode::SUCCESS
            };
        }
    };

    let environment = match Environment::from_env() {
        Ok(environment) => environment,
        Err(e) => {
            eprintln!("Invalid environment: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mode = RunMode::select(invocation.cli.version, &environment);

    if mode != RunMode::Version {
        if let Err(e) = init_logging(&invocation.cli.log_config()) {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    }

    match proxysql_exporter::run(mode, invocation, environment).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
