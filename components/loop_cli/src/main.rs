//! Event loop trace CLI
//!
//! Entry point for `loop-trace`. Parses CLI arguments, sets up logging and
//! delegates to the runner.

use clap::Parser as ClapParser;
use loop_cli::{execute, Cli, CliError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match execute(&cli, &mut out) {
        Ok(()) => {}
        Err(e @ CliError::UnknownScenario(_)) | Err(e @ CliError::NoScenario) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so the trace on stdout stays clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
