//! Command-line arguments

use clap::Parser;

/// Runs event loop ordering scenarios and prints their trace.
#[derive(Debug, Parser)]
#[command(name = "loop-trace", version)]
pub struct Cli {
    /// Scenario to run
    #[arg(short, long, value_name = "NAME")]
    pub scenario: Option<String>,

    /// List the available scenarios and exit
    #[arg(short, long)]
    pub list: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable scheduler debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// Wait for timers on the system clock instead of a virtual one
    #[arg(long)]
    pub real_time: bool,
}
