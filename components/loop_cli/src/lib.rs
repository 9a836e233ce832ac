//! Event loop trace CLI library
//!
//! Runs the built-in ordering scenarios on a deterministic scheduler and
//! renders their timestamped console output along with any unhandled errors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod runner;
pub mod scenarios;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use runner::{execute, Report, Runner};
pub use scenarios::{Console, Scenario, TraceLine, SCENARIOS};
