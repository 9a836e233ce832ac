//! Scenario execution
//!
//! The runner owns the scheduler lifecycle: build it, play the scenario's
//! synchronous part, drain both queues, tear it down, and collect what the
//! console and the error sink saw along the way.

use crate::cli::Cli;
use crate::error::{CliError, CliResult};
use crate::scenarios::{Console, Scenario, TraceLine, SCENARIOS};
use async_runtime::{Scheduler, SystemClock, UnhandledError};
use core_types::JsError;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::io::Write;
use std::rc::Rc;

/// What a scenario run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Scenario name
    pub scenario: &'static str,
    /// Console output in logging order
    pub lines: Vec<TraceLine>,
    /// Errors delivered to the unhandled-error sink, in delivery order
    pub unhandled: Vec<UnhandledError>,
    /// Number of macrotasks executed
    pub macrotasks: usize,
    /// Scheduler time when the loop went idle, in milliseconds
    pub elapsed_ms: u64,
}

impl Report {
    /// Plain-text rendering: one `[time] text` line per console line, then
    /// one line per unhandled error.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let _ = writeln!(out, "[{:>5}ms] {}", line.at_ms, line.text);
        }
        for error in &self.unhandled {
            let message = error
                .payload::<JsError>()
                .map(ToString::to_string)
                .unwrap_or_else(|| error.description.clone());
            let _ = writeln!(out, "unhandled {}: {}", error.kind, message);
        }
        out
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> CliResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs scenarios on a fresh scheduler each time.
#[derive(Debug, Default)]
pub struct Runner {
    /// Whether timers wait on the system clock
    real_time: bool,
    /// Whether teardown logs every dropped queue item
    report_cancelled: bool,
}

impl Runner {
    /// Create a runner using a virtual clock
    ///
    /// # Example
    /// ```
    /// use loop_cli::{Runner, Scenario};
    ///
    /// let scenario = Scenario::find("interview").unwrap();
    /// let report = Runner::new().run(scenario).unwrap();
    /// let texts: Vec<_> = report.lines.iter().map(|l| l.text.as_str()).collect();
    /// assert_eq!(texts, ["start", "end", "promise 1", "promise 2", "timeout"]);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for timers in real time
    pub fn with_real_time(mut self, enabled: bool) -> Self {
        self.real_time = enabled;
        self
    }

    /// Log every item dropped at teardown
    pub fn with_report_cancelled(mut self, enabled: bool) -> Self {
        self.report_cancelled = enabled;
        self
    }

    /// Runs `scenario` until the loop is idle.
    ///
    /// # Errors
    /// Returns `CliError` if the scenario fails during its synchronous part
    pub fn run(&self, scenario: &Scenario) -> CliResult<Report> {
        let unhandled = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&unhandled);
        let mut builder = Scheduler::builder()
            .error_sink(move |error: &UnhandledError| sink.borrow_mut().push(error.clone()))
            .report_cancelled(self.report_cancelled);
        if self.real_time {
            builder = builder.clock(Rc::new(SystemClock::new()));
        }
        let scheduler = builder.build();
        let _guard = scheduler.enter();

        tracing::info!(scenario = scenario.name, real_time = self.real_time, "running scenario");
        let console = Console::new(&scheduler);
        scenario.play(&console)?;
        let macrotasks = scheduler.drain_all();
        let dropped = scheduler.teardown();
        tracing::debug!(?dropped, "scenario finished");

        let unhandled = unhandled.borrow().clone();
        Ok(Report {
            scenario: scenario.name,
            lines: console.lines(),
            unhandled,
            macrotasks,
            elapsed_ms: scheduler.now().as_millis() as u64,
        })
    }
}

/// Carries out what `cli` asks for, writing to `out`.
pub fn execute<W: Write>(cli: &Cli, out: &mut W) -> CliResult<()> {
    if cli.list {
        for scenario in SCENARIOS {
            writeln!(out, "{:<20} {}", scenario.name, scenario.summary)?;
        }
        return Ok(());
    }

    let name = cli.scenario.as_deref().ok_or(CliError::NoScenario)?;
    let scenario = Scenario::find(name)?;
    let report = Runner::new().with_real_time(cli.real_time).run(scenario)?;
    if cli.json {
        writeln!(out, "{}", report.to_json()?)?;
    } else {
        write!(out, "{}", report.render())?;
    }
    Ok(())
}
