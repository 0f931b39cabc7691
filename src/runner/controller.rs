//! Run orchestration: collect, build, sink, with a single terminal outcome.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use crate::collector::inputs::{DATASET, PROJECT_ID, TABLE};
use crate::collector::{CollectedInputs, InputSource, InputTable, RunContext, collect};
use crate::core::config::{Config, SinkConfig, Variant};
use crate::core::errors::{EmitError, Result};
use crate::record::{AnalyticsRecord, build_record};
use crate::runner::failure_guard::{FailureGuard, payload_message};
use crate::warehouse::{TableAddress, Warehouse, append};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Lifecycle of one run. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Collecting,
    Building,
    Sinking,
    Done,
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Everything a run reads, passed in explicitly.
pub struct RunRequest<'a> {
    /// Loaded configuration.
    pub config: &'a Config,
    /// Step inputs.
    pub inputs: &'a dyn InputSource,
    /// Host environment lookup the run context is captured from.
    pub environment: &'a dyn Fn(&str) -> Option<String>,
    /// Build and log the record without writing it.
    pub dry_run: bool,
}

/// A single step in the run sequence.
#[derive(Debug, Clone, Serialize)]
pub struct RunStep {
    pub description: String,
    pub done: bool,
    pub error: Option<String>,
}

/// Structured outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub variant: Variant,
    pub dry_run: bool,
    pub state: RunState,
    /// Every state entered, in order, starting with `Idle`.
    pub history: Vec<RunState>,
    pub steps: Vec<RunStep>,
    pub table: Option<TableAddress>,
    pub record: Option<AnalyticsRecord>,
    /// Failure reason: the error's message, verbatim.
    pub failure: Option<String>,
    pub error_code: Option<&'static str>,
}

impl RunReport {
    fn new(variant: Variant, dry_run: bool) -> Self {
        Self {
            variant,
            dry_run,
            state: RunState::Idle,
            history: vec![RunState::Idle],
            steps: Vec::new(),
            table: None,
            record: None,
            failure: None,
            error_code: None,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done
    }

    fn enter(&mut self, next: RunState) {
        debug_assert!(!self.state.is_terminal(), "run already finished");
        self.state = next;
        self.history.push(next);
    }

    fn step_ok(&mut self, description: impl Into<String>) {
        self.steps.push(RunStep {
            description: description.into(),
            done: true,
            error: None,
        });
    }

    fn fail(&mut self, err: &EmitError) {
        let stage = match self.state {
            RunState::Idle | RunState::Collecting => "Collect inputs",
            RunState::Building => "Build analytics record",
            RunState::Sinking => "Write to warehouse",
            RunState::Done | RunState::Failed => "Finish run",
        };
        self.steps.push(RunStep {
            description: stage.to_string(),
            done: false,
            error: Some(err.to_string()),
        });
        self.failure = Some(err.to_string());
        self.error_code = Some(err.code());
        self.enter(RunState::Failed);
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Run the pipeline once and return its report.
///
/// `connect` builds the warehouse client; it is only called when a record has
/// been built and the run is not a dry run. Errors and panics from any stage
/// end the run in [`RunState::Failed`] and are logged exactly once.
pub fn run_pipeline<W, C>(request: &RunRequest<'_>, connect: C) -> RunReport
where
    W: Warehouse,
    C: FnOnce(&SinkConfig) -> Result<W>,
{
    let mut report = RunReport::new(request.config.variant, request.dry_run);

    let guard = FailureGuard::install();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        execute(request, connect, &mut report)
    }));
    let result = outcome.unwrap_or_else(|payload| {
        let captured = guard.take();
        if let Some(location) = captured.as_ref().and_then(|c| c.location.as_deref()) {
            tracing::debug!(%location, "unexpected failure site");
        }
        Err(EmitError::UnhandledFailure {
            details: captured.map_or_else(|| payload_message(payload.as_ref()), |c| c.message),
        })
    });
    drop(guard);

    match result {
        Ok(()) => report.enter(RunState::Done),
        Err(err) => {
            tracing::error!(code = err.code(), "{err}");
            report.fail(&err);
        }
    }
    report
}

fn execute<W, C>(request: &RunRequest<'_>, connect: C, report: &mut RunReport) -> Result<()>
where
    W: Warehouse,
    C: FnOnce(&SinkConfig) -> Result<W>,
{
    let config = request.config;
    tracing::info!("Successfully triggering CI Analytics action");

    report.enter(RunState::Collecting);
    let table = InputTable::for_variant(config.variant).with_overrides(&config.inputs.required);
    let inputs = collect(request.inputs, &table)?;
    let context = RunContext::from_lookup(request.environment);
    let address = resolve_address(config, &inputs)?;
    report.step_ok(format!("Collected {} inputs", inputs.len()));
    report.table = Some(address.clone());

    report.enter(RunState::Building);
    let record = build_record(&inputs, &context)?;
    report.step_ok(format!(
        "Built record: job_duration={}s run_duration={}s",
        record.job_duration, record.run_duration
    ));
    report.record = Some(record.clone());

    if request.dry_run {
        report.step_ok(format!("Dry run: skipped insert into {address}"));
        tracing::info!(table = %address, "dry run, record not sent");
        return Ok(());
    }

    report.enter(RunState::Sinking);
    let warehouse = connect(&config.sink)?;
    append(&warehouse, &address, &record)?;
    report.step_ok(format!("Inserted 1 row into {address}"));
    tracing::info!("Successfully Set CI Analytics in bigquery");
    Ok(())
}

/// Table address from inputs where collected and non-empty, else from config.
fn resolve_address(config: &Config, inputs: &CollectedInputs) -> Result<TableAddress> {
    let pick = |name: &str, fallback: &str| {
        let value = inputs.get(name);
        if value.is_empty() {
            fallback.to_string()
        } else {
            value.to_string()
        }
    };
    let address = TableAddress::new(
        pick(PROJECT_ID, &config.table.project_id),
        pick(DATASET, &config.table.dataset),
        pick(TABLE, &config.table.table),
    );
    address.validate()?;
    Ok(address)
}

/// Format a run report for terminal output.
///
/// The failure reason is left out: the error event and the step's failure
/// annotation already carry it.
#[must_use]
pub fn format_run_report(report: &RunReport) -> String {
    let mut out = String::new();

    for step in &report.steps {
        let icon = if step.done { "[ OK ]" } else { "[FAIL]" };
        let _ = writeln!(out, "  {icon} {}", step.description);
    }

    let _ = writeln!(out);
    match (report.state, report.dry_run) {
        (RunState::Done, true) => {
            let _ = writeln!(out, "Dry-run complete. No row was written.");
        }
        (RunState::Done, false) => {
            let _ = writeln!(out, "Analytics row recorded.");
        }
        _ => {
            let _ = writeln!(
                out,
                "Run failed ({}).",
                report.error_code.unwrap_or("no error code")
            );
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
