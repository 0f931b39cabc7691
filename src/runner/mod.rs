//! Run controller: sequencing, terminal outcome, scoped failure capture.

pub mod controller;
pub mod failure_guard;

pub use controller::{RunReport, RunRequest, RunState, format_run_report, run_pipeline};
pub use failure_guard::FailureGuard;
