//! CI analytics emitter.
//!
//! Reads one CI job's timing, result, and environment metadata, derives the
//! job and run durations, and appends a single analytics row to a BigQuery
//! table. See [`runner::run_pipeline`] for the end-to-end sequence.

pub mod collector;
pub mod core;
pub mod logger;
pub mod record;
pub mod runner;
pub mod warehouse;

#[cfg(feature = "cli")]
pub mod cli_app;

pub use crate::core::errors::{EmitError, Result};
