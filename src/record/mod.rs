//! The analytics record: one flat row per CI job.

#![allow(missing_docs)]

pub mod builder;

use serde::{Deserialize, Serialize};

pub use builder::{build_record, duration_seconds, parse_timestamp};

/// Warehouse column type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
    Integer,
    Timestamp,
}

/// One analytics row. Field names are the warehouse column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub created_at: String,
    pub started_at: String,
    pub completed_at: String,
    pub matrix_name: String,
    pub matrix_value: String,
    pub result: String,
    pub draft: String,
    pub job_link: String,
    pub repository: String,
    pub workflow: String,
    pub job: String,
    pub actor: String,
    pub run_id: u64,
    pub run_number: u64,
    pub sha: String,
    pub event_name: String,
    pub run_attempt: u64,
    pub job_duration: i64,
    pub run_duration: i64,
    pub env: String,
    pub triggering_actor: String,
    pub head_ref: String,
    pub base_ref: String,
    pub runner_name: String,
    pub runner_type: String,
}

impl AnalyticsRecord {
    /// Column names and types, in serialization order.
    pub const COLUMNS: [(&'static str, ColumnType); 25] = [
        ("created_at", ColumnType::Timestamp),
        ("started_at", ColumnType::Timestamp),
        ("completed_at", ColumnType::Timestamp),
        ("matrix_name", ColumnType::String),
        ("matrix_value", ColumnType::String),
        ("result", ColumnType::String),
        ("draft", ColumnType::String),
        ("job_link", ColumnType::String),
        ("repository", ColumnType::String),
        ("workflow", ColumnType::String),
        ("job", ColumnType::String),
        ("actor", ColumnType::String),
        ("run_id", ColumnType::Integer),
        ("run_number", ColumnType::Integer),
        ("sha", ColumnType::String),
        ("event_name", ColumnType::String),
        ("run_attempt", ColumnType::Integer),
        ("job_duration", ColumnType::Integer),
        ("run_duration", ColumnType::Integer),
        ("env", ColumnType::String),
        ("triggering_actor", ColumnType::String),
        ("head_ref", ColumnType::String),
        ("base_ref", ColumnType::String),
        ("runner_name", ColumnType::String),
        ("runner_type", ColumnType::String),
    ];
}
