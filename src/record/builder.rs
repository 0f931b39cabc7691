//! Record construction: timestamp validation, duration derivation, assembly.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::collector::inputs::{
    BASE_REF, COMPLETED_AT, CREATED_AT, DRAFT, HEAD_REF, JOB_LINK, MATRIX_NAME, MATRIX_VALUE,
    RESULT, RUN_ATTEMPT, RUNNER_NAME, RUNNER_TYPE, STARTED_AT, TRIGGERING_ACTOR,
};
use crate::collector::{CollectedInputs, RunContext};
use crate::core::errors::{EmitError, Result};
use crate::record::AnalyticsRecord;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M%z"];

/// Parse a CI timestamp.
///
/// Accepts RFC 3339, ISO 8601 date-times with seconds omitted, a naive
/// date-time (taken as UTC) with `T` or space separator, or a bare
/// `YYYY-MM-DD` (midnight UTC). A trailing `Z` marks UTC on any date-time.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }
    let (local, zulu) = raw
        .strip_suffix(['Z', 'z'])
        .map_or((raw, false), |rest| (rest, true));
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(local, format) {
            return Ok(naive.and_utc());
        }
    }
    if zulu {
        return Err(EmitError::InvalidDate);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or(EmitError::InvalidDate)
}

/// Whole seconds between two instants, ignoring order.
///
/// Each instant is first reduced to its own epoch millisecond, so digits
/// below the millisecond never shift the result. Sub-second remainders are
/// truncated.
#[must_use]
pub fn duration_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    // Absolute value hides out-of-order timestamps (clock skew); kept as-is
    // because downstream reports already depend on non-negative durations.
    (to.timestamp_millis() - from.timestamp_millis()).abs() / 1000
}

fn parse_count(name: &str, raw: &str) -> Result<u64> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| EmitError::InvalidNumber {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

/// Validate inputs and assemble the record for this run.
///
/// Fails with [`EmitError::InvalidDate`] before anything is logged when any of
/// the three timestamps does not parse, and with [`EmitError::InvalidNumber`]
/// when `run_attempt` is not a non-negative integer.
pub fn build_record(inputs: &CollectedInputs, context: &RunContext) -> Result<AnalyticsRecord> {
    let created_at = parse_timestamp(inputs.get(CREATED_AT))?;
    let started_at = parse_timestamp(inputs.get(STARTED_AT))?;
    let completed_at = parse_timestamp(inputs.get(COMPLETED_AT))?;

    let job_duration = duration_seconds(created_at, completed_at);
    let run_duration = duration_seconds(started_at, completed_at);
    let run_attempt = parse_count(RUN_ATTEMPT, inputs.get(RUN_ATTEMPT))?;

    let record = AnalyticsRecord {
        created_at: inputs.get(CREATED_AT).to_string(),
        started_at: inputs.get(STARTED_AT).to_string(),
        completed_at: inputs.get(COMPLETED_AT).to_string(),
        matrix_name: inputs.get(MATRIX_NAME).to_string(),
        matrix_value: inputs.get(MATRIX_VALUE).to_string(),
        result: inputs.get(RESULT).to_string(),
        draft: inputs.get(DRAFT).to_string(),
        job_link: inputs.get(JOB_LINK).to_string(),
        repository: context.repository.clone(),
        workflow: context.workflow.clone(),
        job: context.job.clone(),
        actor: context.actor.clone(),
        run_id: context.run_id,
        run_number: context.run_number,
        sha: context.sha.clone(),
        event_name: context.event_name.clone(),
        run_attempt,
        job_duration,
        run_duration,
        env: context.deploy_env.clone(),
        triggering_actor: inputs.get(TRIGGERING_ACTOR).to_string(),
        head_ref: inputs.get(HEAD_REF).to_string(),
        base_ref: inputs.get(BASE_REF).to_string(),
        runner_name: inputs.get(RUNNER_NAME).to_string(),
        runner_type: inputs.get(RUNNER_TYPE).to_string(),
    };

    tracing::info!("Analytics Object: ");
    tracing::info!("{}", serde_json::to_string_pretty(&record)?);

    Ok(record)
}
