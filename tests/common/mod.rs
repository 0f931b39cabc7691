//! Shared harness for driving the `ci-analytics` binary.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

/// Captured result of one CLI invocation.
pub struct CliResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

/// Inputs that satisfy the `full` variant.
pub fn full_inputs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("INPUT_PROJECT_ID", "side-dw"),
        ("INPUT_DATASET", "github"),
        ("INPUT_TABLE", "ci_analytics"),
        ("INPUT_CREATED_AT", "2024-12-18T00:00:00Z"),
        ("INPUT_STARTED_AT", "2024-12-18T00:05:00Z"),
        ("INPUT_COMPLETED_AT", "2024-12-18T00:10:00Z"),
        ("INPUT_MATRIX_NAME", "os"),
        ("INPUT_MATRIX_VALUE", "ubuntu-latest"),
        ("INPUT_RESULT", "success"),
        ("INPUT_DRAFT", "false"),
        ("INPUT_JOB_LINK", "https://github.com/acme/example-repo/actions/runs/1234"),
        ("INPUT_RUN_ATTEMPT", "1"),
        ("INPUT_RUNNER_TYPE", "github-hosted"),
        ("INPUT_RUNNER_NAME", "GitHub Actions 2"),
        ("GITHUB_REPOSITORY", "acme/example-repo"),
        ("GITHUB_WORKFLOW", "ci"),
        ("GITHUB_JOB", "build"),
        ("GITHUB_ACTOR", "octocat"),
        ("GITHUB_RUN_ID", "1234"),
        ("GITHUB_RUN_NUMBER", "2"),
        ("GITHUB_SHA", "0123456789abcdef"),
        ("GITHUB_EVENT_NAME", "push"),
        ("ENV", "test"),
    ]
}

/// Run the binary with a scrubbed environment plus `env`, keeping a log of
/// the exchange for failed assertions.
pub fn run_cli_case(case: &str, args: &[&str], env: &[(&str, &str)]) -> CliResult {
    let output = Command::new(env!("CARGO_BIN_EXE_ci-analytics"))
        .args(args)
        .env_clear()
        .envs(env.iter().copied())
        .output()
        .expect("failed to spawn ci-analytics");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_dir = std::env::temp_dir().join("ci_analytics_cli_cases");
    let _ = fs::create_dir_all(&log_dir);
    let log_path = log_dir.join(format!("{case}.log"));
    let _ = fs::write(
        &log_path,
        format!(
            "args: {args:?}\nstatus: {}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
            output.status
        ),
    );

    CliResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
