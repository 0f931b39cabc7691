//! Ambient run context, captured once into an explicit value.

use serde::Serialize;

/// Free-form deployment tag copied into every record.
pub const DEPLOY_ENV_VAR: &str = "ENV";

/// Facts about the current CI run that the platform exposes through its
/// environment rather than as step inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunContext {
    /// Repository name without the owner prefix.
    pub repository: String,
    /// Workflow name.
    pub workflow: String,
    /// Job id within the workflow.
    pub job: String,
    /// Login that started the run.
    pub actor: String,
    /// Unique run id.
    pub run_id: u64,
    /// Per-workflow run counter.
    pub run_number: u64,
    /// Commit SHA that triggered the run.
    pub sha: String,
    /// Event that triggered the run.
    pub event_name: String,
    /// Value of `ENV`, empty when unset.
    pub deploy_env: String,
}

impl RunContext {
    /// Capture the context from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Capture the context through an arbitrary variable lookup.
    ///
    /// Unset strings become `""`. Numbers that are unset or not numeric
    /// become `0`; a malformed value is logged and never fails the run.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).unwrap_or_default();
        let number = |key: &str| -> u64 {
            match lookup(key) {
                None => 0,
                Some(raw) if raw.trim().is_empty() => 0,
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(variable = key, value = %raw, "not a number, recording 0");
                    0
                }),
            }
        };

        let full_name = text("GITHUB_REPOSITORY");
        let repository = full_name
            .rsplit_once('/')
            .map_or(full_name.as_str(), |(_, repo)| repo)
            .to_string();

        Self {
            repository,
            workflow: text("GITHUB_WORKFLOW"),
            job: text("GITHUB_JOB"),
            actor: text("GITHUB_ACTOR"),
            run_id: number("GITHUB_RUN_ID"),
            run_number: number("GITHUB_RUN_NUMBER"),
            sha: text("GITHUB_SHA"),
            event_name: text("GITHUB_EVENT_NAME"),
            deploy_env: text(DEPLOY_ENV_VAR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_github_variables() {
        let ctx = RunContext::from_lookup(lookup(&[
            ("GITHUB_REPOSITORY", "acme/example-repo"),
            ("GITHUB_WORKFLOW", "workflow"),
            ("GITHUB_JOB", "job"),
            ("GITHUB_ACTOR", "actor"),
            ("GITHUB_RUN_ID", "1234"),
            ("GITHUB_RUN_NUMBER", "2"),
            ("GITHUB_SHA", "sha"),
            ("GITHUB_EVENT_NAME", "event_name"),
            ("ENV", "test"),
        ]));
        assert_eq!(ctx.repository, "example-repo");
        assert_eq!(ctx.run_id, 1234);
        assert_eq!(ctx.run_number, 2);
        assert_eq!(ctx.deploy_env, "test");
    }

    #[test]
    fn unset_variables_default() {
        let ctx = RunContext::from_lookup(|_| None);
        assert_eq!(ctx, RunContext::default());
    }

    #[test]
    fn repository_without_owner_kept_whole() {
        let ctx = RunContext::from_lookup(lookup(&[("GITHUB_REPOSITORY", "solo")]));
        assert_eq!(ctx.repository, "solo");
    }

    #[test]
    fn malformed_run_numbers_recorded_as_zero() {
        let ctx = RunContext::from_lookup(lookup(&[
            ("GITHUB_RUN_ID", "abc"),
            ("GITHUB_RUN_NUMBER", "-3"),
            ("GITHUB_JOB", "build"),
        ]));
        assert_eq!(ctx.run_id, 0);
        assert_eq!(ctx.run_number, 0);
        assert_eq!(ctx.job, "build");
    }
}
