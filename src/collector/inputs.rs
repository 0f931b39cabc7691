//! Named step inputs: the per-variant input table and its collection.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::config::Variant;
use crate::core::errors::{EmitError, Result};

pub const PROJECT_ID: &str = "project_id";
pub const DATASET: &str = "dataset";
pub const TABLE: &str = "table";
pub const CREATED_AT: &str = "created_at";
pub const STARTED_AT: &str = "started_at";
pub const COMPLETED_AT: &str = "completed_at";
pub const MATRIX_NAME: &str = "matrix_name";
pub const MATRIX_VALUE: &str = "matrix_value";
pub const RESULT: &str = "result";
pub const DRAFT: &str = "draft";
pub const JOB_LINK: &str = "job_link";
pub const TRIGGERING_ACTOR: &str = "triggering_actor";
pub const RUN_ATTEMPT: &str = "run_attempt";
pub const HEAD_REF: &str = "head_ref";
pub const BASE_REF: &str = "base_ref";
pub const RUNNER_TYPE: &str = "runner_type";
pub const RUNNER_NAME: &str = "runner_name";

/// Every input name any variant may collect.
pub const KNOWN_INPUTS: [&str; 17] = [
    PROJECT_ID,
    DATASET,
    TABLE,
    CREATED_AT,
    STARTED_AT,
    COMPLETED_AT,
    MATRIX_NAME,
    MATRIX_VALUE,
    RESULT,
    DRAFT,
    JOB_LINK,
    TRIGGERING_ACTOR,
    RUN_ATTEMPT,
    HEAD_REF,
    BASE_REF,
    RUNNER_TYPE,
    RUNNER_NAME,
];

/// Where named inputs come from.
pub trait InputSource {
    /// Raw value for `name`, or `None` when the platform did not supply it.
    fn get(&self, name: &str) -> Option<String>;
}

/// GitHub Actions convention: input `name` lives in `INPUT_<NAME>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvInputSource;

impl EnvInputSource {
    /// Environment variable holding input `name`.
    #[must_use]
    pub fn var_name(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }
}

impl InputSource for EnvInputSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(Self::var_name(name))
            .ok()
            .map(|value| value.trim().to_string())
    }
}

impl InputSource for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }
}

/// One row of the input table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> InputSpec {
    InputSpec {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> InputSpec {
    InputSpec {
        name,
        required: false,
    }
}

const FULL_TABLE: [InputSpec; 17] = [
    required(PROJECT_ID),
    required(DATASET),
    required(TABLE),
    required(CREATED_AT),
    required(STARTED_AT),
    required(COMPLETED_AT),
    optional(MATRIX_NAME),
    optional(MATRIX_VALUE),
    required(RESULT),
    optional(DRAFT),
    optional(JOB_LINK),
    optional(TRIGGERING_ACTOR),
    required(RUN_ATTEMPT),
    optional(HEAD_REF),
    optional(BASE_REF),
    required(RUNNER_TYPE),
    required(RUNNER_NAME),
];

const FIXED_TABLE: [InputSpec; 14] = [
    required(CREATED_AT),
    required(STARTED_AT),
    required(COMPLETED_AT),
    optional(MATRIX_NAME),
    optional(MATRIX_VALUE),
    optional(RESULT),
    optional(DRAFT),
    optional(JOB_LINK),
    optional(TRIGGERING_ACTOR),
    optional(RUN_ATTEMPT),
    optional(HEAD_REF),
    optional(BASE_REF),
    optional(RUNNER_TYPE),
    optional(RUNNER_NAME),
];

/// The inputs a variant collects, in collection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputTable {
    specs: Vec<InputSpec>,
}

impl InputTable {
    #[must_use]
    pub fn for_variant(variant: Variant) -> Self {
        let specs = match variant {
            Variant::Full => FULL_TABLE.to_vec(),
            Variant::FixedTable => FIXED_TABLE.to_vec(),
        };
        Self { specs }
    }

    /// Override required flags by name. Names the table does not collect are
    /// appended so an override can pull an input into a variant.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, bool>) -> Self {
        for (name, &is_required) in overrides {
            if let Some(spec) = self.specs.iter_mut().find(|spec| spec.name == name) {
                spec.required = is_required;
            } else if let Some(known) = KNOWN_INPUTS.iter().find(|known| **known == name) {
                self.specs.push(InputSpec {
                    name: *known,
                    required: is_required,
                });
            }
        }
        self
    }

    #[must_use]
    pub fn specs(&self) -> &[InputSpec] {
        &self.specs
    }

    #[must_use]
    pub fn collects(&self, name: &str) -> bool {
        self.specs.iter().any(|spec| spec.name == name)
    }
}

/// Input values gathered for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectedInputs {
    values: BTreeMap<&'static str, String>,
}

impl CollectedInputs {
    /// Value of `name`; `""` when absent or not collected.
    #[must_use]
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map_or("", String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read every input in `table` from `source`.
///
/// A required input that is absent or empty fails with
/// [`EmitError::MissingInput`]; optional inputs default to `""`.
pub fn collect(source: &dyn InputSource, table: &InputTable) -> Result<CollectedInputs> {
    let mut values = BTreeMap::new();
    for spec in table.specs() {
        let value = source.get(spec.name).unwrap_or_default();
        if spec.required && value.is_empty() {
            return Err(EmitError::MissingInput {
                name: spec.name.to_string(),
            });
        }
        values.insert(spec.name, value);
    }
    Ok(CollectedInputs { values })
}
