//! Warehouse sink: table addressing, the client seam, and the single-row append.

pub mod bigquery;
pub mod schema;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{EmitError, Result};
use crate::record::AnalyticsRecord;

pub use bigquery::BigQueryClient;
pub use schema::{TableSchema, provision};

/// Fully qualified table: project, dataset, table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableAddress {
    /// Cloud project owning the dataset.
    pub project_id: String,
    /// Dataset inside the project.
    pub dataset: String,
    /// Table inside the dataset.
    pub table: String,
}

impl Default for TableAddress {
    fn default() -> Self {
        Self::new("side-dw", "github", "ci_analytics")
    }
}

impl TableAddress {
    /// Address of `project_id.dataset.table`.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Every component must be non-empty.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("project_id", &self.project_id),
            ("dataset", &self.dataset),
            ("table", &self.table),
        ] {
            if value.trim().is_empty() {
                return Err(EmitError::InvalidConfig {
                    details: format!("table address {key} must not be empty"),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for TableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset, self.table)
    }
}

/// Operations the pipeline needs from a warehouse.
///
/// Implementations report failures as [`EmitError::Sink`] carrying the
/// service's own message; callers never retry.
pub trait Warehouse {
    /// Confirm the table exists and return its id.
    fn resolve_table(&self, address: &TableAddress) -> Result<String>;

    /// Append one row.
    fn insert_row(&self, address: &TableAddress, record: &AnalyticsRecord) -> Result<()>;

    /// Create the table. Setup only; never part of a run.
    fn create_table(&self, address: &TableAddress, schema: &TableSchema) -> Result<()>;
}

impl<W: Warehouse + ?Sized> Warehouse for &W {
    fn resolve_table(&self, address: &TableAddress) -> Result<String> {
        (**self).resolve_table(address)
    }

    fn insert_row(&self, address: &TableAddress, record: &AnalyticsRecord) -> Result<()> {
        (**self).insert_row(address, record)
    }

    fn create_table(&self, address: &TableAddress, schema: &TableSchema) -> Result<()> {
        (**self).create_table(address, schema)
    }
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn resolve_table(&self, address: &TableAddress) -> Result<String> {
        (**self).resolve_table(address)
    }

    fn insert_row(&self, address: &TableAddress, record: &AnalyticsRecord) -> Result<()> {
        (**self).insert_row(address, record)
    }

    fn create_table(&self, address: &TableAddress, schema: &TableSchema) -> Result<()> {
        (**self).create_table(address, schema)
    }
}

/// Resolve the target table and append `record` exactly once.
pub fn append(
    warehouse: &dyn Warehouse,
    address: &TableAddress,
    record: &AnalyticsRecord,
) -> Result<()> {
    let table_id = warehouse.resolve_table(address)?;
    tracing::info!("Retrieved table {table_id}");
    warehouse.insert_row(address, record)?;
    tracing::debug!(table = %address, "row appended");
    Ok(())
}
