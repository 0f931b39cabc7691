//! Table schema derived from [`AnalyticsRecord`] and one-time provisioning.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::config::SinkConfig;
use crate::core::errors::{EmitError, Result};
use crate::record::{AnalyticsRecord, ColumnType};
use crate::warehouse::{TableAddress, Warehouse};

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSchema {
    /// Column name.
    pub name: &'static str,
    /// Column type.
    #[serde(rename = "type")]
    pub kind: ColumnType,
    /// Always `NULLABLE`; the insert path never relies on REQUIRED columns.
    pub mode: &'static str,
}

/// Day partitioning with expiration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePartitioning {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Milliseconds, encoded as a string like the REST API does.
    pub expiration_ms: String,
    pub field: String,
}

/// Everything needed to create the analytics table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub fields: Vec<FieldSchema>,
    pub time_partitioning: TimePartitioning,
}

impl TableSchema {
    /// Schema for [`AnalyticsRecord`] with the partitioning from `sink`.
    ///
    /// The partition column must be one of the record's timestamp columns.
    pub fn for_record(sink: &SinkConfig) -> Result<Self> {
        let partition_ok = AnalyticsRecord::COLUMNS
            .iter()
            .any(|(name, kind)| *name == sink.partition_field && *kind == ColumnType::Timestamp);
        if !partition_ok {
            return Err(EmitError::InvalidConfig {
                details: format!(
                    "partition field {:?} is not a timestamp column of the analytics record",
                    sink.partition_field
                ),
            });
        }

        let fields = AnalyticsRecord::COLUMNS
            .iter()
            .map(|&(name, kind)| FieldSchema {
                name,
                kind,
                mode: "NULLABLE",
            })
            .collect();

        Ok(Self {
            fields,
            time_partitioning: TimePartitioning {
                kind: "DAY",
                expiration_ms: sink.partition_expiration_ms().to_string(),
                field: sink.partition_field.clone(),
            },
        })
    }
}

/// Create the analytics table. A setup step, run by hand; never per CI job.
pub fn provision(
    warehouse: &dyn Warehouse,
    address: &TableAddress,
    sink: &SinkConfig,
) -> Result<TableSchema> {
    address.validate()?;
    let schema = TableSchema::for_record(sink)?;
    warehouse.create_table(address, &schema)?;
    tracing::info!(
        table = %address,
        partition_field = %schema.time_partitioning.field,
        expiration_ms = %schema.time_partitioning.expiration_ms,
        "provisioned analytics table"
    );
    Ok(schema)
}
