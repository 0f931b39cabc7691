//! Configuration: TOML file, environment overrides, validation.
//!
//! Every field has a default, so running without a config file is the normal
//! case inside a CI job. A file only needs the keys it changes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::collector::inputs::KNOWN_INPUTS;
use crate::core::errors::{EmitError, Result};
use crate::warehouse::TableAddress;

/// Environment variable naming a config file when `--config` is not given.
pub const CONFIG_PATH_ENV: &str = "CI_ANALYTICS_CONFIG";
/// Environment override for [`Config::variant`].
pub const VARIANT_ENV: &str = "CI_ANALYTICS_VARIANT";
/// Environment override for [`SinkConfig::api_base`].
pub const API_BASE_ENV: &str = "CI_ANALYTICS_API_BASE";

/// Which historical shape of the action to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Table address and runner details all come from inputs.
    #[default]
    Full,
    /// Table address fixed by configuration; only timing/result inputs.
    FixedTable,
}

impl Variant {
    /// Kebab-case name as accepted on the command line and in TOML.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::FixedTable => "fixed-table",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = EmitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "full" => Ok(Self::Full),
            "fixed-table" => Ok(Self::FixedTable),
            other => Err(EmitError::InvalidConfig {
                details: format!("unknown variant {other:?} (expected full or fixed-table)"),
            }),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment variant.
    pub variant: Variant,
    /// Table address used when the variant does not collect one from inputs.
    pub table: TableAddress,
    /// Input table overrides.
    pub inputs: InputsConfig,
    /// Warehouse transport settings.
    pub sink: SinkConfig,
}

/// Per-input overrides of the variant's required flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    /// Input name -> required.
    pub required: BTreeMap<String, bool>,
}

/// BigQuery transport and provisioning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// REST root, without trailing slash.
    pub api_base: String,
    /// curl executable used as the HTTP transport.
    pub curl_bin: String,
    /// Environment variable holding an OAuth access token.
    pub token_env: String,
    /// Column the provisioned table is day-partitioned on.
    pub partition_field: String,
    /// Partition expiration for provisioned tables.
    pub partition_expiration_days: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            api_base: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            curl_bin: "curl".to_string(),
            token_env: "GOOGLE_OAUTH_ACCESS_TOKEN".to_string(),
            partition_field: "created_at".to_string(),
            partition_expiration_days: 90,
        }
    }
}

impl SinkConfig {
    /// Partition expiration in milliseconds, as the REST API expects it.
    #[must_use]
    pub fn partition_expiration_ms(&self) -> u64 {
        u64::from(self.partition_expiration_days) * 24 * 60 * 60 * 1000
    }
}

impl Config {
    /// Load configuration from `path`, falling back to `$CI_ANALYTICS_CONFIG`,
    /// then to defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match resolved {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EmitError::InvalidConfig {
                details: format!("config file not found: {}", path.display()),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| EmitError::io(path, source))?;
        Self::from_toml_str(&raw)
    }

    /// Parse TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `CI_ANALYTICS_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(variant) = lookup(VARIANT_ENV).filter(|v| !v.trim().is_empty()) {
            self.variant = variant.parse()?;
        }
        if let Some(base) = lookup(API_BASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.sink.api_base = base.trim().trim_end_matches('/').to_string();
        }
        Ok(())
    }

    /// Reject configurations that cannot produce a working run.
    pub fn validate(&self) -> Result<()> {
        if self.variant == Variant::FixedTable {
            self.table.validate()?;
        }
        for name in self.inputs.required.keys() {
            if !KNOWN_INPUTS.contains(&name.as_str()) {
                return Err(EmitError::InvalidConfig {
                    details: format!("inputs.required names unknown input {name:?}"),
                });
            }
        }
        for (key, value) in [
            ("sink.api_base", &self.sink.api_base),
            ("sink.curl_bin", &self.sink.curl_bin),
            ("sink.token_env", &self.sink.token_env),
            ("sink.partition_field", &self.sink.partition_field),
        ] {
            if value.trim().is_empty() {
                return Err(EmitError::InvalidConfig {
                    details: format!("{key} must not be empty"),
                });
            }
        }
        if self.sink.partition_expiration_days == 0 {
            return Err(EmitError::InvalidConfig {
                details: "sink.partition_expiration_days must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn ninety_days_in_millis() {
        assert_eq!(
            SinkConfig::default().partition_expiration_ms(),
            7_776_000_000
        );
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
variant = "fixed-table"

[table]
project_id = "side-dw-dev"

[inputs.required]
matrix_name = true
"#,
        )
        .unwrap();
        assert_eq!(config.variant, Variant::FixedTable);
        assert_eq!(config.table.project_id, "side-dw-dev");
        assert_eq!(config.table.dataset, "github");
        assert_eq!(config.inputs.required.get("matrix_name"), Some(&true));
        assert_eq!(config.sink, SinkConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::from_toml_str("variant = [").unwrap_err();
        assert_eq!(err.code(), "CIA-1102");
    }

    #[test]
    fn unknown_variant_rejected() {
        let err = Config::from_toml_str("variant = \"nightly\"").unwrap_err();
        assert_eq!(err.code(), "CIA-1102");
        assert!("nightly".parse::<Variant>().is_err());
    }

    #[test]
    fn unknown_input_override_rejected() {
        let mut config = Config::default();
        config.inputs.required.insert("github-token".to_string(), true);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("github-token"));
    }

    #[test]
    fn empty_fixed_table_rejected() {
        let mut config = Config {
            variant: Variant::FixedTable,
            ..Config::default()
        };
        config.table.dataset = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_expiration_rejected() {
        let mut config = Config::default();
        config.sink.partition_expiration_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config
            .apply_env_overrides(|key| match key {
                VARIANT_ENV => Some("fixed-table".to_string()),
                API_BASE_ENV => Some("http://localhost:9050/bigquery/v2/".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.variant, Variant::FixedTable);
        assert_eq!(config.sink.api_base, "http://localhost:9050/bigquery/v2");
    }

    #[test]
    fn blank_env_override_ignored() {
        let mut config = Config::default();
        config
            .apply_env_overrides(|_| Some("  ".to_string()))
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sink]\npartition_field = \"completed_at\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.sink.partition_field, "completed_at");
    }

    #[test]
    fn missing_file_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.code(), "CIA-1101");
    }
}
