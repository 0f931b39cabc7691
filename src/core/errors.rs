//! CIA-prefixed error types with structured error codes.
//!
//! `Display` renders the bare message: it becomes the run's failure reason
//! verbatim, so the code lives in [`EmitError::code`] instead of the text.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, EmitError>;

/// Top-level error type for the analytics emitter.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Input required and not supplied: {name}")]
    MissingInput { name: String },

    #[error("Invalid date")]
    InvalidDate,

    #[error("Invalid number for {name}: {value:?}")]
    InvalidNumber { name: String, value: String },

    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{details}")]
    Sink { details: String },

    #[error("serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("{details}")]
    UnhandledFailure { details: String },
}

impl EmitError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingInput { .. } => "CIA-1001",
            Self::InvalidDate => "CIA-1002",
            Self::InvalidNumber { .. } => "CIA-1003",
            Self::InvalidConfig { .. } => "CIA-1101",
            Self::ConfigParse { .. } => "CIA-1102",
            Self::Io { .. } => "CIA-1103",
            Self::Sink { .. } => "CIA-2001",
            Self::Serialization { .. } => "CIA-2101",
            Self::UnhandledFailure { .. } => "CIA-3001",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a warehouse-side message without altering it.
    #[must_use]
    pub fn sink(details: impl Into<String>) -> Self {
        Self::Sink {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for EmitError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for EmitError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
