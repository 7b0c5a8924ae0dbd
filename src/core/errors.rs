//! FXA-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::activity::category::SourceCategory;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FxaError>;

/// Top-level error type for the activity engine.
#[derive(Debug, Error)]
pub enum FxaError {
    #[error("[FXA-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FXA-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FXA-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FXA-1101] invalid scope {scope:?}: expected \"all\" or a numeric owner id")]
    InvalidScope { scope: String },

    #[error("[FXA-1102] invalid request: {details}")]
    InvalidRequest { details: String },

    #[error("[FXA-1103] invalid filter on {field}: {details}")]
    InvalidFilter { field: String, details: String },

    #[error("[FXA-2001] schema drift in {category}: column {column} does not exist")]
    SchemaDrift {
        category: SourceCategory,
        column: String,
    },

    #[error("[FXA-2002] {category} query failed: {details}")]
    SourceQuery {
        category: SourceCategory,
        details: String,
    },

    #[error("[FXA-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FXA-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[FXA-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FxaError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FXA-1001",
            Self::MissingConfig { .. } => "FXA-1002",
            Self::ConfigParse { .. } => "FXA-1003",
            Self::InvalidScope { .. } => "FXA-1101",
            Self::InvalidRequest { .. } => "FXA-1102",
            Self::InvalidFilter { .. } => "FXA-1103",
            Self::SchemaDrift { .. } => "FXA-2001",
            Self::SourceQuery { .. } => "FXA-2002",
            Self::Serialization { .. } => "FXA-2101",
            Self::Sql { .. } => "FXA-2102",
            Self::Io { .. } => "FXA-3002",
        }
    }

    /// Whether retrying the whole request might resolve the failure.
    ///
    /// Schema drift is deliberately excluded: the column will still be missing.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::SourceQuery { .. } | Self::Sql { .. }
        )
    }

    /// Whether the failure was caused by the caller's request rather than the store.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidScope { .. } | Self::InvalidRequest { .. } | Self::InvalidFilter { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for FxaError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for FxaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FxaError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
