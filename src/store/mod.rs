//! Backing-store seam.
//!
//! The engine only ever reads through [`ActivityStore`]. Adapters must report
//! a missing column as the typed [`StoreError::ColumnMissing`] so the probe
//! ladder never depends on driver error phrasing.

#![allow(missing_docs)]

#[cfg(feature = "sqlite")]
pub mod sqlite;

use thiserror::Error;

use crate::activity::query::BoundQuery;

/// One raw row keyed by column name.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// Failures a store adapter can report for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("column {column} does not exist on {table}")]
    ColumnMissing { table: String, column: String },

    #[error("query on {table} failed: {details}")]
    Query { table: String, details: String },
}

/// Read-only access to the five history tables.
pub trait ActivityStore: Send + Sync {
    /// Execute one bound query and return at most `query.window.limit` rows.
    fn fetch(&self, query: &BoundQuery) -> std::result::Result<Vec<RawRow>, StoreError>;
}

impl<S: ActivityStore + ?Sized> ActivityStore for &S {
    fn fetch(&self, query: &BoundQuery) -> std::result::Result<Vec<RawRow>, StoreError> {
        (**self).fetch(query)
    }
}

impl<S: ActivityStore + ?Sized> ActivityStore for std::sync::Arc<S> {
    fn fetch(&self, query: &BoundQuery) -> std::result::Result<Vec<RawRow>, StoreError> {
        (**self).fetch(query)
    }
}
