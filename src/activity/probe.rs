//! Capability-probe executor for schema drift.
//!
//! Each category declares an ordered ladder of [`ProbeCandidate`]s. The
//! executor binds the query to each candidate in turn and only advances when
//! the store reports that the candidate's own time column is missing.

#![allow(missing_docs)]

use crate::activity::query::SourceQuery;
use crate::core::errors::{FxaError, Result};
use crate::store::{ActivityStore, RawRow, StoreError};

/// One rung of a category's ladder: the column to order (and time-filter) by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeCandidate {
    pub time_column: Option<&'static str>,
}

impl ProbeCandidate {
    /// No ordering and no event-time predicates.
    pub const UNORDERED: Self = Self { time_column: None };

    pub const fn ordered(column: &'static str) -> Self {
        Self {
            time_column: Some(column),
        }
    }
}

/// Rows from the first candidate the store accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub rows: Vec<RawRow>,
    pub candidate: ProbeCandidate,
    /// Number of store calls made, including the successful one.
    pub attempts: usize,
}

impl ProbeOutcome {
    /// Whether a fallback candidate had to be used.
    #[must_use]
    pub const fn degraded(&self) -> bool {
        self.attempts > 1
    }
}

/// Walk the ladder until one candidate succeeds.
///
/// A missing non-time column, or an exhausted ladder, is `SchemaDrift`.
/// Every other store failure is `SourceQuery` and is not retried.
pub fn execute<S>(store: &S, query: &SourceQuery, ladder: &[ProbeCandidate]) -> Result<ProbeOutcome>
where
    S: ActivityStore + ?Sized,
{
    let category = query.category;
    let mut last_missing = None;

    for (index, candidate) in ladder.iter().copied().enumerate() {
        let attempt = index + 1;
        let bound = query.bind(candidate);
        if bound.dropped_predicates > 0 {
            tracing::warn!(
                %category,
                attempt,
                dropped = bound.dropped_predicates,
                "no time column on this rung, dropping event-time filters"
            );
        }

        match store.fetch(&bound) {
            Ok(rows) => {
                tracing::debug!(%category, attempt, rows = rows.len(), "category fetched");
                return Ok(ProbeOutcome {
                    rows,
                    candidate,
                    attempts: attempt,
                });
            }
            Err(StoreError::ColumnMissing { column, .. })
                if candidate.time_column == Some(column.as_str()) =>
            {
                tracing::warn!(
                    %category,
                    attempt,
                    %column,
                    "time column missing, trying next candidate"
                );
                last_missing = Some(column);
            }
            Err(StoreError::ColumnMissing { column, .. }) => {
                return Err(FxaError::SchemaDrift { category, column });
            }
            Err(StoreError::Query { details, .. }) => {
                return Err(FxaError::SourceQuery { category, details });
            }
        }
    }

    Err(FxaError::SchemaDrift {
        category,
        column: last_missing.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::category::SourceCategory;
    use crate::activity::query::{BoundQuery, Column, Condition, Predicate, Scope, SqlValue, Window};
    use parking_lot::Mutex;

    /// Table with a fixed column set; records every order-by it was asked for.
    struct ColumnsStore {
        columns: &'static [&'static str],
        calls: Mutex<Vec<Option<&'static str>>>,
        fail_with: Option<StoreError>,
    }

    impl ColumnsStore {
        fn new(columns: &'static [&'static str]) -> Self {
            Self {
                columns,
                calls: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }
    }

    impl ActivityStore for ColumnsStore {
        fn fetch(&self, query: &BoundQuery) -> std::result::Result<Vec<RawRow>, StoreError> {
            self.calls.lock().push(query.order_by);
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            if let Some(missing) = query
                .referenced_columns()
                .into_iter()
                .find(|c| !self.columns.contains(c))
            {
                return Err(StoreError::ColumnMissing {
                    table: query.table.clone(),
                    column: missing.to_string(),
                });
            }
            Ok(vec![RawRow::new()])
        }
    }

    fn query(category: SourceCategory) -> SourceQuery {
        SourceQuery::new(category, "t", Scope::All, Window::for_page(1, 10))
    }

    #[test]
    fn primary_column_present_uses_one_attempt() {
        let store = ColumnsStore::new(&["timestamp", "started_at"]);
        let category = SourceCategory::Normalization;
        let outcome = execute(&store, &query(category), category.spec().ladder).unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.degraded());
        assert_eq!(*store.calls.lock(), vec![Some("timestamp")]);
    }

    #[test]
    fn falls_back_to_started_at_then_unordered() {
        let category = SourceCategory::Calculation;

        let store = ColumnsStore::new(&["started_at"]);
        let outcome = execute(&store, &query(category), category.spec().ladder).unwrap();
        assert_eq!(outcome.candidate, ProbeCandidate::ordered("started_at"));
        assert_eq!(*store.calls.lock(), vec![Some("timestamp"), Some("started_at")]);

        let bare = ColumnsStore::new(&[]);
        let outcome = execute(&bare, &query(category), category.spec().ladder).unwrap();
        assert_eq!(outcome.candidate, ProbeCandidate::UNORDERED);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(
            *bare.calls.lock(),
            vec![Some("timestamp"), Some("started_at"), None]
        );
    }

    #[test]
    fn refinement_skips_straight_to_unordered() {
        let category = SourceCategory::Refinement;
        let store = ColumnsStore::new(&["started_at"]);
        let outcome = execute(&store, &query(category), category.spec().ladder).unwrap();
        assert_eq!(outcome.candidate, ProbeCandidate::UNORDERED);
        assert_eq!(*store.calls.lock(), vec![Some("timestamp"), None]);
    }

    #[test]
    fn mandatory_category_does_not_degrade() {
        let category = SourceCategory::Fetching;
        let store = ColumnsStore::new(&["started_at"]);
        let err = execute(&store, &query(category), category.spec().ladder).unwrap_err();
        match err {
            FxaError::SchemaDrift { category, column } => {
                assert_eq!(category, SourceCategory::Fetching);
                assert_eq!(column, "timestamp");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.calls.lock().len(), 1);
    }

    #[test]
    fn missing_non_time_column_is_schema_drift_without_retry() {
        let category = SourceCategory::Normalization;
        let q = query(category).with_predicate(Predicate::new(
            Column::Native("progress"),
            Condition::Ge(SqlValue::Int(26)),
        ));
        let store = ColumnsStore::new(&["timestamp"]);
        let err = execute(&store, &q, category.spec().ladder).unwrap_err();
        assert!(matches!(err, FxaError::SchemaDrift { ref column, .. } if column == "progress"));
        assert_eq!(store.calls.lock().len(), 1);
    }

    #[test]
    fn other_store_errors_surface_without_retry() {
        let category = SourceCategory::Calculation;
        let mut store = ColumnsStore::new(&[]);
        store.fail_with = Some(StoreError::Query {
            table: "t".into(),
            details: "permission denied".into(),
        });
        let err = execute(&store, &query(category), category.spec().ladder).unwrap_err();
        assert!(matches!(err, FxaError::SourceQuery { ref details, .. } if details.contains("permission")));
        assert_eq!(store.calls.lock().len(), 1);
    }
}
