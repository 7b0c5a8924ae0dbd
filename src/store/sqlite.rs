//! SQLite adapter for the history tables.
//!
//! Every fetch opens its own read-only connection, so the five category
//! fetches can run on separate threads with no shared handle. Before running
//! a query the adapter reads `PRAGMA table_info` and reports the first
//! referenced column the table lacks as [`StoreError::ColumnMissing`].
//! Column names match case-insensitively, as SQLite identifiers do, and row
//! keys come back in the category's declared spelling.
//!
//! Time columns may hold RFC 3339 text or zone-less `YYYY-MM-DD HH:MM:SS`.
//! Instant comparisons and the time ordering run on the column passed through
//! `strftime`, which maps both forms onto the canonical millisecond UTC text.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rusqlite::types::{Value as SqlParam, ValueRef};
use rusqlite::{Connection, OpenFlags, params_from_iter};
use serde_json::{Number, Value};

use crate::activity::query::{BoundQuery, Condition, SqlValue};
use crate::core::config::StoreConfig;
use crate::core::errors::{FxaError, Result};
use crate::store::{ActivityStore, RawRow, StoreError};

/// Read-only store over one SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Check that `path` is a readable database and remember it.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if !path.exists() {
            return Err(FxaError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
            ));
        }
        let store = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };
        let conn = store.connect()?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(store)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::open(
            &config.sqlite_path,
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl ActivityStore for SqliteStore {
    fn fetch(&self, query: &BoundQuery) -> std::result::Result<Vec<RawRow>, StoreError> {
        let failed = |error: rusqlite::Error| StoreError::Query {
            table: query.table.clone(),
            details: error.to_string(),
        };
        let conn = self.connect().map_err(failed)?;

        let columns = table_columns(&conn, &query.table).map_err(failed)?;
        if columns.is_empty() {
            return Err(StoreError::Query {
                table: query.table.clone(),
                details: format!("no such table: {}", query.table),
            });
        }
        if let Some(missing) = query
            .referenced_columns()
            .into_iter()
            .find(|column| !columns.contains(&column.to_ascii_lowercase()))
        {
            return Err(StoreError::ColumnMissing {
                table: query.table.clone(),
                column: missing.to_string(),
            });
        }

        let (sql, params) = build_select(query);
        let mut stmt = conn.prepare(&sql).map_err(failed)?;
        let spec = query.category.spec();
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| spec.canonical_column(name).unwrap_or(name).to_string())
            .collect();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut out = RawRow::new();
                for (index, name) in names.iter().enumerate() {
                    out.insert(name.clone(), json_value(row.get_ref(index)?));
                }
                Ok(out)
            })
            .map_err(failed)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(failed)?;
        Ok(rows)
    }
}

// ──────────────────── SQL generation ────────────────────

/// `strftime` pattern that reproduces [`crate::activity::query::format_instant`].
const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%fZ";

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn as_instant(quoted: &str) -> String {
    format!("strftime('{INSTANT_FORMAT}', {quoted})")
}

/// Lowercased column names; empty when the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    stmt.query_map([], |row| {
        row.get::<_, String>(1).map(|name| name.to_ascii_lowercase())
    })?
    .collect()
}

fn build_select(query: &BoundQuery) -> (String, Vec<SqlParam>) {
    let mut sql = format!("SELECT * FROM {}", quote_ident(&query.table));
    let mut params = Vec::new();
    let mut clauses = Vec::with_capacity(query.predicates.len());

    for predicate in &query.predicates {
        let column = quote_ident(predicate.column);
        let clause = match &predicate.condition {
            Condition::Eq(v) => compare(&column, "=", v, &mut params),
            Condition::Gt(v) => compare(&column, ">", v, &mut params),
            Condition::Ge(v) => compare(&column, ">=", v, &mut params),
            Condition::Lt(v) => compare(&column, "<", v, &mut params),
            Condition::Le(v) => compare(&column, "<=", v, &mut params),
            Condition::In(values) => {
                params.extend(values.iter().map(param));
                let marks = vec!["?"; values.len()].join(", ");
                format!("{column} IN ({marks})")
            }
            Condition::Like(pattern) => {
                params.push(SqlParam::Text(pattern.clone()));
                format!("{column} LIKE ? ESCAPE '\\'")
            }
        };
        clauses.push(clause);
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if let Some(order_by) = query.order_by {
        // Unparseable times become NULL and sort last.
        sql.push_str(&format!(" ORDER BY {} DESC", as_instant(&quote_ident(order_by))));
    }
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(SqlParam::Integer(clamp_i64(query.window.limit)));
    params.push(SqlParam::Integer(clamp_i64(query.window.offset)));
    (sql, params)
}

fn compare(column: &str, op: &str, value: &SqlValue, params: &mut Vec<SqlParam>) -> String {
    params.push(param(value));
    match value {
        SqlValue::Instant(_) => format!("{} {op} ?", as_instant(column)),
        _ => format!("{column} {op} ?"),
    }
}

fn param(value: &SqlValue) -> SqlParam {
    match value {
        SqlValue::Int(i) => SqlParam::Integer(*i),
        SqlValue::Real(f) => SqlParam::Real(*f),
        SqlValue::Text(s) | SqlValue::Instant(s) => SqlParam::Text(s.clone()),
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}
