//! Per-category query descriptors and the operator → predicate table.
//!
//! A [`SourceQuery`] is store-agnostic: event-time predicates stay symbolic
//! ([`Column::EventTime`]) until the probe executor binds the query to one
//! ladder candidate, producing a [`BoundQuery`] the store can execute.

#![allow(missing_docs)]

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

use crate::activity::category::{SourceCategory, SourceSpec};
use crate::activity::probe::ProbeCandidate;
use crate::core::errors::{FxaError, Result};
use crate::filters::condition::{FilterOperator, FilterValue, Scalar, ScopedFilter};

// ──────────────────── scope & window ────────────────────

/// Which owner's history a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Owner(i64),
}

impl Scope {
    /// Parse `"all"` or a numeric owner id. Anything else is `InvalidScope`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed == "all" {
            return Ok(Self::All);
        }
        trimmed
            .parse::<i64>()
            .map(Self::Owner)
            .map_err(|_| FxaError::InvalidScope {
                scope: raw.to_string(),
            })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Owner(id) => write!(f, "{id}"),
        }
    }
}

/// Row window for one category: one row past the page to detect `hasMore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    /// `offset = (page - 1) * page_size`, `limit = page_size + 1`.
    #[must_use]
    pub fn for_page(page: u32, page_size: u32) -> Self {
        Self {
            offset: u64::from(page.saturating_sub(1)) * u64::from(page_size),
            limit: u64::from(page_size) + 1,
        }
    }
}

// ──────────────────── predicates ────────────────────

/// Column reference before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Whatever time column the active probe candidate orders by.
    EventTime,
    Native(&'static str),
}

impl Column {
    /// Resolve against a candidate's time column; `None` when it cannot bind.
    #[must_use]
    pub const fn bind(self, time_column: Option<&'static str>) -> Option<&'static str> {
        match self {
            Self::EventTime => time_column,
            Self::Native(name) => Some(name),
        }
    }
}

/// Parameter value passed to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Real(f64),
    Text(String),
    /// Canonical UTC instant (see [`format_instant`]).
    ///
    /// Stores compare it against the column's canonicalized value, not its raw
    /// text, because history rows may hold zone-less timestamps.
    Instant(String),
}

impl From<&Scalar> for SqlValue {
    fn from(value: &Scalar) -> Self {
        match value {
            Scalar::Bool(b) => Self::Int(i64::from(*b)),
            Scalar::Int(i) => Self::Int(*i),
            Scalar::Float(f) => Self::Real(*f),
            Scalar::Text(s) => Self::Text(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(SqlValue),
    In(Vec<SqlValue>),
    /// Case-insensitive `LIKE` with `\` as the escape character.
    Like(String),
    Gt(SqlValue),
    Ge(SqlValue),
    Lt(SqlValue),
    Le(SqlValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate<C = Column> {
    pub column: C,
    pub condition: Condition,
}

impl<C> Predicate<C> {
    pub const fn new(column: C, condition: Condition) -> Self {
        Self { column, condition }
    }
}

// ──────────────────── query descriptors ────────────────────

/// Store-agnostic query for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub category: SourceCategory,
    pub table: String,
    pub scope: Scope,
    pub predicates: Vec<Predicate>,
    pub window: Window,
}

impl SourceQuery {
    /// Start a query; an owner scope adds the owner-id equality predicate.
    pub fn new(
        category: SourceCategory,
        table: impl Into<String>,
        scope: Scope,
        window: Window,
    ) -> Self {
        let query = Self {
            category,
            table: table.into(),
            scope,
            predicates: Vec::new(),
            window,
        };
        match scope {
            Scope::All => query,
            Scope::Owner(id) => query.with_predicate(Predicate::new(
                Column::Native(category.spec().owner_column),
                Condition::Eq(SqlValue::Int(id)),
            )),
        }
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Translate one filter into predicates on this category's columns.
    pub fn with_filter(self, filter: &ScopedFilter) -> Result<Self> {
        let predicates = translate(self.category.spec(), filter)?;
        Ok(predicates.into_iter().fold(self, Self::with_predicate))
    }

    /// Bind symbolic columns to one ladder candidate.
    #[must_use]
    pub fn bind(&self, candidate: ProbeCandidate) -> BoundQuery {
        let mut predicates = Vec::with_capacity(self.predicates.len());
        let mut dropped_predicates = 0;
        for predicate in &self.predicates {
            match predicate.column.bind(candidate.time_column) {
                Some(column) => {
                    predicates.push(Predicate::new(column, predicate.condition.clone()));
                }
                None => dropped_predicates += 1,
            }
        }
        BoundQuery {
            category: self.category,
            table: self.table.clone(),
            predicates,
            order_by: candidate.time_column,
            window: self.window,
            dropped_predicates,
        }
    }
}

/// A query with every column resolved, ready for a store.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub category: SourceCategory,
    pub table: String,
    pub predicates: Vec<Predicate<&'static str>>,
    /// Descending sort column; `None` means unordered.
    pub order_by: Option<&'static str>,
    pub window: Window,
    /// Event-time predicates that could not bind to this candidate.
    pub dropped_predicates: usize,
}

impl BoundQuery {
    /// Columns the query touches, sort column first, without duplicates.
    #[must_use]
    pub fn referenced_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = Vec::new();
        let all = self
            .order_by
            .into_iter()
            .chain(self.predicates.iter().map(|p| p.column));
        for column in all {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }
}

// ──────────────────── operator table ────────────────────

struct ProgressBucket {
    label: &'static str,
    min: i64,
    max: i64,
}

/// Inclusive on both ends.
const PROGRESS_BUCKETS: &[ProgressBucket] = &[
    ProgressBucket { label: "0% - 25%", min: 0, max: 25 },
    ProgressBucket { label: "26% - 50%", min: 26, max: 50 },
    ProgressBucket { label: "51% - 75%", min: 51, max: 75 },
    ProgressBucket { label: "76% - 100%", min: 76, max: 100 },
];

struct DurationBucket {
    label: &'static str,
    min_secs: i64,
    min_inclusive: bool,
    max_secs: Option<i64>,
}

/// Upper bounds are inclusive; only the first bucket includes its lower bound.
const DURATION_BUCKETS: &[DurationBucket] = &[
    DurationBucket { label: "0-1 min", min_secs: 0, min_inclusive: true, max_secs: Some(60) },
    DurationBucket { label: "1-2 min", min_secs: 60, min_inclusive: false, max_secs: Some(120) },
    DurationBucket { label: "2-5 min", min_secs: 120, min_inclusive: false, max_secs: Some(300) },
    DurationBucket { label: "5-10 min", min_secs: 300, min_inclusive: false, max_secs: Some(600) },
    DurationBucket { label: "10-20 min", min_secs: 600, min_inclusive: false, max_secs: Some(1200) },
    DurationBucket { label: "20+ min", min_secs: 1200, min_inclusive: false, max_secs: None },
];

#[derive(Clone, Copy)]
enum DayEdge {
    Start,
    End,
}

fn translate(spec: &SourceSpec, filter: &ScopedFilter) -> Result<Vec<Predicate>> {
    let column = match filter.operator {
        FilterOperator::ProgressRanges => Column::Native(spec.progress_column),
        FilterOperator::DurationRanges => Column::Native(spec.duration_column),
        FilterOperator::ErrorContains => Column::Native(spec.error_column),
        _ => match spec.resolve_field(&filter.field) {
            Some(column) => column,
            None => {
                tracing::debug!(
                    category = %spec.category,
                    field = %filter.field,
                    "ignoring filter on undeclared field"
                );
                return Ok(Vec::new());
            }
        },
    };

    let value = &filter.value;
    let one = |condition: Condition| -> Result<Vec<Predicate>> {
        Ok(vec![Predicate::new(column, condition)])
    };
    let none = || -> Result<Vec<Predicate>> { Ok(Vec::new()) };

    match &filter.operator {
        FilterOperator::Equals | FilterOperator::In => match value.scalars() {
            [] => none(),
            [single] => one(Condition::Eq(single.into())),
            many => one(Condition::In(many.iter().map(SqlValue::from).collect())),
        },
        FilterOperator::Contains => like(column, value, |v| format!("%{v}%")),
        FilterOperator::StartsWith => like(column, value, |v| format!("{v}%")),
        FilterOperator::EndsWith => like(column, value, |v| format!("%{v}")),
        FilterOperator::ErrorContains => like(column, value, |v| format!("%{v}%")),
        FilterOperator::GreaterThan => match value.scalars().first() {
            Some(v) => one(Condition::Gt(v.into())),
            None => none(),
        },
        FilterOperator::LessThan => match value.scalars().first() {
            Some(v) => one(Condition::Lt(v.into())),
            None => none(),
        },
        FilterOperator::Before => match value.first_text() {
            Some(raw) => one(Condition::Lt(instant(&filter.field, &raw, DayEdge::Start)?)),
            None => none(),
        },
        FilterOperator::After => match value.first_text() {
            Some(raw) => one(Condition::Gt(instant(&filter.field, &raw, DayEdge::End)?)),
            None => none(),
        },
        FilterOperator::DateRange => match value {
            FilterValue::Range(range) => Ok(vec![
                Predicate::new(
                    column,
                    Condition::Ge(instant(&filter.field, &range.start, DayEdge::Start)?),
                ),
                Predicate::new(
                    column,
                    Condition::Le(instant(&filter.field, &range.end, DayEdge::End)?),
                ),
            ]),
            _ => none(),
        },
        FilterOperator::CustomDateRange => match value {
            FilterValue::Bounds(bounds) => {
                let mut out = Vec::new();
                if let Some(after) = &bounds.after {
                    out.push(Predicate::new(
                        column,
                        Condition::Ge(instant(&filter.field, after, DayEdge::Start)?),
                    ));
                }
                if let Some(before) = &bounds.before {
                    out.push(Predicate::new(
                        column,
                        Condition::Le(instant(&filter.field, before, DayEdge::End)?),
                    ));
                }
                Ok(out)
            }
            _ => none(),
        },
        FilterOperator::ProgressRanges => {
            let Some(label) = value.first_text() else {
                return none();
            };
            match PROGRESS_BUCKETS.iter().find(|b| b.label == label) {
                Some(bucket) => Ok(vec![
                    Predicate::new(column, Condition::Ge(SqlValue::Int(bucket.min))),
                    Predicate::new(column, Condition::Le(SqlValue::Int(bucket.max))),
                ]),
                None => {
                    tracing::debug!(%label, "unknown progress bucket");
                    none()
                }
            }
        }
        FilterOperator::DurationRanges => {
            let Some(label) = value.first_text() else {
                return none();
            };
            let Some(bucket) = DURATION_BUCKETS.iter().find(|b| b.label == label) else {
                tracing::debug!(%label, "unknown duration bucket");
                return none();
            };
            let min = SqlValue::Int(bucket.min_secs);
            let mut out = vec![Predicate::new(
                column,
                if bucket.min_inclusive {
                    Condition::Ge(min)
                } else {
                    Condition::Gt(min)
                },
            )];
            if let Some(max) = bucket.max_secs {
                out.push(Predicate::new(column, Condition::Le(SqlValue::Int(max))));
            }
            Ok(out)
        }
        FilterOperator::Unsupported(raw) => {
            tracing::debug!(operator = %raw, field = %filter.field, "ignoring unsupported operator");
            none()
        }
    }
}

fn like(
    column: Column,
    value: &FilterValue,
    pattern: impl Fn(&str) -> String,
) -> Result<Vec<Predicate>> {
    Ok(value
        .first_text()
        .map(|raw| {
            let escaped = escape_like(&raw);
            vec![Predicate::new(column, Condition::Like(pattern(&escaped)))]
        })
        .unwrap_or_default())
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Normalize a filter instant to RFC 3339 millisecond UTC.
///
/// Date-only values are padded to the start or end of that day.
fn instant(field: &str, raw: &str, edge: DayEdge) -> Result<SqlValue> {
    parse_instant(raw, edge)
        .map(|at| SqlValue::Instant(format_instant(at)))
        .ok_or_else(|| FxaError::InvalidFilter {
            field: field.to_string(),
            details: format!("unparseable instant {raw:?}"),
        })
}

fn parse_instant(raw: &str, edge: DayEdge) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Some(at) = parse_naive_timestamp(raw) {
        return Some(at);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = match edge {
        DayEdge::Start => NaiveTime::from_hms_opt(0, 0, 0)?,
        DayEdge::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?,
    };
    Some(date.and_time(time).and_utc())
}

/// Zone-less `YYYY-MM-DD HH:MM:SS[.fff]` (or with `T`), read as UTC.
pub(crate) fn parse_naive_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Canonical text form for stored and compared instants.
#[must_use]
pub fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
