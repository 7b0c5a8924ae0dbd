//! Raw row → [`ActivityEvent`] normalization.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::activity::category::{
    ActivityType, FALLBACK_TIME_COLUMN, PRIMARY_TIME_COLUMN, SourceCategory,
};
use crate::activity::query::{format_instant, parse_naive_timestamp};
use crate::store::RawRow;

/// One entry of the merged activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// `"<category>-<native id>"`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
}

/// Normalize one category's rows, skipping rows with no id or no usable time.
#[must_use]
pub fn normalize_rows(category: SourceCategory, rows: Vec<RawRow>) -> Vec<ActivityEvent> {
    let raw_count = rows.len();
    let events: Vec<ActivityEvent> = rows
        .into_iter()
        .filter_map(|row| normalize_row(category, &row))
        .collect();
    if events.len() < raw_count {
        tracing::warn!(
            %category,
            skipped = raw_count - events.len(),
            "rows without an id or timestamp were skipped"
        );
    }
    events
}

fn normalize_row(category: SourceCategory, row: &RawRow) -> Option<ActivityEvent> {
    let spec = category.spec();
    let Some(native_id) = row.get(spec.id_column).and_then(id_text) else {
        tracing::debug!(%category, "row has no native id");
        return None;
    };
    let Some(timestamp) = [PRIMARY_TIME_COLUMN, FALLBACK_TIME_COLUMN]
        .iter()
        .find_map(|column| row.get(*column).and_then(value_instant))
    else {
        tracing::debug!(%category, id = %native_id, "row has no resolvable timestamp");
        return None;
    };

    let field = |column: &str| row.get(column).cloned().unwrap_or(Value::Null);
    let completed = row
        .get(spec.completed_column)
        .filter(|v| !v.is_null())
        .or_else(|| row.get(spec.completed_fallback))
        .cloned()
        .unwrap_or(Value::Null);

    let mut data = Map::new();
    data.insert(spec.id_column.to_string(), field(spec.id_column));
    data.insert("fluxID".to_string(), field(spec.owner_column));
    data.insert("status".to_string(), field(spec.status_column));
    data.insert(
        "timestamp".to_string(),
        Value::String(format_instant(timestamp)),
    );
    data.insert("completedAt".to_string(), completed);
    data.insert(spec.duration_column.to_string(), field(spec.duration_column));
    data.insert("progress".to_string(), field(spec.progress_column));
    data.insert(spec.count_key.to_string(), field(spec.count_column));
    data.insert("errorMessage".to_string(), field(spec.error_column));

    Some(ActivityEvent {
        id: format!("{}-{native_id}", category.as_str()),
        kind: category.activity_type(),
        timestamp,
        data,
    })
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Parse a stored instant: RFC 3339, or zone-less text read as UTC.
#[must_use]
pub fn value_instant(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_timestamp(raw))
}

mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::activity::query::format_instant;

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_instant(*at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
