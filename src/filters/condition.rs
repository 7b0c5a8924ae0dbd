//! Filter condition model.
//!
//! On the wire a filter is one flat object `{field, operator, value, category?}`
//! where `category: "global"` marks a filter that must be fanned out through
//! the global mapping table. In memory that sentinel becomes a sum type.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::activity::category::SourceCategory;

// ──────────────────── operators ────────────────────

/// Fixed operator vocabulary. Anything else is kept as `Unsupported` and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    Equals,
    In,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Before,
    After,
    DateRange,
    CustomDateRange,
    ProgressRanges,
    DurationRanges,
    ErrorContains,
    Unsupported(String),
}

impl FilterOperator {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::In => "in",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::Before => "before",
            Self::After => "after",
            Self::DateRange => "date_range",
            Self::CustomDateRange => "custom_date_range",
            Self::ProgressRanges => "progress_ranges",
            Self::DurationRanges => "duration_ranges",
            Self::ErrorContains => "error_contains",
            Self::Unsupported(raw) => raw,
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "equals" => Self::Equals,
            "in" => Self::In,
            "contains" => Self::Contains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "greaterThan" => Self::GreaterThan,
            "lessThan" => Self::LessThan,
            "before" => Self::Before,
            "after" => Self::After,
            "date_range" => Self::DateRange,
            "custom_date_range" => Self::CustomDateRange,
            "progress_ranges" => Self::ProgressRanges,
            "duration_ranges" => Self::DurationRanges,
            "error_contains" => Self::ErrorContains,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for FilterOperator {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<FilterOperator> for String {
    fn from(value: FilterOperator) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────── values ────────────────────

/// A single JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Textual form, as a string comparison would see it.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// `{start, end}` range; both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// `{after?, before?}` bounds; date-only values are padded to whole days.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

/// Operator-dependent filter value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    #[default]
    Null,
    Scalar(Scalar),
    List(Vec<Scalar>),
    Range(DateRange),
    Bounds(DateBounds),
}

impl FilterValue {
    /// Scalars carried by the value; a lone scalar counts as a one-element list.
    #[must_use]
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            Self::Scalar(s) => std::slice::from_ref(s),
            Self::List(items) => items,
            Self::Null | Self::Range(_) | Self::Bounds(_) => &[],
        }
    }

    /// First scalar as text.
    #[must_use]
    pub fn first_text(&self) -> Option<String> {
        self.scalars().first().map(Scalar::to_text)
    }

    /// List of text values, e.g. `["Failed", "Cancelled"]`.
    pub fn texts(items: &[&str]) -> Self {
        Self::List(
            items
                .iter()
                .map(|item| Scalar::Text((*item).to_string()))
                .collect(),
        )
    }
}

// ──────────────────── filter categories ────────────────────

/// Categories known to the filter panel. Only five of these are activity sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCategory {
    Flux,
    Fetching,
    Processing,
    Content,
    Workflow,
    Normalization,
    Refinement,
    Calculation,
}

impl FilterCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flux => "flux",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Content => "content",
            Self::Workflow => "workflow",
            Self::Normalization => "normalization",
            Self::Refinement => "refinement",
            Self::Calculation => "calculation",
        }
    }

    /// The activity source this category queries, if any.
    #[must_use]
    pub const fn source(self) -> Option<SourceCategory> {
        match self {
            Self::Fetching => Some(SourceCategory::Fetching),
            Self::Processing => Some(SourceCategory::Processing),
            Self::Normalization => Some(SourceCategory::Normalization),
            Self::Refinement => Some(SourceCategory::Refinement),
            Self::Calculation => Some(SourceCategory::Calculation),
            Self::Flux | Self::Content | Self::Workflow => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        [
            Self::Flux,
            Self::Fetching,
            Self::Processing,
            Self::Content,
            Self::Workflow,
            Self::Normalization,
            Self::Refinement,
            Self::Calculation,
        ]
        .into_iter()
        .find(|category| category.as_str() == raw)
    }
}

impl From<SourceCategory> for FilterCategory {
    fn from(value: SourceCategory) -> Self {
        match value {
            SourceCategory::Fetching => Self::Fetching,
            SourceCategory::Processing => Self::Processing,
            SourceCategory::Normalization => Self::Normalization,
            SourceCategory::Refinement => Self::Refinement,
            SourceCategory::Calculation => Self::Calculation,
        }
    }
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────── conditions ────────────────────

/// A logical filter to be fanned out to every category its field maps to.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

/// A filter bound to one category, or to every source when `category` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
    pub category: Option<FilterCategory>,
}

impl ScopedFilter {
    /// Whether this filter should be applied to `source`.
    #[must_use]
    pub fn applies_to(&self, source: SourceCategory) -> bool {
        self.category
            .is_none_or(|category| category.source() == Some(source))
    }
}

/// Caller-supplied predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireFilter", into = "WireFilter")]
pub enum FilterCondition {
    Global(GlobalFilter),
    Scoped(ScopedFilter),
}

impl FilterCondition {
    pub fn global(field: &str, operator: FilterOperator, value: FilterValue) -> Self {
        Self::Global(GlobalFilter {
            field: field.to_string(),
            operator,
            value,
        })
    }

    pub fn scoped(
        field: &str,
        operator: FilterOperator,
        value: FilterValue,
        category: Option<FilterCategory>,
    ) -> Self {
        Self::Scoped(ScopedFilter {
            field: field.to_string(),
            operator,
            value,
            category,
        })
    }

    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Global(filter) => &filter.field,
            Self::Scoped(filter) => &filter.field,
        }
    }
}

const GLOBAL_SENTINEL: &str = "global";

#[derive(Serialize, Deserialize)]
struct WireFilter {
    field: String,
    operator: FilterOperator,
    #[serde(default)]
    value: FilterValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

impl TryFrom<WireFilter> for FilterCondition {
    type Error = String;

    fn try_from(wire: WireFilter) -> Result<Self, Self::Error> {
        let WireFilter {
            field,
            operator,
            value,
            category,
        } = wire;
        match category.as_deref() {
            Some(GLOBAL_SENTINEL) => Ok(Self::Global(GlobalFilter {
                field,
                operator,
                value,
            })),
            None => Ok(Self::Scoped(ScopedFilter {
                field,
                operator,
                value,
                category: None,
            })),
            Some(raw) => {
                let category = FilterCategory::parse(raw)
                    .ok_or_else(|| format!("unknown filter category: {raw}"))?;
                Ok(Self::Scoped(ScopedFilter {
                    field,
                    operator,
                    value,
                    category: Some(category),
                }))
            }
        }
    }
}

impl From<FilterCondition> for WireFilter {
    fn from(condition: FilterCondition) -> Self {
        match condition {
            FilterCondition::Global(filter) => Self {
                field: filter.field,
                operator: filter.operator,
                value: filter.value,
                category: Some(GLOBAL_SENTINEL.to_string()),
            },
            FilterCondition::Scoped(filter) => Self {
                field: filter.field,
                operator: filter.operator,
                value: filter.value,
                category: filter.category.map(|c| c.as_str().to_string()),
            },
        }
    }
}
