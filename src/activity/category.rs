//! Source categories and their static column maps.
//!
//! Each of the five history stores evolved independently, so every category
//! carries its own table, column names, and time-column probe ladder. The
//! query builder, probe executor, and normalizer all read from these tables
//! rather than branching per category.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::activity::probe::ProbeCandidate;
use crate::activity::query::Column;

// ──────────────────── categories ────────────────────

/// One of the five backing history sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Fetching,
    Processing,
    Normalization,
    Refinement,
    Calculation,
}

impl SourceCategory {
    /// Fixed concatenation order used by the merge step.
    pub const ALL: [Self; 5] = [
        Self::Fetching,
        Self::Processing,
        Self::Normalization,
        Self::Refinement,
        Self::Calculation,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Normalization => "normalization",
            Self::Refinement => "refinement",
            Self::Calculation => "calculation",
        }
    }

    /// Static column map for this category.
    #[must_use]
    pub const fn spec(self) -> &'static SourceSpec {
        match self {
            Self::Fetching => &FETCHING,
            Self::Processing => &PROCESSING,
            Self::Normalization => &NORMALIZATION,
            Self::Refinement => &REFINEMENT,
            Self::Calculation => &CALCULATION,
        }
    }

    /// Mandatory categories abort the whole request on failure.
    #[must_use]
    pub const fn is_mandatory(self) -> bool {
        self.spec().mandatory
    }

    #[must_use]
    pub const fn activity_type(self) -> ActivityType {
        match self {
            Self::Fetching => ActivityType::Fetching,
            Self::Processing => ActivityType::Processing,
            Self::Normalization => ActivityType::Normalization,
            Self::Refinement => ActivityType::Refinement,
            Self::Calculation => ActivityType::Calculation,
        }
    }

    /// Position in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Fetching => 0,
            Self::Processing => 1,
            Self::Normalization => 2,
            Self::Refinement => 3,
            Self::Calculation => 4,
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown source category: {s}"))
    }
}

/// Closed event type tag carried by every emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Fetching,
    Processing,
    Normalization,
    Refinement,
    Calculation,
    FluxChange,
}

impl ActivityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Normalization => "normalization",
            Self::Refinement => "refinement",
            Self::Calculation => "calculation",
            Self::FluxChange => "flux_change",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────── column maps ────────────────────

/// Primary event-time column shared by every category.
pub const PRIMARY_TIME_COLUMN: &str = "timestamp";
/// Fallback event-time column on tables that predate `timestamp`.
pub const FALLBACK_TIME_COLUMN: &str = "started_at";
/// Owner id column shared by every category.
pub const OWNER_COLUMN: &str = "fluxID";

const PRIMARY_ONLY: &[ProbeCandidate] = &[ProbeCandidate::ordered(PRIMARY_TIME_COLUMN)];
const PRIMARY_FALLBACK_UNORDERED: &[ProbeCandidate] = &[
    ProbeCandidate::ordered(PRIMARY_TIME_COLUMN),
    ProbeCandidate::ordered(FALLBACK_TIME_COLUMN),
    ProbeCandidate::UNORDERED,
];
const PRIMARY_UNORDERED: &[ProbeCandidate] = &[
    ProbeCandidate::ordered(PRIMARY_TIME_COLUMN),
    ProbeCandidate::UNORDERED,
];

/// Column layout of one category's backing table.
#[derive(Debug)]
pub struct SourceSpec {
    pub category: SourceCategory,
    pub default_table: &'static str,
    pub id_column: &'static str,
    pub owner_column: &'static str,
    pub status_column: &'static str,
    pub progress_column: &'static str,
    pub duration_column: &'static str,
    pub error_column: &'static str,
    pub completed_column: &'static str,
    pub completed_fallback: &'static str,
    /// Native item-count column.
    pub count_column: &'static str,
    /// Key the item count is exposed under in the event payload.
    pub count_key: &'static str,
    /// Time-column candidates, tried in order.
    pub ladder: &'static [ProbeCandidate],
    pub mandatory: bool,
}

impl SourceSpec {
    /// Map a logical or native field name onto this category's columns.
    ///
    /// Returns `None` for fields this category does not declare.
    #[must_use]
    pub fn resolve_field(&self, field: &str) -> Option<Column> {
        match field {
            "timestamp" => Some(Column::EventTime),
            "status" => Some(Column::Native(self.status_column)),
            "progress" => Some(Column::Native(self.progress_column)),
            "duration" => Some(Column::Native(self.duration_column)),
            "completedAt" => Some(Column::Native(self.completed_column)),
            "errorMessage" => Some(Column::Native(self.error_column)),
            other => self
                .native_columns()
                .into_iter()
                .find(|column| *column == other)
                .map(Column::Native),
        }
    }

    /// Every non-time column this category declares.
    #[must_use]
    pub const fn native_columns(&self) -> [&'static str; 9] {
        [
            self.id_column,
            self.owner_column,
            self.status_column,
            self.progress_column,
            self.duration_column,
            self.error_column,
            self.completed_column,
            self.completed_fallback,
            self.count_column,
        ]
    }

    /// Declared spelling of `name`, matched ASCII case-insensitively the way
    /// SQL identifiers are. Covers native and time columns.
    #[must_use]
    pub fn canonical_column(&self, name: &str) -> Option<&'static str> {
        self.native_columns()
            .into_iter()
            .chain([PRIMARY_TIME_COLUMN, FALLBACK_TIME_COLUMN])
            .find(|column| column.eq_ignore_ascii_case(name))
    }
}

static FETCHING: SourceSpec = SourceSpec {
    category: SourceCategory::Fetching,
    default_table: "fetchinghistory",
    id_column: "fetchingID",
    owner_column: OWNER_COLUMN,
    status_column: "status",
    progress_column: "progress",
    duration_column: "fetchingTimeInSeconds",
    error_column: "errorMessage",
    completed_column: "completedAt",
    completed_fallback: "completed_at",
    count_column: "numberOfContent",
    count_key: "numberOfContent",
    ladder: PRIMARY_ONLY,
    mandatory: true,
};

static PROCESSING: SourceSpec = SourceSpec {
    category: SourceCategory::Processing,
    default_table: "processinghistory",
    id_column: "processingID",
    owner_column: OWNER_COLUMN,
    status_column: "status",
    progress_column: "progress",
    duration_column: "processingTimeInSeconds",
    error_column: "errorMessage",
    completed_column: "completedAt",
    completed_fallback: "completed_at",
    count_column: "numberOfProcessingContent",
    count_key: "numberOfContent",
    ladder: PRIMARY_ONLY,
    mandatory: true,
};

static NORMALIZATION: SourceSpec = SourceSpec {
    category: SourceCategory::Normalization,
    default_table: "normalization_history",
    id_column: "normalizationID",
    owner_column: OWNER_COLUMN,
    status_column: "status",
    progress_column: "progress",
    duration_column: "normalizationTimeInSeconds",
    error_column: "errorMessage",
    completed_column: "completedAt",
    completed_fallback: "completed_at",
    count_column: "numberOfItems",
    count_key: "numberOfItems",
    ladder: PRIMARY_FALLBACK_UNORDERED,
    mandatory: false,
};

static REFINEMENT: SourceSpec = SourceSpec {
    category: SourceCategory::Refinement,
    default_table: "refinement_history",
    id_column: "refinementID",
    owner_column: OWNER_COLUMN,
    status_column: "status",
    progress_column: "progress",
    duration_column: "refinementTimeInSeconds",
    error_column: "errorMessage",
    completed_column: "completedAt",
    completed_fallback: "completed_at",
    count_column: "numberOfItems",
    count_key: "numberOfItems",
    ladder: PRIMARY_UNORDERED,
    mandatory: false,
};

static CALCULATION: SourceSpec = SourceSpec {
    category: SourceCategory::Calculation,
    default_table: "calculation_history",
    id_column: "calculationID",
    owner_column: OWNER_COLUMN,
    status_column: "status",
    progress_column: "progress",
    duration_column: "calculationTimeInSeconds",
    error_column: "errorMessage",
    completed_column: "completedAt",
    completed_fallback: "completed_at",
    count_column: "numberOfItems",
    count_key: "numberOfItems",
    ladder: PRIMARY_FALLBACK_UNORDERED,
    mandatory: false,
};
