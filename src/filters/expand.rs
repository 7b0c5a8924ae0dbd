//! Global filter expansion.
//!
//! A global filter names one logical field; [`GLOBAL_FIELD_MAPPINGS`] says
//! which categories support that field and what each one calls it. Expansion
//! copies operator and value, rewrites the field, and silently skips every
//! category the mapping does not list.
//!
//! `type` is the one global field with no mapping row: it selects whole
//! categories after the merge, so [`expand_all`] passes it through unscoped.

#![allow(missing_docs)]

use crate::activity::merge::TYPE_FIELD;
use crate::filters::condition::{FilterCategory, FilterCondition, GlobalFilter, ScopedFilter};

use FilterCategory::{
    Calculation, Content, Fetching, Flux, Normalization, Processing, Refinement, Workflow,
};

/// Per-category column names for one global field.
#[derive(Debug)]
pub struct FieldMapping {
    pub global_field: &'static str,
    pub mappings: &'static [(FilterCategory, &'static str)],
}

/// Static mapping table driving [`expand`].
pub static GLOBAL_FIELD_MAPPINGS: &[FieldMapping] = &[
    FieldMapping {
        global_field: "status",
        mappings: &[
            (Flux, "fluxState"),
            (Fetching, "status"),
            (Processing, "status"),
            (Content, "status"),
            (Workflow, "status"),
            (Normalization, "status"),
            (Refinement, "status"),
            (Calculation, "status"),
        ],
    },
    FieldMapping {
        global_field: "dateRange",
        mappings: &[
            (Flux, "createdAt"),
            (Fetching, "timestamp"),
            (Processing, "timestamp"),
            (Content, "createdAt"),
            (Workflow, "started_at"),
            (Normalization, "timestamp"),
            (Refinement, "timestamp"),
            (Calculation, "timestamp"),
        ],
    },
    FieldMapping {
        global_field: "id",
        mappings: &[
            (Flux, "id"),
            (Fetching, "fetchingID"),
            (Processing, "processingID"),
            (Content, "contentID"),
            (Workflow, "id"),
            (Normalization, "normalizationID"),
            (Refinement, "refinementID"),
            (Calculation, "calculationID"),
        ],
    },
    FieldMapping {
        global_field: "name",
        mappings: &[
            (Flux, "name"),
            (Content, "contentName"),
            (Workflow, "flux_name"),
        ],
    },
    FieldMapping {
        global_field: "duration",
        mappings: &[
            (Flux, "duration"),
            (Fetching, "fetchingTimeInSeconds"),
            (Processing, "processingTimeInSeconds"),
            (Workflow, "duration_active"),
            (Normalization, "normalizationTimeInSeconds"),
            (Refinement, "refinementTimeInSeconds"),
            (Calculation, "calculationTimeInSeconds"),
        ],
    },
    FieldMapping {
        global_field: "fileType",
        mappings: &[(Content, "fileType")],
    },
    FieldMapping {
        global_field: "progress",
        mappings: &[
            (Flux, "progress"),
            (Fetching, "progress"),
            (Processing, "progress"),
            (Workflow, "progress"),
            (Normalization, "progress"),
            (Refinement, "progress"),
            (Calculation, "progress"),
        ],
    },
    FieldMapping {
        global_field: "errorMessage",
        mappings: &[
            (Fetching, "errorMessage"),
            (Processing, "errorMessage"),
            (Normalization, "errorMessage"),
            (Refinement, "errorMessage"),
            (Calculation, "errorMessage"),
        ],
    },
];

/// Mapping entry for a global field, if the table has one.
#[must_use]
pub fn mapping_for(field: &str) -> Option<&'static FieldMapping> {
    GLOBAL_FIELD_MAPPINGS
        .iter()
        .find(|mapping| mapping.global_field == field)
}

/// Fan a global filter out into one scoped filter per supporting category.
#[must_use]
pub fn expand(filter: &GlobalFilter) -> Vec<ScopedFilter> {
    let Some(mapping) = mapping_for(&filter.field) else {
        tracing::debug!(field = %filter.field, "global filter field has no mapping");
        return Vec::new();
    };
    mapping
        .mappings
        .iter()
        .map(|(category, column)| ScopedFilter {
            field: (*column).to_string(),
            operator: filter.operator.clone(),
            value: filter.value.clone(),
            category: Some(*category),
        })
        .collect()
}

/// Expand every global filter in a list, keeping scoped filters in place.
pub fn expand_all<'a, I>(filters: I) -> Vec<ScopedFilter>
where
    I: IntoIterator<Item = &'a FilterCondition>,
{
    let mut out = Vec::new();
    for filter in filters {
        match filter {
            FilterCondition::Global(global) if global.field == TYPE_FIELD => out.push(ScopedFilter {
                field: global.field.clone(),
                operator: global.operator.clone(),
                value: global.value.clone(),
                category: None,
            }),
            FilterCondition::Global(global) => out.extend(expand(global)),
            FilterCondition::Scoped(scoped) => out.push(scoped.clone()),
        }
    }
    out
}
