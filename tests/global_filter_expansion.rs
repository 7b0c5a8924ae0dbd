//! Global filter expansion and wire decoding.

use flux_activity::filters::condition::{FilterCategory, Scalar};
use flux_activity::filters::decode::{encode_filters, try_decode_filters};
use flux_activity::filters::expand::{GLOBAL_FIELD_MAPPINGS, expand, expand_all, mapping_for};
use flux_activity::prelude::*;
use proptest::prelude::*;
use serde_json::json;

fn global(field: &str, operator: FilterOperator, value: FilterValue) -> GlobalFilter {
    GlobalFilter {
        field: field.to_string(),
        operator,
        value,
    }
}

#[test]
fn status_expands_to_every_category_in_table_order() {
    let value = FilterValue::texts(&["Failed", "Cancelled"]);
    let scoped = expand(&global("status", FilterOperator::In, value.clone()));
    let pairs: Vec<_> = scoped
        .iter()
        .map(|f| (f.category, f.field.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Some(FilterCategory::Flux), "fluxState"),
            (Some(FilterCategory::Fetching), "status"),
            (Some(FilterCategory::Processing), "status"),
            (Some(FilterCategory::Content), "status"),
            (Some(FilterCategory::Workflow), "status"),
            (Some(FilterCategory::Normalization), "status"),
            (Some(FilterCategory::Refinement), "status"),
            (Some(FilterCategory::Calculation), "status"),
        ]
    );
    assert!(
        scoped
            .iter()
            .all(|f| f.operator == FilterOperator::In && f.value == value)
    );
}

#[test]
fn file_type_only_reaches_content() {
    let scoped = expand(&global(
        "fileType",
        FilterOperator::Equals,
        FilterValue::texts(&["pdf"]),
    ));
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].category, Some(FilterCategory::Content));
    assert!(
        SourceCategory::ALL
            .into_iter()
            .all(|source| !scoped[0].applies_to(source))
    );
}

#[test]
fn unmapped_field_expands_to_nothing() {
    assert!(mapping_for("colour").is_none());
    assert!(expand(&global("colour", FilterOperator::Equals, FilterValue::Null)).is_empty());
}

#[test]
fn expand_all_keeps_scoped_filters_in_order() {
    let filters = vec![
        FilterCondition::scoped(
            "type",
            FilterOperator::In,
            FilterValue::texts(&["fetching"]),
            None,
        ),
        FilterCondition::global("fileType", FilterOperator::Equals, FilterValue::texts(&["csv"])),
    ];
    let expanded = expand_all(&filters);
    let fields: Vec<_> = expanded.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, vec!["type", "fileType"]);
    assert_eq!(expanded[0].category, None);
}

#[test]
fn wire_form_marks_globals_with_sentinel_category() {
    let raw = json!([
        {"field": "status", "operator": "in", "value": ["Failed"], "category": "global"},
        {"field": "status", "operator": "equals", "value": "Success", "category": "refinement"},
        {"field": "type", "operator": "in", "value": ["calculation"]},
        {"field": "progress", "operator": "between", "value": null, "category": "global"}
    ]);
    let filters: Vec<FilterCondition> = serde_json::from_value(raw).unwrap();
    assert!(matches!(filters[0], FilterCondition::Global(_)));
    assert!(matches!(
        &filters[1],
        FilterCondition::Scoped(s) if s.category == Some(FilterCategory::Refinement)
            && s.value == FilterValue::Scalar(Scalar::Text("Success".into()))
    ));
    assert!(matches!(&filters[2], FilterCondition::Scoped(s) if s.category.is_none()));
    assert!(matches!(
        &filters[3],
        FilterCondition::Global(g) if g.operator == FilterOperator::Unsupported("between".into())
    ));
}

#[test]
fn unknown_category_is_rejected() {
    let raw = json!([{"field": "status", "operator": "in", "value": [], "category": "billing"}]);
    assert!(serde_json::from_value::<Vec<FilterCondition>>(raw).is_err());
}

#[test]
fn transport_encoding_survives_non_ascii() {
    let filters = vec![FilterCondition::global(
        "errorMessage",
        FilterOperator::ErrorContains,
        FilterValue::texts(&["délai dépassé (100%)"]),
    )];
    let encoded = encode_filters(&filters).unwrap();
    assert!(encoded.is_ascii());
    assert_eq!(try_decode_filters(&encoded).unwrap(), filters);
    assert!(decode_filters("not base64 at all!").is_empty());
}

fn any_operator() -> impl Strategy<Value = FilterOperator> {
    prop_oneof![
        Just(FilterOperator::Equals),
        Just(FilterOperator::In),
        Just(FilterOperator::Contains),
        Just(FilterOperator::DateRange),
        Just(FilterOperator::ProgressRanges),
        "[a-z]{3,8}".prop_map(|raw| FilterOperator::parse(&raw)),
    ]
}

fn any_value() -> impl Strategy<Value = FilterValue> {
    prop_oneof![
        Just(FilterValue::Null),
        any::<i64>().prop_map(|i| FilterValue::Scalar(Scalar::Int(i))),
        proptest::collection::vec("[A-Za-z ]{0,12}", 0..4)
            .prop_map(|items| FilterValue::List(items.into_iter().map(Scalar::Text).collect())),
    ]
}

proptest! {
    #[test]
    fn expansion_follows_mapping_table(
        index in 0..GLOBAL_FIELD_MAPPINGS.len(),
        operator in any_operator(),
        value in any_value(),
    ) {
        let mapping = &GLOBAL_FIELD_MAPPINGS[index];
        let scoped = expand(&global(mapping.global_field, operator.clone(), value.clone()));
        prop_assert_eq!(scoped.len(), mapping.mappings.len());
        for (filter, (category, column)) in scoped.iter().zip(mapping.mappings) {
            prop_assert_eq!(filter.category, Some(*category));
            prop_assert_eq!(filter.field.as_str(), *column);
            prop_assert_eq!(&filter.operator, &operator);
            prop_assert_eq!(&filter.value, &value);
        }
    }

    #[test]
    fn unmapped_fields_never_expand(field in "[a-z]{1,10}_x") {
        prop_assert!(expand(&global(&field, FilterOperator::Equals, FilterValue::Null)).is_empty());
    }
}
