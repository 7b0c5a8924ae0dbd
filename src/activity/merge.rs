//! Merge, type post-filter, and pagination window.
//!
//! Each category contributes at most `page_size + 1` events, so the merge is a
//! plain stable sort over a small bounded list rather than a streaming k-way
//! merge.

#![allow(missing_docs)]

use serde::{Serialize, Serializer};

use crate::activity::normalize::ActivityEvent;
use crate::filters::condition::ScopedFilter;

/// Logical field handled after the merge instead of inside source queries.
///
/// A `type` filter keeps whole categories, so its `category` is ignored:
/// scoped and global `type` filters behave the same, and the last one wins.
pub const TYPE_FIELD: &str = "type";

// ──────────────────── merge ────────────────────

/// Concatenate per-category events in the given order, then sort newest first.
///
/// The sort is stable, so equal timestamps keep concatenation order.
#[must_use]
pub fn merge(per_category: Vec<Vec<ActivityEvent>>) -> Vec<ActivityEvent> {
    let mut merged: Vec<ActivityEvent> = per_category.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}

// ──────────────────── type post-filter ────────────────────

/// Allowed event types from the last `type` filter; `None` when nothing filters.
#[must_use]
pub fn type_allow_list(filters: &[ScopedFilter]) -> Option<Vec<String>> {
    let last = filters.iter().rev().find(|f| f.field == TYPE_FIELD)?;
    let types: Vec<String> = last.value.scalars().iter().map(|s| s.to_text()).collect();
    if types.is_empty() { None } else { Some(types) }
}

/// Keep only events whose type is in `allowed`.
#[must_use]
pub fn apply_type_filter(events: Vec<ActivityEvent>, allowed: Option<&[String]>) -> Vec<ActivityEvent> {
    match allowed {
        None => events,
        Some(types) => events
            .into_iter()
            .filter(|event| types.iter().any(|t| t == event.kind.as_str()))
            .collect(),
    }
}

// ──────────────────── pagination ────────────────────

/// Row total reported to callers.
///
/// Each category only fetches `page_size + 1` rows past the shared offset, so
/// the engine never knows the true count. The value is
/// `offset + page length + (has_more ? 1 : 0)`: a lower bound, exact only when
/// there is no further page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalEstimate {
    LowerBound(u64),
}

impl TotalEstimate {
    #[must_use]
    pub const fn value(self) -> u64 {
        match self {
            Self::LowerBound(n) => n,
        }
    }
}

impl Serialize for TotalEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.value())
    }
}

/// One page cut from the merged list.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSlice {
    pub activities: Vec<ActivityEvent>,
    pub has_more: bool,
    pub total: TotalEstimate,
}

/// Take the first `page_size` events; anything left over means `has_more`.
#[must_use]
pub fn paginate(mut events: Vec<ActivityEvent>, offset: u64, page_size: usize) -> PageSlice {
    let has_more = events.len() > page_size;
    events.truncate(page_size);
    let total = offset + events.len() as u64 + u64::from(has_more);
    PageSlice {
        activities: events,
        has_more,
        total: TotalEstimate::LowerBound(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::category::{ActivityType, SourceCategory};
    use crate::filters::condition::{FilterOperator, FilterValue, Scalar};
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::Map;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn event(category: SourceCategory, n: u32, secs: i64) -> ActivityEvent {
        ActivityEvent {
            id: format!("{category}-{n}"),
            kind: category.activity_type(),
            timestamp: at(secs),
            data: Map::new(),
        }
    }

    fn type_filter(value: FilterValue) -> ScopedFilter {
        ScopedFilter {
            field: TYPE_FIELD.to_string(),
            operator: FilterOperator::In,
            value,
            category: None,
        }
    }

    #[test]
    fn merge_sorts_descending_and_keeps_tie_order() {
        let merged = merge(vec![
            vec![event(SourceCategory::Fetching, 1, 10), event(SourceCategory::Fetching, 2, 30)],
            vec![event(SourceCategory::Processing, 1, 30)],
            vec![event(SourceCategory::Calculation, 1, 20)],
        ]);
        let ids: Vec<_> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["fetching-2", "processing-1", "calculation-1", "fetching-1"]
        );
    }

    #[test]
    fn type_filter_excludes_unlisted_types() {
        let merged = merge(vec![
            vec![event(SourceCategory::Fetching, 1, 3)],
            vec![event(SourceCategory::Processing, 1, 2)],
            vec![event(SourceCategory::Calculation, 1, 1)],
        ]);
        let allowed = type_allow_list(&[type_filter(FilterValue::texts(&["fetching", "calculation"]))]);
        let kept = apply_type_filter(merged, allowed.as_deref());
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|e| e.kind != ActivityType::Processing));
    }

    #[test]
    fn type_filter_category_is_ignored() {
        let mut scoped = type_filter(FilterValue::texts(&["processing"]));
        scoped.category = Some(SourceCategory::Refinement.into());
        assert_eq!(type_allow_list(&[scoped]), Some(vec!["processing".to_string()]));
    }

    #[test]
    fn last_type_filter_wins_and_empty_list_is_ignored() {
        let filters = [
            type_filter(FilterValue::texts(&["fetching"])),
            type_filter(FilterValue::Scalar(Scalar::Text("refinement".into()))),
        ];
        assert_eq!(type_allow_list(&filters), Some(vec!["refinement".to_string()]));

        let empty = [type_filter(FilterValue::List(Vec::new()))];
        assert_eq!(type_allow_list(&empty), None);
        assert_eq!(type_allow_list(&[]), None);
    }

    #[test]
    fn three_events_page_size_two_has_more() {
        let merged = merge(vec![
            vec![event(SourceCategory::Fetching, 1, 1)],
            vec![event(SourceCategory::Processing, 1, 3)],
            vec![event(SourceCategory::Normalization, 1, 2)],
        ]);
        let page = paginate(merged, 0, 2);
        let times: Vec<_> = page.activities.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![at(3), at(2)]);
        assert!(page.has_more);
        assert_eq!(page.total, TotalEstimate::LowerBound(3));
    }

    #[test]
    fn total_is_lower_bound_on_later_pages() {
        // Page 3 of size 5 with only two rows left: offset 10, two rows, no more.
        let page = paginate(
            vec![event(SourceCategory::Fetching, 1, 2), event(SourceCategory::Fetching, 2, 1)],
            10,
            5,
        );
        assert!(!page.has_more);
        assert_eq!(page.total.value(), 12);

        // A full page with an extra row only promises one more.
        let many: Vec<_> = (0..11).map(|i| event(SourceCategory::Processing, i, i64::from(i))).collect();
        let page = paginate(many, 0, 5);
        assert!(page.has_more);
        assert_eq!(page.total.value(), 6);
    }

    #[test]
    fn total_serializes_as_number() {
        let value = serde_json::to_value(TotalEstimate::LowerBound(21)).unwrap();
        assert_eq!(value, serde_json::json!(21));
    }

    fn arb_batches() -> impl Strategy<Value = Vec<Vec<i64>>> {
        prop::collection::vec(prop::collection::vec(0i64..500, 0..12), 5)
    }

    fn build(batches: &[Vec<i64>]) -> Vec<Vec<ActivityEvent>> {
        batches
            .iter()
            .zip(SourceCategory::ALL)
            .map(|(times, category)| {
                times
                    .iter()
                    .enumerate()
                    .map(|(i, secs)| event(category, i as u32, *secs))
                    .collect()
            })
            .collect()
    }

    proptest! {
        #[test]
        fn merged_pages_are_sorted_and_bounded(
            batches in arb_batches(),
            page_size in 1usize..15,
            offset in 0u64..100,
        ) {
            let input_len: usize = batches.iter().map(Vec::len).sum();
            let page = paginate(merge(build(&batches)), offset, page_size);

            prop_assert!(page.activities.len() <= page_size);
            prop_assert!(page.activities.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
            prop_assert_eq!(page.has_more, input_len > page_size);
            prop_assert!(page.total.value() >= offset + page.activities.len() as u64);
        }

        #[test]
        fn merge_is_deterministic(batches in arb_batches()) {
            let first = merge(build(&batches));
            let second = merge(build(&batches));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn type_filter_only_keeps_allowed(batches in arb_batches(), pick in 0usize..5) {
            let allowed = vec![SourceCategory::ALL[pick].as_str().to_string()];
            let kept = apply_type_filter(merge(build(&batches)), Some(allowed.as_slice()));
            prop_assert_eq!(kept.len(), batches[pick].len());
            prop_assert!(kept.iter().all(|e| e.kind == SourceCategory::ALL[pick].activity_type()));
        }
    }
}
