//! Activity engine: request validation, per-category fan-out, and assembly.
//!
//! One call to [`ActivityEngine::get_activities`] builds five independent
//! [`SourceQuery`]s, runs each through its probe ladder (concurrently unless
//! `engine.parallel` is off), normalizes, merges, post-filters by type, and
//! slices the requested page. Fetching and processing are mandatory: if
//! either fails, the whole call fails. The other three degrade to zero events.

#![allow(missing_docs)]

use crossbeam_channel as channel;
use serde::Serialize;

use crate::activity::category::SourceCategory;
use crate::activity::merge::{self, TYPE_FIELD, TotalEstimate};
use crate::activity::normalize::{self, ActivityEvent};
use crate::activity::probe::{self, ProbeOutcome};
use crate::activity::query::{Scope, SourceQuery, Window};
use crate::core::config::{Config, EngineConfig, TablesConfig};
use crate::core::errors::{FxaError, Result};
use crate::filters::condition::{FilterCondition, ScopedFilter};
use crate::filters::decode::decode_filters;
use crate::filters::expand::expand_all;
use crate::store::ActivityStore;

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ──────────────────── request / response ────────────────────

/// One feed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRequest {
    /// `"all"` or a numeric owner id.
    pub scope_id: String,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub filters: Vec<FilterCondition>,
}

impl Default for ActivityRequest {
    fn default() -> Self {
        Self {
            scope_id: "all".to_string(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filters: Vec::new(),
        }
    }
}

impl ActivityRequest {
    pub fn new(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterCondition) -> Self {
        self.filters.push(filter);
        self
    }

    /// Build a request from raw query-string values.
    ///
    /// Missing or unparseable numbers fall back to page 1 and the default page
    /// size; `filters` is transport-encoded (see [`decode_filters`]).
    #[must_use]
    pub fn from_query_params(
        scope: Option<&str>,
        page: Option<&str>,
        page_size: Option<&str>,
        filters: Option<&str>,
    ) -> Self {
        let number = |raw: Option<&str>, default: u32| {
            raw.and_then(|r| r.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };
        Self {
            scope_id: scope
                .filter(|s| !s.trim().is_empty())
                .unwrap_or("all")
                .to_string(),
            page: number(page, 1),
            page_size: number(page_size, DEFAULT_PAGE_SIZE),
            filters: filters.map(decode_filters).unwrap_or_default(),
        }
    }
}

/// Successful feed page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPage {
    pub activities: Vec<ActivityEvent>,
    pub has_more: bool,
    /// Lower-bound estimate; see [`TotalEstimate`].
    pub total: TotalEstimate,
}

/// Wire shape returned to feed consumers. `error` is set only on fatal failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub activities: Vec<ActivityEvent>,
    pub has_more: bool,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActivityResponse {
    /// Fatal errors become an empty page carrying the message.
    #[must_use]
    pub fn from_result(result: Result<ActivityPage>) -> Self {
        match result {
            Ok(page) => Self {
                activities: page.activities,
                has_more: page.has_more,
                total: page.total.value(),
                error: None,
            },
            Err(error) => Self {
                activities: Vec::new(),
                has_more: false,
                total: 0,
                error: Some(error.to_string()),
            },
        }
    }
}

// ──────────────────── engine ────────────────────

/// Read-only aggregation engine over an [`ActivityStore`].
pub struct ActivityEngine<S> {
    store: S,
    settings: EngineConfig,
    tables: TablesConfig,
}

impl<S: ActivityStore> ActivityEngine<S> {
    pub fn new(store: S, config: &Config) -> Self {
        Self::with_settings(store, config.engine.clone(), config.tables.clone())
    }

    pub const fn with_settings(store: S, settings: EngineConfig, tables: TablesConfig) -> Self {
        Self {
            store,
            settings,
            tables,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Fetch one page of the merged activity feed.
    ///
    /// Scope, paging, and filter values are all validated before the store
    /// is touched.
    pub fn get_activities(&self, request: &ActivityRequest) -> Result<ActivityPage> {
        if request.page == 0 || request.page_size == 0 {
            return Err(FxaError::InvalidRequest {
                details: format!(
                    "page and page_size must be >= 1 (got page={}, page_size={})",
                    request.page, request.page_size
                ),
            });
        }
        let scope = Scope::parse(&request.scope_id)?;
        let page_size = request.page_size.min(self.settings.max_page_size);
        if page_size < request.page_size {
            tracing::debug!(
                requested = request.page_size,
                page_size,
                "page size clamped to engine.max_page_size"
            );
        }
        let window = Window::for_page(request.page, page_size);

        let filters = expand_all(&request.filters);
        let allowed_types = merge::type_allow_list(&filters);
        let queries = self.build_queries(scope, window, &filters)?;

        let outcomes = if self.settings.parallel {
            self.fetch_parallel(&queries)
        } else {
            queries.iter().map(|query| self.fetch_one(query)).collect()
        };

        let mut per_category = Vec::with_capacity(outcomes.len());
        let mut raw_total = 0;
        for (query, outcome) in queries.iter().zip(outcomes) {
            let category = query.category;
            match outcome {
                Ok(outcome) => {
                    raw_total += outcome.rows.len();
                    per_category.push(normalize::normalize_rows(category, outcome.rows));
                }
                Err(error) if category.is_mandatory() => {
                    tracing::error!(%category, code = error.code(), %error, "mandatory category failed");
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(%category, code = error.code(), %error, "optional category failed, contributing no events");
                    per_category.push(Vec::new());
                }
            }
        }

        let merged = merge::merge(per_category);
        let processed = merged.len();
        let filtered = merge::apply_type_filter(merged, allowed_types.as_deref());
        tracing::debug!(
            raw = raw_total,
            processed,
            filtered = filtered.len(),
            "activities assembled"
        );

        let slice = merge::paginate(filtered, window.offset, page_size as usize);
        Ok(ActivityPage {
            activities: slice.activities,
            has_more: slice.has_more,
            total: slice.total,
        })
    }

    fn build_queries(
        &self,
        scope: Scope,
        window: Window,
        filters: &[ScopedFilter],
    ) -> Result<Vec<SourceQuery>> {
        SourceCategory::ALL
            .into_iter()
            .map(|category| {
                let base = SourceQuery::new(category, self.tables.table_for(category), scope, window);
                filters
                    .iter()
                    .filter(|f| f.field != TYPE_FIELD && f.applies_to(category))
                    .try_fold(base, |query, filter| query.with_filter(filter))
            })
            .collect()
    }

    fn fetch_one(&self, query: &SourceQuery) -> Result<ProbeOutcome> {
        probe::execute(&self.store, query, query.category.spec().ladder)
    }

    /// One scoped thread per category; results are slotted back by index.
    fn fetch_parallel(&self, queries: &[SourceQuery]) -> Vec<Result<ProbeOutcome>> {
        let (tx, rx) = channel::bounded(queries.len());
        std::thread::scope(|scope| {
            for (index, query) in queries.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move || {
                    // The receiver outlives the scope, so send cannot fail.
                    let _ = tx.send((index, self.fetch_one(query)));
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<Result<ProbeOutcome>>> = queries.iter().map(|_| None).collect();
        for (index, outcome) in rx.iter() {
            slots[index] = Some(outcome);
        }
        slots
            .into_iter()
            .zip(queries)
            .map(|(slot, query)| {
                slot.unwrap_or_else(|| {
                    Err(FxaError::SourceQuery {
                        category: query.category,
                        details: "fetch worker exited without a result".to_string(),
                    })
                })
            })
            .collect()
    }
}
