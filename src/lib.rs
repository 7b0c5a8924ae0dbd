#![forbid(unsafe_code)]

//! Flux activity (fxa): cross-source activity aggregation for flux pipelines.
//!
//! Merges the fetching, processing, normalization, refinement, and calculation
//! history tables into one newest-first, filterable, paginated feed:
//! 1. **Query building**: one range-limited query per category, filters
//!    translated through a fixed operator table
//! 2. **Drift probing**: per-category time-column ladders so tables that
//!    predate `timestamp` still contribute
//! 3. **Merge & page**: bounded in-memory merge with a lower-bound total
//!
//! Global filters from the filter panel are fanned out per category by
//! [`filters::expand`].
//!
//! # Library usage
//!
//! ```rust,no_run
//! use flux_activity::prelude::*;
//!
//! # fn main() -> flux_activity::core::errors::Result<()> {
//! let config = Config::load(None)?;
//! let store = SqliteStore::from_config(&config.store)?;
//! let engine = ActivityEngine::new(store, &config);
//! let page = engine.get_activities(&ActivityRequest::new("42"))?;
//! println!("{} events, more: {}", page.activities.len(), page.has_more);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod activity;
pub mod core;
pub mod filters;
pub mod store;
