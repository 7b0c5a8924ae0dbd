//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use flux_activity::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{FxaError, Result};

// Activity
pub use crate::activity::category::{ActivityType, SourceCategory};
pub use crate::activity::engine::{
    ActivityEngine, ActivityPage, ActivityRequest, ActivityResponse,
};
pub use crate::activity::merge::TotalEstimate;
pub use crate::activity::normalize::ActivityEvent;

// Filters
pub use crate::filters::condition::{
    FilterCategory, FilterCondition, FilterOperator, FilterValue, GlobalFilter, ScopedFilter,
};
pub use crate::filters::decode::decode_filters;
pub use crate::filters::expand::expand;

// Store
#[cfg(feature = "sqlite")]
pub use crate::store::sqlite::SqliteStore;
pub use crate::store::{ActivityStore, StoreError};
