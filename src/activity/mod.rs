//! Cross-source activity aggregation: query building, drift probing,
//! normalization, merge and pagination.

pub mod category;
pub mod engine;
pub mod merge;
pub mod normalize;
pub mod probe;
pub mod query;

pub use category::{ActivityType, SourceCategory};
pub use engine::{ActivityEngine, ActivityPage, ActivityRequest, ActivityResponse};
pub use merge::TotalEstimate;
pub use normalize::ActivityEvent;
pub use query::Scope;
