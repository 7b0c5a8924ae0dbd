//! Filter conditions, global expansion, and transport decoding.

pub mod condition;
pub mod decode;
pub mod expand;

pub use condition::{
    DateBounds, DateRange, FilterCategory, FilterCondition, FilterOperator, FilterValue,
    GlobalFilter, Scalar, ScopedFilter,
};
pub use decode::{decode_filters, encode_filters, try_decode_filters};
pub use expand::{GLOBAL_FIELD_MAPPINGS, expand, expand_all};
