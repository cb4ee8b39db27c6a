//! Query scopes - filtered-query values and their SQL serialization

pub mod scope;
pub mod sql;
pub mod types;

pub use scope::{scope_fn, Scope, ScopeFn};
pub use types::{format_value, Condition, OrderDirection, QueryOperator};
