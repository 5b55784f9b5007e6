//! Filter and order compilation.
//!
//! Validation always runs first and reports user-facing errors; compilation
//! of a validated expression can only fail on parser/compiler skew.

mod filter;
mod order;
mod predicate;
mod scope;

pub use filter::validate_filter;
pub use order::{items, validate_order, OrderKey, PostFetchKey, SortPlan};
pub use predicate::{Domain, PredicateCompiler};
pub use scope::TypeScope;
