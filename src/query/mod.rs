//! # Query Module
//!
//! Parsed SQL templates and the per-request clause builder.
//!
//! - `template`: top-level clause scanner for SELECT templates
//! - `builder`: mutable WHERE/ORDER/LIMIT accumulator with bind splicing
//! - `kind`: statement kind detection
//! - `filter`: request filter operators
//! - `parser`: filter/sort/page extraction from request bodies

pub mod builder;
pub mod filter;
pub mod kind;
pub mod parser;
pub mod template;

pub use builder::{Limit, QueryBuilder, Rendered};
pub use filter::{validate_identifier, FilterExpr, FilterOperator};
pub use kind::QueryKind;
pub use parser::{OrderBy, Page, QueryParams, DEFAULT_SELECT_LIMIT};
