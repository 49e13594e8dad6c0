//! # zteradb-query
//!
//! ZQL query builder for ZTeraDB.
//!
//! This crate provides:
//! - A composable filter expression tree (logical, comparison, arithmetic,
//!   string, and set operators)
//! - A chaining query builder producing the wire query document
//! - Build-time validation with descriptive errors

pub mod error;
pub mod filter;
pub mod query;

pub use error::BuildError;
pub use filter::{Filter, FilterNode, Operand, Operator};
pub use query::{Env, Query, QueryType, RESERVED_FIELDS};
