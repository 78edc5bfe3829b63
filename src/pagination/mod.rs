//! Pagination module
//!
//! Supports: non-empty-body continuation, computed page counts, single-page
//! endpoints
//!
//! # Overview
//!
//! A `Paginator` is a small per-sync state machine: it merges the current
//! page selector into each request's query parameters and, after every
//! parsed page, decides whether another fetch is needed. Strategies are
//! data-driven via [`PaginationMode`] in the stream table rather than
//! per-source code.

mod paginator;
mod types;

pub use paginator::Paginator;
pub use types::{PageRequest, PageResult, PaginationMode};
