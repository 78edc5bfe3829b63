//! The page-selector state machine
//!
//! One `Paginator` instance lives for one request sequence. It owns the
//! current selector and the continuation flag; the orchestrator asks it for
//! the next request while `has_more()` holds and feeds every parsed page
//! back through `advance`.

use super::types::{PageRequest, PageResult, PaginationMode};
use crate::types::StringMap;
use tracing::warn;

/// Per-request-sequence pagination state machine.
///
/// The selector starts at 1 for every mode and stream; `advance` moves it
/// to 2 after the first page. Selectors never come from response tokens.
#[derive(Debug, Clone)]
pub struct Paginator {
    mode: PaginationMode,
    stream: String,
    selector: u32,
    has_more: bool,
}

impl Paginator {
    /// Create a paginator for one sync of `stream`
    pub fn new(mode: PaginationMode, stream: impl Into<String>) -> Self {
        Self {
            mode,
            stream: stream.into(),
            selector: 1,
            has_more: true,
        }
    }

    /// Whether another page must be fetched
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// The selector the next request will carry
    pub fn selector(&self) -> u32 {
        self.selector
    }

    /// Build the next page request by merging the selector (and optional
    /// page size) into `base_params`
    pub fn next_request(&self, url: impl Into<String>, base_params: StringMap) -> PageRequest {
        let mut query = base_params;
        match &self.mode {
            PaginationMode::None => {}
            PaginationMode::NonEmptyBody {
                page_param,
                page_size_param,
                page_size,
            } => {
                query.insert(page_param.clone(), self.selector.to_string());
                if let (Some(param), Some(size)) = (page_size_param, page_size) {
                    query.insert(param.clone(), size.to_string());
                }
            }
            PaginationMode::PageCount {
                page_param,
                page_size,
                page_size_param,
                ..
            } => {
                query.insert(page_param.clone(), self.selector.to_string());
                if let Some(param) = page_size_param {
                    query.insert(param.clone(), page_size.to_string());
                }
            }
        }
        PageRequest {
            url: url.into(),
            query,
            selector: self.selector,
        }
    }

    /// Record a fetched page: recompute `has_more` and step the selector.
    ///
    /// A page whose shape does not match the configured strategy (object
    /// without the result list, or a bare list where a total count was
    /// expected) stops pagination defensively with a warning instead of
    /// erroring, so a malformed response can never loop forever.
    pub fn advance(&mut self, page: &PageResult) {
        match &self.mode {
            PaginationMode::None => {
                self.has_more = false;
            }
            PaginationMode::NonEmptyBody { .. } => {
                if page.from_records_key {
                    self.has_more = !page.records.is_empty();
                } else {
                    warn!(
                        "stream '{}': page {} has no result list under the configured key, \
                         stopping pagination",
                        self.stream, page.selector
                    );
                    self.has_more = false;
                }
                if self.has_more {
                    self.selector += 1;
                }
            }
            PaginationMode::PageCount { page_size, .. } => {
                match page.total {
                    Some(total) => {
                        let total_pages = total.div_ceil(u64::from(*page_size));
                        self.has_more = u64::from(self.selector) < total_pages;
                    }
                    None => {
                        warn!(
                            "stream '{}': page {} carried no total count, stopping pagination",
                            self.stream, page.selector
                        );
                        self.has_more = false;
                    }
                }
                if self.has_more {
                    self.selector += 1;
                }
            }
        }
    }
}
