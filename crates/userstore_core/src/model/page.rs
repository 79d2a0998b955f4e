//! Paging request and search result shapes.

use serde::{Deserialize, Serialize};

/// Page window for a search.
///
/// `limit <= 0` means "return nothing" and skips the store entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    /// Negative offsets are clamped to zero.
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset: offset.max(0),
        }
    }

    /// Builds a window from a 1-based page number.
    ///
    /// Page numbers below 1 are treated as the first page.
    pub fn from_page(page: i64, limit: i64) -> Self {
        let page = page.max(1);
        let offset = if limit > 0 {
            (page - 1).saturating_mul(limit)
        } else {
            0
        };
        Self::new(limit, offset)
    }

    /// Returns whether this window can never hold a row.
    pub fn is_empty_window(&self) -> bool {
        self.limit <= 0
    }
}

/// One page of matching records plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<E> {
    pub items: Vec<E>,
    pub total: i64,
}

impl<E> SearchResult<E> {
    pub fn empty(total: i64) -> Self {
        Self {
            items: Vec::new(),
            total,
        }
    }
}
