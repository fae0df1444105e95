//! Page request normalization and skip/take windowing.
//!
//! # Invariants
//! - After construction `page_index >= 1` and `page_size >= 1`.
//! - A window past the end of the data is empty or short, never an error.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_INDEX: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Normalized one-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    page_index: u32,
    page_size: u32,
}

impl Pagination {
    /// Normalizes raw inputs: `page_index < 1` becomes 1, `page_size <= 0`
    /// becomes 10.
    pub fn new(page_index: i64, page_size: i64) -> Self {
        Self {
            page_index: clamp_or(page_index, DEFAULT_PAGE_INDEX),
            page_size: clamp_or(page_size, DEFAULT_PAGE_SIZE),
        }
    }

    /// Same as `new`, with absent values treated as invalid ones.
    pub fn from_optional(page_index: Option<i64>, page_size: Option<i64>) -> Self {
        Self::new(page_index.unwrap_or(0), page_size.unwrap_or(0))
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Items before the page: `(page_index - 1) * page_size`, saturating.
    pub fn skip(&self) -> usize {
        let skip = u64::from(self.page_index - 1).saturating_mul(u64::from(self.page_size));
        usize::try_from(skip).unwrap_or(usize::MAX)
    }

    pub fn take(&self) -> usize {
        self.page_size as usize
    }

    /// Index range of this page within a sequence of `total` items.
    pub fn window(&self, total: usize) -> std::ops::Range<usize> {
        let start = self.skip().min(total);
        let end = start.saturating_add(self.take()).min(total);
        start..end
    }

    /// Keeps only the items inside this page.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let range = self.window(items.len());
        items
            .into_iter()
            .skip(range.start)
            .take(range.len())
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: DEFAULT_PAGE_INDEX,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn clamp_or(value: i64, fallback: u32) -> u32 {
    if value < 1 {
        return fallback;
    }
    u32::try_from(value).unwrap_or(u32::MAX)
}
