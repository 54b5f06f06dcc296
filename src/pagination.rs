//! Offset/limit bulk listing.
//!
//! Pages are requested until one comes back shorter than the page size. A
//! page of exactly `limit` items is taken to mean "there may be more", so a
//! collection whose size is a multiple of the page size costs one extra
//! (empty) request.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 999;

/// Offset/limit cursor for a bulk listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    limit: u32,
    offset: u64,
    done: bool,
}

impl Paginator {
    /// `None` or `0` selects [`DEFAULT_PAGE_LIMIT`].
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit: limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT),
            offset: 0,
            done: false,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// `(offset, limit)` of the next request, or `None` once finished.
    pub fn next_page(&self) -> Option<(u64, u32)> {
        if self.done {
            None
        } else {
            Some((self.offset, self.limit))
        }
    }

    /// Records the size of the page just fetched.
    pub fn record(&mut self, fetched: usize) {
        self.offset += fetched as u64;
        if fetched < self.limit as usize {
            self.done = true;
        }
    }
}

/// Fetches every page through `fetch_page(offset, limit)` and concatenates them.
pub async fn paginate_all<T, F, Fut>(limit: Option<u32>, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u64, u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut pager = Paginator::new(limit);
    let mut items = Vec::new();
    while let Some((offset, limit)) = pager.next_page() {
        let page = fetch_page(offset, limit).await?;
        pager.record(page.len());
        items.extend(page);
    }
    Ok(items)
}

/// Envelope of collection endpoints (`{"data": {"total", "items", ...}}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginatedList<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub desc: bool,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> PaginatedList<T> {
    /// Concatenates consecutive pages of one listing.
    ///
    /// `count` and `limit` add up; `total` is the largest total any page
    /// reported, and `offset`/`desc` come from the first page.
    pub fn combine(pages: impl IntoIterator<Item = PaginatedList<T>>) -> Self {
        let mut combined = PaginatedList {
            total: 0,
            count: 0,
            offset: 0,
            limit: 0,
            desc: false,
            items: Vec::new(),
        };
        for (index, page) in pages.into_iter().enumerate() {
            if index == 0 {
                combined.offset = page.offset;
                combined.desc = page.desc;
            }
            combined.total = combined.total.max(page.total);
            combined.count += page.count;
            combined.limit += page.limit;
            combined.items.extend(page.items);
        }
        combined
    }
}
