//! Page arithmetic for listing stores.

/// A requested page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

/// What to do with the rows a page query returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Render the page.
    Render {
        /// 1-based page number.
        page: u32,
        /// Total number of pages.
        pages: u32,
        /// Total number of rows across all pages.
        count: u64,
    },
    /// The page is past the end; send the caller to the last valid page.
    RedirectTo {
        /// Page the caller asked for.
        requested: u32,
        /// Last page that has rows.
        last: u32,
    },
}

impl Pagination {
    /// Stores shown per listing page.
    pub const STORES_PER_PAGE: u32 = 4;

    /// Build a pagination, treating a missing or zero page as page 1 and a
    /// zero limit as 1.
    #[must_use]
    pub fn new(page: Option<u32>, limit: u32) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit.max(1),
        }
    }

    /// The standard store listing pagination.
    #[must_use]
    pub fn stores(page: Option<u32>) -> Self {
        Self::new(page, Self::STORES_PER_PAGE)
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Rows per page.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip: `(page - 1) * limit`.
    #[must_use]
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// `ceil(count / limit)`.
    #[must_use]
    pub fn total_pages(&self, count: u64) -> u32 {
        u32::try_from(count.div_ceil(u64::from(self.limit))).unwrap_or(u32::MAX)
    }

    /// Decide between rendering and redirecting.
    ///
    /// An empty result with a non-zero skip means the caller paged past the
    /// end; they are sent to the last page (page 1 when there is nothing at
    /// all). An empty first page is rendered as-is.
    #[must_use]
    pub fn resolve(&self, returned: usize, count: u64) -> PageOutcome {
        let pages = self.total_pages(count);
        if returned == 0 && self.skip() > 0 {
            PageOutcome::RedirectTo {
                requested: self.page,
                last: pages.max(1),
            }
        } else {
            PageOutcome::Render {
                page: self.page,
                pages,
                count,
            }
        }
    }
}
