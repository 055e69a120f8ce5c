/// Rows per page until the user picks another size
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// Row cap used in show-all mode instead of an unbounded fetch
pub const SHOW_ALL_LIMIT: u32 = 50_000;

/// Page position within the current result set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
    show_all: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            show_all: false,
        }
    }

    /// Current page (1-based)
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    /// Number of pages for `total` rows, never less than one
    pub fn total_pages(&self, total: u64) -> u32 {
        if self.show_all {
            return 1;
        }
        let pages = total.div_ceil(u64::from(self.page_size)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Row offset sent to the API
    pub fn offset(&self) -> u64 {
        if self.show_all {
            0
        } else {
            u64::from(self.page - 1) * u64::from(self.page_size)
        }
    }

    /// Row limit sent to the API
    pub fn limit(&self) -> u32 {
        if self.show_all {
            SHOW_ALL_LIMIT
        } else {
            self.page_size
        }
    }

    /// Move to page `n`, clamped into `[1, total_pages]`. Returns whether
    /// the page changed.
    pub fn set_page(&mut self, n: u32, total: u64) -> bool {
        let clamped = n.clamp(1, self.total_pages(total));
        let changed = clamped != self.page;
        self.page = clamped;
        changed
    }

    /// Change the page size. Always lands on page 1.
    pub fn set_page_size(&mut self, n: u32) -> bool {
        let n = n.max(1);
        let changed = n != self.page_size || self.page != 1;
        self.page_size = n;
        self.page = 1;
        changed
    }

    /// Back to page 1
    pub fn reset_page(&mut self) -> bool {
        let changed = self.page != 1;
        self.page = 1;
        changed
    }

    /// Enter or leave show-all mode. Either way the page becomes 1.
    pub fn set_show_all(&mut self, show_all: bool) -> bool {
        let changed = show_all != self.show_all || self.page != 1;
        self.show_all = show_all;
        self.page = 1;
        changed
    }
}
