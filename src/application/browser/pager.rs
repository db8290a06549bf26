use std::num::NonZeroUsize;

/// Page bookkeeping for a list of `per_page`-sized pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    per_page: usize,
    page: usize,
    total_pages: usize,
}

impl Pager {
    pub fn new(per_page: NonZeroUsize) -> Self {
        Self {
            per_page: per_page.get(),
            page: 0,
            total_pages: 0,
        }
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn set_total_pages(&mut self, items: usize) {
        self.total_pages = items.div_ceil(self.per_page);
    }

    pub fn reset(&mut self) {
        self.page = 0;
    }

    /// Keep the current page inside the known page range.
    pub fn clamp_page(&mut self) {
        self.page = self.page.min(self.total_pages.saturating_sub(1));
    }

    pub fn on_first_page(&self) -> bool {
        self.page == 0
    }

    pub fn on_last_page(&self) -> bool {
        self.page + 1 >= self.total_pages
    }

    pub fn prev_page(&mut self) -> bool {
        if self.on_first_page() {
            return false;
        }
        self.page -= 1;
        true
    }

    pub fn next_page(&mut self) -> bool {
        if self.on_last_page() {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn slice_bounds(&self, len: usize) -> (usize, usize) {
        let start = (self.page * self.per_page).min(len);
        let end = (start + self.per_page).min(len);
        (start, end)
    }

    pub fn items_on_page(&self, len: usize) -> usize {
        let (start, end) = self.slice_bounds(len);
        end - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pager(per_page: usize, items: usize) -> Pager {
        let mut pager = Pager::new(NonZeroUsize::new(per_page).unwrap());
        pager.set_total_pages(items);
        pager
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(pager(4, 0).total_pages(), 0);
        assert_eq!(pager(4, 1).total_pages(), 1);
        assert_eq!(pager(4, 4).total_pages(), 1);
        assert_eq!(pager(4, 5).total_pages(), 2);
        assert_eq!(pager(4, 9).total_pages(), 3);
    }

    #[test]
    fn paging_stops_at_both_ends() {
        let mut pager = pager(4, 5);
        assert!(!pager.prev_page());
        assert!(pager.next_page());
        assert_eq!(pager.page(), 1);
        assert!(!pager.next_page());
        assert_eq!(pager.page(), 1);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        let mut pager = pager(4, 5);
        assert_eq!(pager.slice_bounds(5), (0, 4));
        pager.next_page();
        assert_eq!(pager.slice_bounds(5), (4, 5));
        assert_eq!(pager.items_on_page(5), 1);
    }

    #[test]
    fn clamp_moves_back_when_pages_disappear() {
        let mut pager = pager(4, 5);
        pager.next_page();
        pager.set_total_pages(4);
        pager.clamp_page();
        assert_eq!(pager.page(), 0);

        pager.set_total_pages(0);
        pager.clamp_page();
        assert_eq!(pager.page(), 0);
        assert_eq!(pager.items_on_page(0), 0);
    }
}
