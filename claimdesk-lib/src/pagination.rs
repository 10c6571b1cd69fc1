/// One page of results plus the numbers needed to render pagination controls
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number
    pub number: u32,
    /// Always at least 1, even for an empty result set
    pub num_pages: u32,
    pub total: i64,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    /// More than one page exists
    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }

    /// 1-based index of the first item on this page (0 when empty)
    pub fn start_index(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            offset(self.number, self.page_size) + 1
        }
    }

    /// 1-based index of the last item on this page
    pub fn end_index(&self) -> i64 {
        offset(self.number, self.page_size) + self.items.len() as i64
    }
}

/// Number of pages needed for `total` items; never less than one
pub fn num_pages(total: i64, page_size: u32) -> u32 {
    let page_size = i64::from(page_size.max(1));
    let pages = (total.max(0) + page_size - 1) / page_size;
    pages.max(1) as u32
}

/// Resolve the requested page leniently
///
/// A missing or non-numeric page yields the first page; a number outside
/// `1..=num_pages` yields the last page.
pub fn resolve_page(raw: Option<&str>, total: i64, page_size: u32) -> u32 {
    let last = num_pages(total, page_size);
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => 1,
        Some(raw) => match raw.parse::<i64>() {
            Err(_) => 1,
            Ok(n) if n < 1 || n > i64::from(last) => last,
            Ok(n) => n as u32,
        },
    }
}

/// Row offset of the first item on `number`
pub fn offset(number: u32, page_size: u32) -> i64 {
    i64::from(number.saturating_sub(1)) * i64::from(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_pages() {
        assert_eq!(num_pages(0, 25), 1);
        assert_eq!(num_pages(25, 25), 1);
        assert_eq!(num_pages(26, 25), 2);
        assert_eq!(num_pages(60, 25), 3);
    }

    #[test]
    fn test_resolve_page() {
        assert_eq!(resolve_page(None, 60, 25), 1);
        assert_eq!(resolve_page(Some("abc"), 60, 25), 1);
        assert_eq!(resolve_page(Some("2"), 60, 25), 2);
        assert_eq!(resolve_page(Some("99"), 60, 25), 3);
        assert_eq!(resolve_page(Some("0"), 60, 25), 3);
        assert_eq!(resolve_page(Some("-4"), 60, 25), 3);
        assert_eq!(resolve_page(Some("1"), 0, 25), 1);
    }

    #[test]
    fn test_page_navigation() {
        let page = Page {
            items: vec![(); 10],
            number: 3,
            num_pages: 3,
            total: 60,
            page_size: 25,
        };
        assert!(!page.has_next());
        assert_eq!(page.previous_page_number(), Some(2));
        assert_eq!(page.start_index(), 51);
        assert_eq!(page.end_index(), 60);
        assert!(page.is_paginated());
    }
}
