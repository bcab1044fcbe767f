use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Page selection using sequence-slice semantics over 0-based page indices.
///
/// `start` defaults to the first page and `end` (exclusive) to one past the last page. Negative
/// values count from the end, so `end = -1` drops only the last page. Out-of-range values clamp
/// and an inverted range selects nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// First selected page (inclusive).
    pub start: Option<i64>,
    /// Page after the last selected one (exclusive).
    pub end: Option<i64>,
}

impl PageRange {
    /// Select every page.
    pub const fn all() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Build a range from optional bounds.
    pub const fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// Resolve the selection against a document with `total` pages.
    pub fn resolve(&self, total: usize) -> Range<usize> {
        let start = self.start.map_or(0, |index| clamp_index(index, total));
        let end = self.end.map_or(total, |index| clamp_index(index, total));
        if start >= end { start..start } else { start..end }
    }
}

fn clamp_index(index: i64, total: usize) -> usize {
    let total_i = i64::try_from(total).unwrap_or(i64::MAX);
    let absolute = if index < 0 { total_i + index } else { index };
    absolute.clamp(0, total_i) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(range: PageRange, pages: &[&'static str]) -> Vec<&'static str> {
        pages[range.resolve(pages.len())].to_vec()
    }

    const PAGES: [&str; 5] = ["p0", "p1", "p2", "p3", "p4"];

    #[test]
    fn default_range_selects_everything() {
        assert_eq!(select(PageRange::all(), &PAGES), PAGES.to_vec());
    }

    #[test]
    fn negative_end_drops_only_last_page() {
        let range = PageRange::new(Some(0), Some(-1));
        assert_eq!(select(range, &PAGES), vec!["p0", "p1", "p2", "p3"]);
    }

    #[test]
    fn start_one_end_minus_one_on_three_pages_keeps_middle() {
        let range = PageRange::new(Some(1), Some(-1));
        assert_eq!(select(range, &["A", "B", "C"]), vec!["B"]);
    }

    #[test]
    fn negative_start_counts_from_end() {
        let range = PageRange::new(Some(-2), None);
        assert_eq!(select(range, &PAGES), vec!["p3", "p4"]);
    }

    #[test]
    fn out_of_range_bounds_clamp() {
        assert_eq!(select(PageRange::new(Some(3), Some(99)), &PAGES), vec!["p3", "p4"]);
        assert_eq!(select(PageRange::new(Some(-99), Some(2)), &PAGES), vec!["p0", "p1"]);
        assert!(select(PageRange::new(Some(10), None), &PAGES).is_empty());
    }

    #[test]
    fn inverted_or_empty_ranges_select_nothing() {
        assert!(select(PageRange::new(Some(3), Some(1)), &PAGES).is_empty());
        assert!(select(PageRange::new(Some(2), Some(2)), &PAGES).is_empty());
        assert!(select(PageRange::new(Some(1), Some(0)), &PAGES).is_empty());
        assert!(select(PageRange::new(Some(0), Some(-5)), &PAGES).is_empty());
    }

    #[test]
    fn resolving_against_empty_document_is_empty() {
        assert_eq!(PageRange::new(Some(0), Some(-1)).resolve(0), 0..0);
        assert_eq!(PageRange::all().resolve(0), 0..0);
    }
}
