//! Table-of-contents flattening.
//!
//! A PDF outline is an arbitrarily deep tree whose entries point at pages; an
//! EPUB navigation list is a sequence of hrefs. Both are turned into the flat
//! `Range` list that seeds the range editor.

use crate::ranges::Range;
use tracing::debug;

/// Where a table-of-contents entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// 0-based page index.
    Page(u32),
    /// Archive-relative path, fragment included.
    Href(String),
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    pub label: String,
    pub destination: Destination,
    pub children: Vec<NavigationEntry>,
}

impl NavigationEntry {
    pub fn new(label: impl Into<String>, destination: Destination) -> Self {
        Self {
            label: label.into(),
            destination,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<NavigationEntry>) -> Self {
        self.children = children;
        self
    }

    pub fn href(&self) -> Option<&str> {
        match &self.destination {
            Destination::Href(href) => Some(href),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedOutline {
    pub ranges: Vec<Range>,
    /// Entries that resolved to a page, before degenerate spans were dropped.
    pub detected: usize,
}

/// Flatten a PDF outline into page ranges.
///
/// Entries are collected depth-first (parent before children), stably sorted
/// by start page, and each one ends the page before the next begins; the last
/// ends at `total_pages`. Spans that would be empty are dropped.
pub fn flatten_pdf_outline(entries: &[NavigationEntry], total_pages: u32) -> FlattenedOutline {
    let mut starts = Vec::new();
    collect_page_starts(entries, &mut starts);
    starts.sort_by_key(|(_, start)| *start);

    let detected = starts.len();
    let mut ranges = Vec::with_capacity(detected);
    for (idx, (title, start)) in starts.iter().enumerate() {
        let end = match starts.get(idx + 1) {
            Some((_, next_start)) => next_start.saturating_sub(1),
            None => total_pages,
        };
        if *start <= end {
            ranges.push(Range::new(*start, Some(end), title.clone()));
        } else {
            debug!(title = %title, start, end, "Dropping empty outline span");
        }
    }

    FlattenedOutline { ranges, detected }
}

fn collect_page_starts(entries: &[NavigationEntry], out: &mut Vec<(String, u32)>) {
    for entry in entries {
        if let Destination::Page(index) = entry.destination {
            match index.checked_add(1) {
                Some(start) => out.push((entry.label.clone(), start)),
                None => debug!(title = %entry.label, index, "Dropping outline entry past the last page"),
            }
        }
        collect_page_starts(&entry.children, out);
    }
}

/// EPUB navigation keeps its given order; entry `i` becomes chapter `i + 1`.
pub fn flatten_epub_navigation(entries: &[NavigationEntry]) -> Vec<Range> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| Range::new(idx as u32 + 1, None, entry.label.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(label: &str, index: u32) -> NavigationEntry {
        NavigationEntry::new(label, Destination::Page(index))
    }

    fn assert_contiguous(ranges: &[Range], total_pages: u32) {
        for pair in ranges.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert_eq!(pair[0].end, Some(pair[1].start - 1));
        }
        if let Some(last) = ranges.last() {
            assert_eq!(last.end, Some(total_pages));
        }
    }

    #[test]
    fn nested_outline_is_sorted_and_contiguous() {
        let outline = vec![
            page("Part I", 0).with_children(vec![page("Ch 1", 1), page("Ch 2", 5)]),
            page("Part II", 9).with_children(vec![page("Ch 3", 10)]),
            page("Appendix", 3),
        ];
        let flat = flatten_pdf_outline(&outline, 20);
        let titles: Vec<_> = flat.ranges.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Part I", "Ch 1", "Appendix", "Ch 2", "Part II", "Ch 3"]
        );
        assert_eq!(flat.ranges[0], Range::new(1, Some(1), "Part I"));
        assert_eq!(flat.ranges[5], Range::new(11, Some(20), "Ch 3"));
        assert_contiguous(&flat.ranges, 20);
    }

    #[test]
    fn page_index_at_the_numeric_limit_is_dropped() {
        let outline = vec![page("Broken", u32::MAX), page("Real", 1)];
        let flat = flatten_pdf_outline(&outline, 5);
        assert_eq!(flat.detected, 1);
        assert_eq!(flat.ranges, vec![Range::new(2, Some(5), "Real")]);
    }

    #[test]
    fn duplicate_starts_drop_the_earlier_entry() {
        let outline = vec![page("Cover", 0), page("Title", 0), page("Body", 2)];
        let flat = flatten_pdf_outline(&outline, 4);
        assert_eq!(flat.detected, 3);
        assert_eq!(
            flat.ranges,
            vec![Range::new(1, Some(2), "Title"), Range::new(3, Some(4), "Body")]
        );
    }

    #[test]
    fn ties_keep_traversal_order() {
        let outline = vec![page("B", 4), page("A", 4)];
        let flat = flatten_pdf_outline(&outline, 9);
        // B ends before A starts and is dropped; A survives.
        assert_eq!(flat.ranges, vec![Range::new(5, Some(9), "A")]);
    }

    #[test]
    fn unresolved_parents_still_contribute_children() {
        let outline = vec![
            NavigationEntry::new("Broken", Destination::Unresolved)
                .with_children(vec![page("Inner", 2)]),
        ];
        let flat = flatten_pdf_outline(&outline, 5);
        assert_eq!(flat.ranges, vec![Range::new(3, Some(5), "Inner")]);
    }

    #[test]
    fn flattening_its_own_output_is_stable() {
        let outline = vec![page("a", 0), page("b", 0), page("c", 6), page("d", 3)];
        let first = flatten_pdf_outline(&outline, 12);
        let again: Vec<NavigationEntry> = first
            .ranges
            .iter()
            .map(|r| page(&r.name, r.start - 1))
            .collect();
        assert_eq!(flatten_pdf_outline(&again, 12).ranges, first.ranges);
    }

    #[test]
    fn empty_outline_yields_nothing() {
        let flat = flatten_pdf_outline(&[], 10);
        assert!(flat.ranges.is_empty());
        assert_eq!(flat.detected, 0);
    }

    #[test]
    fn epub_navigation_keeps_order_and_ignores_nesting() {
        let nav = vec![
            NavigationEntry::new("Intro", Destination::Href("text/intro.xhtml".into()))
                .with_children(vec![NavigationEntry::new(
                    "Nested",
                    Destination::Href("text/nested.xhtml".into()),
                )]),
            NavigationEntry::new("Ch1", Destination::Href("text/ch1.xhtml".into())),
        ];
        assert_eq!(
            flatten_epub_navigation(&nav),
            vec![Range::new(1, None, "Intro"), Range::new(2, None, "Ch1")]
        );
    }
}
