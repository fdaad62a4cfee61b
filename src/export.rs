//! Turning ranges into archive entries.
//!
//! Each range is one unit of work. In EPUB mode a failure while producing one
//! chapter becomes an `error_<start>.txt` entry and the loop moves on; only the
//! final zip serialization can fail the whole export.

use crate::archive::{ExportArchive, ExportedFile};
use crate::epub_loader::EpubSource;
use crate::extract::extract_text;
use crate::layout::ChapterWriter;
use crate::pdf::PdfSource;
use crate::ranges::Range;
use crate::resolver::ContentCache;
use crate::text_utils::{
    normalize_whitespace, sanitize_epub_filename, sanitize_pdf_filename, transliterate_turkish,
};
use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Copy each complete page range into its own PDF.
pub fn export_pdf(
    source: &PdfSource,
    ranges: &[Range],
    archive: &mut ExportArchive,
) -> Result<ExportReport> {
    let total_pages = source.page_count();
    let mut report = ExportReport::default();

    for range in ranges {
        let Some(end) = range.end else {
            debug!(start = range.start, "Range has no end; skipping");
            report.skipped += 1;
            continue;
        };
        let indices = clamped_page_indices(range.start, end, total_pages);
        if indices.is_empty() {
            debug!(start = range.start, end, total_pages, "Range selects no pages; skipping");
            report.skipped += 1;
            continue;
        }

        let bytes = source
            .copy_pages(&indices)
            .with_context(|| format!("Failed to copy pages {}-{}", range.start, end))?;
        let filename = pdf_range_filename(range, end);
        info!(filename = %filename, pages = indices.len(), "Exported PDF range");
        archive.add(ExportedFile { filename, bytes });
        report.exported += 1;
    }
    Ok(report)
}

/// 0-based indices for pages `start..=end` (1-based) that exist in the document.
pub fn clamped_page_indices(start: u32, end: u32, total_pages: u32) -> Vec<u32> {
    if start == 0 || start > end {
        return Vec::new();
    }
    let last = end.min(total_pages);
    (start..=last).map(|page| page - 1).collect()
}

fn pdf_range_filename(range: &Range, end: u32) -> String {
    let raw = if range.name.is_empty() {
        format!("chapter_{}-{}.pdf", range.start, end)
    } else {
        format!("{}.pdf", range.name)
    };
    sanitize_pdf_filename(&raw)
}

/// Render each selected EPUB chapter to its own PDF.
pub fn export_epub(
    source: &EpubSource,
    cache: &ContentCache,
    ranges: &[Range],
    writer: &dyn ChapterWriter,
    archive: &mut ExportArchive,
) -> ExportReport {
    let mut report = ExportReport::default();

    for range in ranges {
        let Some(chapter) = source.chapter(range.start) else {
            debug!(start = range.start, "No navigation entry for chapter index; skipping");
            report.skipped += 1;
            continue;
        };
        let label: String = chapter.label.chars().take(30).collect();
        info!(chapter = %label, "Processing chapter");

        match render_chapter(range, &chapter.label, chapter.href(), cache, writer) {
            Ok(file) => {
                archive.add(file);
                report.exported += 1;
            }
            Err(err) => {
                warn!(start = range.start, "Chapter export failed: {err:#}");
                archive.add(ExportedFile {
                    filename: format!("error_{}.txt", range.start),
                    bytes: format!("Error: {err:#}").into_bytes(),
                });
                report.failed += 1;
            }
        }
    }
    report
}

fn render_chapter(
    range: &Range,
    label: &str,
    href: Option<&str>,
    cache: &ContentCache,
    writer: &dyn ChapterWriter,
) -> Result<ExportedFile> {
    let href = href.ok_or_else(|| anyhow!("chapter {label:?} has no content reference"))?;
    let text = chapter_text(href, cache);
    let title = transliterate_turkish(label);
    let bytes = writer
        .render(&title, &text)
        .with_context(|| format!("Failed to render chapter {label:?}"))?;

    let stem_source = if range.name.is_empty() {
        label
    } else {
        range.name.as_str()
    };
    let stem = sanitize_epub_filename(stem_source, range.start);
    Ok(ExportedFile {
        filename: format!("{stem}.pdf"),
        bytes,
    })
}

/// Clean body text for the chapter at `href`, or a placeholder naming the
/// href when nothing usable was found.
pub fn chapter_text(href: &str, cache: &ContentCache) -> String {
    let extracted = cache
        .resolve(href)
        .map(|hit| {
            debug!(href = %href, key = %hit.key, kind = ?hit.kind, "Chapter content resolved");
            extract_text(hit.markup)
        })
        .unwrap_or_default();
    let text = if extracted.chars().all(char::is_whitespace) {
        warn!(href = %href, "Chapter content not found or empty");
        not_found_placeholder(href)
    } else {
        extracted
    };
    transliterate_turkish(&normalize_whitespace(&text))
}

fn not_found_placeholder(href: &str) -> String {
    format!(
        "[CONTENT NOT FOUND]\n\nSearched: {href}\n\nRun with RUST_LOG=debug to see the content lookup."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::layout::TextPdfWriter;
    use crate::outline::{Destination, NavigationEntry};
    use crate::pdf::tests::build_pdf;
    use std::cell::RefCell;

    #[test]
    fn page_indices_are_clamped_to_the_document() {
        assert_eq!(clamped_page_indices(3, 5, 10), vec![2, 3, 4]);
        assert_eq!(clamped_page_indices(8, 15, 10), vec![7, 8, 9]);
        assert!(clamped_page_indices(11, 12, 10).is_empty());
        assert!(clamped_page_indices(6, 4, 10).is_empty());
        assert!(clamped_page_indices(0, 4, 10).is_empty());
    }

    #[test]
    fn pdf_export_skips_incomplete_and_empty_ranges() {
        let source = PdfSource::from_bytes(&build_pdf(10, &[])).unwrap();
        let ranges = vec![
            Range::new(3, Some(5), ""),
            Range::new(6, None, "No end"),
            Range::new(20, Some(25), "Past the end"),
            Range::new(9, Some(12), "Tail: part/2"),
        ];
        let mut archive = ExportArchive::new();
        let report = export_pdf(&source, &ranges, &mut archive).unwrap();
        assert_eq!(
            report,
            ExportReport {
                exported: 2,
                skipped: 2,
                failed: 0
            }
        );
        assert_eq!(
            archive.filenames().collect::<Vec<_>>(),
            vec!["chapter_3-5.pdf", "Tail part2.pdf"]
        );

        let first = PdfSource::from_bytes(archive.get("chapter_3-5.pdf").unwrap()).unwrap();
        assert_eq!(first.page_count(), 3);
        assert!(first.page_text(1).unwrap().contains("Page 3"));
        assert!(first.page_text(3).unwrap().contains("Page 5"));
        let tail = PdfSource::from_bytes(archive.get("Tail part2.pdf").unwrap()).unwrap();
        assert_eq!(tail.page_count(), 2);
    }

    /// Records what it was asked to render; fails for titles starting with `!`.
    #[derive(Default)]
    struct RecordingWriter {
        rendered: RefCell<Vec<(String, String)>>,
    }

    impl ChapterWriter for RecordingWriter {
        fn render(&self, title: &str, body: &str) -> Result<Vec<u8>> {
            if title.starts_with('!') {
                return Err(anyhow!("layout exploded"));
            }
            self.rendered
                .borrow_mut()
                .push((title.to_string(), body.to_string()));
            Ok(body.as_bytes().to_vec())
        }
    }

    fn nav(entries: &[(&str, &str)]) -> EpubSource {
        EpubSource {
            navigation: entries
                .iter()
                .map(|(label, href)| {
                    NavigationEntry::new(*label, Destination::Href(href.to_string()))
                })
                .collect(),
        }
    }

    fn cache(entries: &[(&str, &str)]) -> ContentCache {
        let mut cache = ContentCache::new();
        for (path, markup) in entries {
            cache.insert(path, markup.to_string());
        }
        cache
    }

    #[test]
    fn epub_export_extracts_each_chapter() {
        let source = nav(&[("Intro", "text/intro.xhtml"), ("Ch1", "text/ch1.xhtml")]);
        let cache = cache(&[
            ("intro.xhtml", "<html><body><p>Hi</p></body></html>"),
            (
                "ch1.xhtml",
                "<html><body><p>One</p><img alt='x'></body></html>",
            ),
        ]);
        let ranges = vec![Range::new(1, None, "Intro"), Range::new(2, None, "Ch1")];
        let writer = RecordingWriter::default();
        let mut archive = ExportArchive::new();

        let report = export_epub(&source, &cache, &ranges, &writer, &mut archive);

        assert_eq!(report.exported, 2);
        assert_eq!(
            archive.filenames().collect::<Vec<_>>(),
            vec!["Intro.pdf", "Ch1.pdf"]
        );
        let rendered = writer.rendered.borrow();
        assert_eq!(rendered[0], ("Intro".to_string(), "Hi".to_string()));
        assert!(rendered[1].1.contains("One"));
        assert!(rendered[1].1.contains("[Image: x]"));
        assert!(extract_text(cache.resolve("ch1.xhtml").unwrap().markup).contains(" [Image: x] "));
    }

    #[test]
    fn missing_content_becomes_a_placeholder_chapter() {
        let source = nav(&[("Lost", "text/lost.xhtml#frag")]);
        let cache = cache(&[("ch1.xhtml", "<p>One</p>")]);
        let writer = RecordingWriter::default();
        let mut archive = ExportArchive::new();

        let report = export_epub(&source, &cache, &[Range::new(1, None, "")], &writer, &mut archive);

        assert_eq!(report.exported, 1);
        let rendered = writer.rendered.borrow();
        assert!(rendered[0].1.starts_with("[CONTENT NOT FOUND]"));
        assert!(rendered[0].1.contains("text/lost.xhtml#frag"));
        assert_eq!(archive.filenames().collect::<Vec<_>>(), vec!["Lost.pdf"]);
    }

    #[test]
    fn failing_chapter_is_isolated_as_error_file() {
        let source = nav(&[("!Broken", "a.xhtml"), ("Fine", "b.xhtml")]);
        let cache = cache(&[("a.xhtml", "<p>A</p>"), ("b.xhtml", "<p>B</p>")]);
        let ranges = vec![
            Range::new(1, None, ""),
            Range::new(2, None, ""),
            Range::new(9, None, "missing index"),
        ];
        let writer = RecordingWriter::default();
        let mut archive = ExportArchive::new();

        let report = export_epub(&source, &cache, &ranges, &writer, &mut archive);

        assert_eq!(
            report,
            ExportReport {
                exported: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(
            archive.filenames().collect::<Vec<_>>(),
            vec!["error_1.txt", "Fine.pdf"]
        );
        let error = String::from_utf8(archive.get("error_1.txt").unwrap().to_vec()).unwrap();
        assert!(error.starts_with("Error: "));
        assert!(error.contains("layout exploded"));
    }

    #[test]
    fn chapter_names_fall_back_to_label_then_index() {
        let source = nav(&[("Bölüm 1", "a.xhtml"), ("ğğ", "b.xhtml")]);
        let cache = cache(&[("a.xhtml", "<p>A</p>"), ("b.xhtml", "<p>B</p>")]);
        let ranges = vec![Range::new(1, None, ""), Range::new(2, None, "")];
        let writer = RecordingWriter::default();
        let mut archive = ExportArchive::new();

        export_epub(&source, &cache, &ranges, &writer, &mut archive);

        assert_eq!(
            archive.filenames().collect::<Vec<_>>(),
            vec!["Blm 1.pdf", "chapter_2.pdf"]
        );
        // titles are transliterated for the layout fonts
        assert_eq!(writer.rendered.borrow()[0].0, "Bolum 1");
    }

    #[test]
    fn chapter_text_is_normalized_and_transliterated() {
        let cache = cache(&[(
            "c.xhtml",
            "<body><p>Güneş\tışığı</p><p></p><p></p><p>Son</p></body>",
        )]);
        assert_eq!(chapter_text("c.xhtml", &cache), "Gunes isigi\n\nSon");
    }

    #[test]
    fn real_writer_produces_pdf_entries() {
        let source = nav(&[("Intro", "intro.xhtml")]);
        let cache = cache(&[("intro.xhtml", "<p>Hello there</p>")]);
        let writer = TextPdfWriter::new(LayoutConfig::default());
        let mut archive = ExportArchive::new();
        export_epub(&source, &cache, &[Range::new(1, None, "")], &writer, &mut archive);
        let bytes = archive.get("Intro.pdf").unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
