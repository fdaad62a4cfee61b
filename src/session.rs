//! The single active document session.
//!
//! A session exists for exactly one loaded file and owns everything derived
//! from it: the parsed document, the EPUB content cache, the range rows and the
//! preview state. Loading another file builds a fresh session; dropping the
//! session is how a file is removed.

use crate::archive::ExportArchive;
use crate::config::AppConfig;
use crate::document::DocumentKind;
use crate::epub_loader::{self, CacheStats, EpubSource};
use crate::export::{self, ExportReport};
use crate::layout::TextPdfWriter;
use crate::outline::{flatten_epub_navigation, flatten_pdf_outline};
use crate::pdf::PdfSource;
use crate::preview::{PreviewController, PreviewRequest, render_preview};
use crate::ranges::RangeModel;
use crate::resolver::ContentCache;
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum LoadedDocument {
    Pdf(PdfSource),
    Epub {
        source: EpubSource,
        cache: ContentCache,
        stats: CacheStats,
    },
}

/// Outcome of table-of-contents detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoDetect {
    /// Number of entries found before empty spans were dropped.
    Found(usize),
    NoChapters,
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub archive_name: String,
    pub bytes: Vec<u8>,
    pub files: Vec<String>,
    pub report: ExportReport,
}

#[derive(Debug)]
pub struct Session {
    source_path: PathBuf,
    kind: DocumentKind,
    document: LoadedDocument,
    ranges: RangeModel,
    preview: PreviewController,
}

impl Session {
    /// Open `path`. Inputs that are neither PDF nor EPUB are rejected before
    /// anything is read.
    pub fn load(path: &Path, declared_mime: Option<&str>) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let Some(kind) = DocumentKind::sniff(file_name, declared_mime) else {
            bail!(
                "unsupported input {}: only PDF and EPUB files are supported",
                path.display()
            );
        };

        let document = match kind {
            DocumentKind::Pdf => LoadedDocument::Pdf(PdfSource::load(path)?),
            DocumentKind::Epub => {
                let source = EpubSource::load(path)?;
                let (cache, stats) = epub_loader::build_content_cache(path)?;
                if cache.is_empty() {
                    warn!(path = %path.display(), "No readable chapter content in EPUB");
                }
                info!(
                    files = cache.len(),
                    failed = stats.failed,
                    chapters = source.navigation.len(),
                    "EPUB ready"
                );
                LoadedDocument::Epub {
                    source,
                    cache,
                    stats,
                }
            }
        };
        Ok(Self::from_document(path.to_path_buf(), document))
    }

    pub fn from_document(source_path: PathBuf, document: LoadedDocument) -> Self {
        let kind = match &document {
            LoadedDocument::Pdf(_) => DocumentKind::Pdf,
            LoadedDocument::Epub { .. } => DocumentKind::Epub,
        };
        let preview = PreviewController::new(Self::page_total(&document));
        Self {
            source_path,
            kind,
            document,
            ranges: RangeModel::new(),
            preview,
        }
    }

    fn page_total(document: &LoadedDocument) -> u32 {
        match document {
            LoadedDocument::Pdf(pdf) => pdf.page_count(),
            LoadedDocument::Epub { source, .. } => source.navigation.len() as u32,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Content cache counts for an EPUB session.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        match &self.document {
            LoadedDocument::Epub { stats, .. } => Some(*stats),
            LoadedDocument::Pdf(_) => None,
        }
    }

    /// Pages for a PDF, top-level chapters for an EPUB.
    pub fn preview_total(&self) -> u32 {
        Self::page_total(&self.document)
    }

    pub fn ranges(&self) -> &RangeModel {
        &self.ranges
    }

    pub fn ranges_mut(&mut self) -> &mut RangeModel {
        &mut self.ranges
    }

    /// Replace the range rows with the document's table of contents. With no
    /// usable entries the rows fall back to a single blank one.
    pub fn auto_detect(&mut self) -> AutoDetect {
        let detected = match &self.document {
            LoadedDocument::Pdf(pdf) => {
                let flat = flatten_pdf_outline(&pdf.outline(), pdf.page_count());
                (flat.detected > 0).then_some((flat.ranges, flat.detected))
            }
            LoadedDocument::Epub { source, .. } => {
                let ranges = flatten_epub_navigation(&source.navigation);
                let count = ranges.len();
                (count > 0).then_some((ranges, count))
            }
        };

        match detected {
            Some((ranges, count)) => {
                self.ranges.seed(ranges);
                info!(count, kind = %self.kind, "Chapters found");
                AutoDetect::Found(count)
            }
            None => {
                warn!(kind = %self.kind, "No chapter structure found");
                self.ranges.clear();
                AutoDetect::NoChapters
            }
        }
    }

    /// Text for the given preview position: a page for PDFs, a chapter index
    /// for EPUBs. `None` when a newer request superseded this one.
    pub fn preview(&mut self, page: i64) -> Result<Option<String>> {
        let request = self.preview.go_to_page(page);
        self.render(&request)
    }

    /// Advance one page from the last preview; stays put on the last page.
    pub fn preview_next(&mut self) -> Result<Option<String>> {
        let request = self.preview.next_page();
        self.render(&request)
    }

    pub fn preview_page(&self) -> u32 {
        self.preview.current_page()
    }

    fn render(&self, request: &PreviewRequest) -> Result<Option<String>> {
        match &self.document {
            LoadedDocument::Pdf(pdf) => render_preview(request, |page| pdf.page_text(page)),
            LoadedDocument::Epub { source, cache, .. } => render_preview(request, |page| {
                Ok(source
                    .chapter(page)
                    .and_then(|chapter| chapter.href())
                    .map(|href| export::chapter_text(href, cache))
                    .unwrap_or_default())
            }),
        }
    }

    /// Export the current ranges and package them into one zip.
    pub fn export(&self, config: &AppConfig) -> Result<ExportOutcome> {
        let ranges = self.ranges.to_export_list();
        if ranges.is_empty() {
            bail!("no ranges to export");
        }

        let mut archive = ExportArchive::new();
        let (report, archive_name) = match &self.document {
            LoadedDocument::Pdf(pdf) => (
                export::export_pdf(pdf, &ranges, &mut archive)?,
                config.output.pdf_archive_name.clone(),
            ),
            LoadedDocument::Epub { source, cache, .. } => {
                let writer = TextPdfWriter::new(config.layout);
                (
                    export::export_epub(source, cache, &ranges, &writer, &mut archive),
                    config.output.epub_archive_name.clone(),
                )
            }
        };

        if archive.is_empty() {
            warn!("No range produced a file; the archive will be empty");
        }
        info!(
            files = archive.len(),
            exported = report.exported,
            skipped = report.skipped,
            failed = report.failed,
            "Packaging archive"
        );
        let files = archive.filenames().map(str::to_string).collect();
        let bytes = archive.finish()?;
        Ok(ExportOutcome {
            archive_name,
            bytes,
            files,
            report,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // an in-flight preview must not outlive its document
        self.preview.cancel();
        debug!(path = %self.source_path.display(), "Session closed");
    }
}
