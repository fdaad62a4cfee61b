//! EPUB loading: the navigation list and the chapter content cache.
//!
//! Navigation comes from the `epub` crate's parsed table of contents. Content
//! is read straight from the zip container so that every markup entry is
//! available by filename, whether or not the manifest lists it.

use crate::outline::{Destination, NavigationEntry};
use crate::resolver::ContentCache;
use anyhow::{Context, Result};
use epub::doc::{EpubDoc, NavPoint};
use scraper::{ElementRef, Html, Selector};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

#[derive(Debug, Clone, Default)]
pub struct EpubSource {
    pub navigation: Vec<NavigationEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: usize,
    pub failed: usize,
}

impl EpubSource {
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading EPUB navigation");
        let mut doc =
            EpubDoc::new(path).with_context(|| format!("Failed to open EPUB at {}", path.display()))?;
        let mut navigation: Vec<NavigationEntry> = doc.toc.iter().map(nav_entry).collect();
        if navigation.is_empty() {
            navigation = nav_document_entries(&mut doc);
        }
        info!(chapters = navigation.len(), "Loaded EPUB navigation");
        Ok(Self { navigation })
    }

    /// Navigation entry for a 1-based chapter index.
    pub fn chapter(&self, start: u32) -> Option<&NavigationEntry> {
        let idx = usize::try_from(start).ok()?.checked_sub(1)?;
        self.navigation.get(idx)
    }
}

fn nav_entry(point: &NavPoint) -> NavigationEntry {
    let href = point.content.to_string_lossy().replace('\\', "/");
    NavigationEntry::new(point.label.trim(), Destination::Href(href))
        .with_children(point.children.iter().map(nav_entry).collect())
}

/// EPUB 3 books may ship only a navigation document instead of an NCX.
fn nav_document_entries<R: Read + Seek>(doc: &mut EpubDoc<R>) -> Vec<NavigationEntry> {
    let Some(id) = doc.get_nav_id() else {
        debug!("No NCX entries and no navigation document");
        return Vec::new();
    };
    let base = doc
        .resources
        .get(&id)
        .and_then(|item| item.path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let Some((markup, _)) = doc.get_resource_str(&id) else {
        warn!(id = %id, "Navigation document could not be read");
        return Vec::new();
    };
    let entries = parse_nav_document(&markup, &base);
    debug!(entries = entries.len(), "Read EPUB 3 navigation document");
    entries
}

/// Top-level `ol > li` entries of the `toc` nav, with hrefs made relative to
/// the container root. Nested lists are not read; chapters come from the top
/// level only.
pub fn parse_nav_document(markup: &str, base: &Path) -> Vec<NavigationEntry> {
    let document = Html::parse_document(markup);
    let Ok(nav_selector) = Selector::parse("nav") else {
        return Vec::new();
    };
    let navs: Vec<ElementRef<'_>> = document.select(&nav_selector).collect();
    let toc = navs
        .iter()
        .copied()
        .find(|nav| {
            nav.value()
                .attr("epub:type")
                .is_some_and(|kinds| kinds.split_ascii_whitespace().any(|kind| kind == "toc"))
        })
        .or_else(|| navs.first().copied());
    let Some(toc) = toc else {
        return Vec::new();
    };
    let Some(list) = child_elements(toc).find(|el| el.value().name() == "ol") else {
        return Vec::new();
    };

    child_elements(list)
        .filter(|el| el.value().name() == "li")
        .filter_map(|item| {
            let link = child_elements(item).find(|el| matches!(el.value().name(), "a" | "span"))?;
            let label = link.text().collect::<Vec<_>>().join(" ");
            let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
            let destination = match link.value().attr("href") {
                Some(href) => {
                    let joined = base.join(href).to_string_lossy().replace('\\', "/");
                    Destination::Href(joined)
                }
                None => Destination::Unresolved,
            };
            Some(NavigationEntry::new(label, destination))
        })
        .collect()
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Scan the EPUB container and cache every content markup entry.
pub fn build_content_cache(path: &Path) -> Result<(ContentCache, CacheStats)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    scan_archive(BufReader::new(file))
        .with_context(|| format!("Failed to read EPUB container {}", path.display()))
}

pub fn scan_archive<R: Read + Seek>(reader: R) -> Result<(ContentCache, CacheStats)> {
    let mut archive = ZipArchive::new(reader).context("Not a zip container")?;
    let mut cache = ContentCache::new();
    let mut stats = CacheStats::default();
    debug!(entries = archive.len(), "Scanning archive entries");

    for idx in 0..archive.len() {
        let mut entry = match archive.by_index(idx) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(index = idx, "Failed to open archive entry: {err}");
                stats.failed += 1;
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !ContentCache::is_content_entry(&name) {
            continue;
        }

        let mut bytes = Vec::new();
        if let Err(err) = entry.read_to_end(&mut bytes) {
            warn!(entry = %name, "Failed to read archive entry: {err}");
            stats.failed += 1;
            continue;
        }
        let markup = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                debug!(entry = %name, "Entry is not valid UTF-8; decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        if cache.insert(&name, markup) {
            stats.cached += 1;
        } else {
            debug!(entry = %name, "Empty content entry");
            stats.failed += 1;
        }
    }

    info!(
        cached = stats.cached,
        failed = stats.failed,
        "Built content cache"
    );
    Ok((cache, stats))
}
