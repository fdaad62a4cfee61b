//! PDF source documents: page count, outline tree, page copy and page text.
//!
//! Outline destinations may be explicit arrays, `GoTo` actions, or names
//! looked up in the catalog `/Dests` dictionary or the `/Names` tree. Every
//! destination is resolved to a 0-based page index here so the flattener only
//! deals in page numbers.

use crate::outline::{Destination, NavigationEntry};
use anyhow::{Context, Result, anyhow};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub struct PdfSource {
    doc: Document,
    /// 1-based page number to page object.
    pages: BTreeMap<u32, ObjectId>,
}

impl std::fmt::Debug for PdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfSource")
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl PdfSource {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read PDF at {}", path.display()))?;
        let source = Self::from_bytes(&bytes)
            .with_context(|| format!("Failed to open PDF at {}", path.display()))?;
        info!(path = %path.display(), pages = source.page_count(), "Loaded PDF");
        Ok(source)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).context("Failed to parse PDF bytes")?;
        Ok(Self::from_document(doc))
    }

    fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages();
        Self { doc, pages }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Build a new document holding exactly the pages at `indices` (0-based,
    /// ascending) and serialize it.
    pub fn copy_pages(&self, indices: &[u32]) -> Result<Vec<u8>> {
        let keep: HashSet<u32> = indices.iter().map(|idx| idx + 1).collect();
        if keep.iter().any(|page| !self.pages.contains_key(page)) {
            return Err(anyhow!(
                "page index out of bounds for a {}-page document",
                self.page_count()
            ));
        }

        let mut copy = self.doc.clone();
        let drop: Vec<u32> = self
            .pages
            .keys()
            .copied()
            .filter(|page| !keep.contains(page))
            .collect();
        if !drop.is_empty() {
            copy.delete_pages(&drop);
        }
        // Outline entries would point at pages that no longer exist.
        if let Ok(root_id) = copy.trailer.get(b"Root").and_then(Object::as_reference) {
            if let Ok(catalog) = copy.get_object_mut(root_id).and_then(Object::as_dict_mut) {
                catalog.remove(b"Outlines");
            }
        }
        copy.prune_objects();
        copy.compress();

        let mut buffer = Vec::new();
        copy.save_to(&mut buffer)
            .context("Failed to serialize copied pages")?;
        debug!(pages = indices.len(), bytes = buffer.len(), "Copied PDF pages");
        Ok(buffer)
    }

    /// Text of a 1-based page, as lopdf extracts it.
    pub fn page_text(&self, page: u32) -> Result<String> {
        self.doc
            .extract_text(&[page])
            .with_context(|| format!("Failed to extract text from page {page}"))
    }

    /// Read the document outline. A document without one yields an empty list.
    pub fn outline(&self) -> Vec<NavigationEntry> {
        let Some(catalog) = self.catalog() else {
            return Vec::new();
        };
        let Some(outlines) = catalog
            .get(b"Outlines")
            .ok()
            .and_then(|obj| self.resolve_dict(obj))
        else {
            debug!("Document has no outline");
            return Vec::new();
        };

        let page_lookup: HashMap<ObjectId, u32> = self
            .pages
            .iter()
            .map(|(number, id)| (*id, number - 1))
            .collect();
        let names = NamedDestinations::collect(self, catalog);
        let mut visited = HashSet::new();
        let reader = OutlineReader {
            source: self,
            page_lookup: &page_lookup,
            names: &names,
        };
        reader.siblings(outlines.get(b"First").ok(), 0, &mut visited)
    }

    fn catalog(&self) -> Option<&Dictionary> {
        let root = self.doc.trailer.get(b"Root").ok()?;
        self.resolve_dict(root)
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        self.resolve(obj).and_then(|obj| obj.as_dict().ok())
    }

    fn resolve_array<'a>(&'a self, obj: &'a Object) -> Option<&'a Vec<Object>> {
        self.resolve(obj).and_then(|obj| obj.as_array().ok())
    }
}

const MAX_OUTLINE_DEPTH: usize = 64;

struct OutlineReader<'a> {
    source: &'a PdfSource,
    page_lookup: &'a HashMap<ObjectId, u32>,
    names: &'a NamedDestinations,
}

impl OutlineReader<'_> {
    fn siblings(
        &self,
        first: Option<&Object>,
        depth: usize,
        visited: &mut HashSet<ObjectId>,
    ) -> Vec<NavigationEntry> {
        let mut entries = Vec::new();
        if depth > MAX_OUTLINE_DEPTH {
            warn!(depth, "Outline nested too deeply; ignoring deeper levels");
            return entries;
        }
        let mut cursor = first.and_then(|obj| obj.as_reference().ok());
        while let Some(id) = cursor {
            if !visited.insert(id) {
                warn!(?id, "Outline cycle detected; stopping traversal");
                break;
            }
            let Some(item) = self
                .source
                .doc
                .get_object(id)
                .ok()
                .and_then(|obj| obj.as_dict().ok())
            else {
                break;
            };

            let label = item
                .get(b"Title")
                .ok()
                .and_then(|obj| self.source.resolve(obj))
                .and_then(|obj| obj.as_str().ok())
                .map(decode_text_string)
                .unwrap_or_default();
            let destination = self.destination(item);
            let children = self.siblings(item.get(b"First").ok(), depth + 1, visited);
            entries.push(NavigationEntry::new(label, destination).with_children(children));

            cursor = item.get(b"Next").ok().and_then(|obj| obj.as_reference().ok());
        }
        entries
    }

    fn destination(&self, item: &Dictionary) -> Destination {
        let target = item.get(b"Dest").ok().or_else(|| {
            let action = item
                .get(b"A")
                .ok()
                .and_then(|obj| self.source.resolve_dict(obj))?;
            let is_goto = action
                .get(b"S")
                .ok()
                .and_then(|obj| obj.as_name().ok())
                .is_some_and(|name| name == b"GoTo");
            if is_goto { action.get(b"D").ok() } else { None }
        });
        target
            .and_then(|obj| self.page_for(obj, 0))
            .map(Destination::Page)
            .unwrap_or(Destination::Unresolved)
    }

    fn page_for(&self, obj: &Object, depth: usize) -> Option<u32> {
        if depth > 8 {
            return None;
        }
        let resolved = self.source.resolve(obj)?;
        match resolved {
            Object::Array(items) => match items.first()? {
                Object::Reference(page_id) => self.page_lookup.get(page_id).copied(),
                // Remote-style destinations carry a page number directly.
                Object::Integer(index) => u32::try_from(*index)
                    .ok()
                    .filter(|index| *index < self.source.page_count()),
                _ => None,
            },
            Object::Name(name) | Object::String(name, _) => {
                let dest = self.names.get(name)?;
                self.page_for(dest, depth + 1)
            }
            Object::Dictionary(dict) => self.page_for(dict.get(b"D").ok()?, depth + 1),
            _ => None,
        }
    }
}

/// Named destinations from both the PDF 1.1 `/Dests` dictionary and the
/// `/Names /Dests` name tree.
struct NamedDestinations {
    entries: HashMap<Vec<u8>, Object>,
}

impl NamedDestinations {
    fn collect(source: &PdfSource, catalog: &Dictionary) -> Self {
        let mut entries = HashMap::new();
        if let Some(dests) = catalog
            .get(b"Dests")
            .ok()
            .and_then(|obj| source.resolve_dict(obj))
        {
            for (name, value) in dests.iter() {
                entries.insert(name.clone(), value.clone());
            }
        }
        if let Some(tree) = catalog
            .get(b"Names")
            .ok()
            .and_then(|obj| source.resolve_dict(obj))
            .and_then(|names| names.get(b"Dests").ok())
            .and_then(|obj| source.resolve_dict(obj))
        {
            let mut visited = HashSet::new();
            walk_name_tree(source, tree, &mut entries, &mut visited);
        }
        if !entries.is_empty() {
            debug!(count = entries.len(), "Collected named destinations");
        }
        Self { entries }
    }

    fn get(&self, name: &[u8]) -> Option<&Object> {
        self.entries.get(name)
    }
}

fn walk_name_tree(
    source: &PdfSource,
    node: &Dictionary,
    entries: &mut HashMap<Vec<u8>, Object>,
    visited: &mut HashSet<ObjectId>,
) {
    if let Some(pairs) = node.get(b"Names").ok().and_then(|obj| source.resolve_array(obj)) {
        for pair in pairs.chunks(2) {
            if let [key, value] = pair {
                if let Ok(key) = key.as_str() {
                    entries.insert(key.to_vec(), value.clone());
                }
            }
        }
    }
    if let Some(kids) = node.get(b"Kids").ok().and_then(|obj| source.resolve_array(obj)) {
        for kid in kids {
            if let Ok(id) = kid.as_reference() {
                if !visited.insert(id) {
                    continue;
                }
            }
            if let Some(child) = source.resolve_dict(kid) {
                walk_name_tree(source, child, entries, visited);
            }
        }
    }
}

/// PDF text strings are UTF-16BE with a byte-order mark, or PDFDocEncoding,
/// which matches Latin-1 for printable text.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}
