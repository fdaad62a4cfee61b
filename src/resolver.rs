//! Filename-keyed cache of EPUB chapter markup.
//!
//! Navigation hrefs and archive entry paths often disagree on directories or
//! casing, so lookups go by bare lowercase filename: an exact key first, then
//! the first key in archive order that contains the target or is contained by
//! it.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_MARKUP_ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(xhtml|html|htm)$").unwrap());

const EXCLUDED_PATH_PARTS: [&str; 3] = ["toc", "nav", "container"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub key: &'a str,
    pub markup: &'a str,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    entries: IndexMap<String, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an archive entry should be scanned into the cache.
    pub fn is_content_entry(path: &str) -> bool {
        if !RE_MARKUP_ENTRY.is_match(path) {
            return false;
        }
        let lower = path.to_lowercase();
        !EXCLUDED_PATH_PARTS.iter().any(|part| lower.contains(part))
    }

    /// Store `markup` under the bare lowercase filename of `path`. Returns
    /// `false` when the content is empty and nothing was stored.
    pub fn insert(&mut self, path: &str, markup: String) -> bool {
        if markup.is_empty() {
            return false;
        }
        let key = cache_key(path);
        debug!(key = %key, chars = markup.len(), "Cached content entry");
        self.entries.insert(key, markup);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Find the cached markup for a navigation href.
    pub fn resolve(&self, href: &str) -> Option<Resolved<'_>> {
        let target = cache_key(href);
        debug!(target = %target, keys = ?self.keys().collect::<Vec<_>>(), "Resolving content");

        if let Some((key, markup)) = self.entries.get_key_value(target.as_str()) {
            debug!(key = %key, "Exact content match");
            return Some(Resolved {
                key,
                markup,
                kind: MatchKind::Exact,
            });
        }

        let found = self
            .entries
            .iter()
            .find(|(key, _)| key.contains(target.as_str()) || target.contains(key.as_str()));
        match found {
            Some((key, markup)) => {
                debug!(key = %key, "Partial content match");
                Some(Resolved {
                    key,
                    markup,
                    kind: MatchKind::Fuzzy,
                })
            }
            None => {
                debug!(target = %target, "Content not found in cache");
                None
            }
        }
    }
}

/// Lowercase last path segment with any `#fragment` removed.
pub fn cache_key(path: &str) -> String {
    let without_fragment = path.split('#').next().unwrap_or_default();
    without_fragment
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
