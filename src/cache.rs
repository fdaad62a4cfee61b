//! Remembers the last exported ranges per source document.
//!
//! Files are stored under `.cache/` using a hash of the source path as the
//! directory name to avoid filesystem issues. The format is the same
//! `[[range]]` TOML that `--ranges` accepts.

use crate::ranges::{Range, RangeFile};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CACHE_DIR: &str = ".cache";

pub fn hash_dir(root: &Path, source_path: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_os_str().to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    root.join(hash)
}

fn ranges_path(root: &Path, source_path: &Path) -> PathBuf {
    hash_dir(root, source_path).join("ranges.toml")
}

/// Ranges saved for `source_path`, if any. Unreadable or invalid files count
/// as absent.
pub fn load_ranges(root: &Path, source_path: &Path) -> Option<Vec<Range>> {
    let data = fs::read_to_string(ranges_path(root, source_path)).ok()?;
    let file: RangeFile = toml::from_str(&data).ok()?;
    let ranges: Vec<Range> = file.ranges.into_iter().filter(|r| r.start >= 1).collect();
    debug!(count = ranges.len(), "Loaded cached ranges");
    Some(ranges).filter(|ranges| !ranges.is_empty())
}

pub fn save_ranges(root: &Path, source_path: &Path, ranges: &[Range]) -> Result<()> {
    let path = ranges_path(root, source_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache dir {}", parent.display()))?;
    }
    let file = RangeFile {
        ranges: ranges.to_vec(),
    };
    let contents = toml::to_string(&file).context("Failed to serialize ranges")?;
    fs::write(&path, contents)
        .with_context(|| format!("Failed to write ranges cache {}", path.display()))?;
    debug!(path = %path.display(), count = ranges.len(), "Saved ranges to cache");
    Ok(())
}
