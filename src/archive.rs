//! Output archive assembly.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// One file destined for the output archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Files collected during an export. Adding a name that already exists
/// replaces the earlier bytes but keeps its position.
#[derive(Debug, Default)]
pub struct ExportArchive {
    files: IndexMap<String, Vec<u8>>,
}

impl ExportArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: ExportedFile) {
        debug!(filename = %file.filename, bytes = file.bytes.len(), "Adding file to archive");
        if let Some(previous) = self.files.insert(file.filename.clone(), file.bytes) {
            warn!(
                filename = %file.filename,
                replaced_bytes = previous.len(),
                "Archive entry replaced by a later file with the same name"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, filename: &str) -> Option<&[u8]> {
        self.files.get(filename).map(Vec::as_slice)
    }

    /// Serialize every collected file into a single zip.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in &self.files {
            writer
                .start_file(name.as_str(), options)
                .with_context(|| format!("Failed to start archive entry {name}"))?;
            writer
                .write_all(bytes)
                .with_context(|| format!("Failed to write archive entry {name}"))?;
        }
        let cursor = writer.finish().context("Failed to finalize zip archive")?;
        Ok(cursor.into_inner())
    }
}
