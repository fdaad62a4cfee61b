//! The editable list of split ranges.
//!
//! The collection is never empty: removing the last row or clearing the list
//! leaves one blank row behind, and filling in the last row appends a fresh
//! one, so there is always a slot ready for the next entry.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// One exportable unit. `start` is 1-based; `end` is only meaningful for PDFs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
    #[serde(default)]
    pub name: String,
}

impl Range {
    pub fn new(start: u32, end: Option<u32>, name: impl Into<String>) -> Self {
        Self {
            start,
            end,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(u64);

/// A range under edit; every field may still be blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRow {
    pub id: RangeId,
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub name: String,
}

impl RangeRow {
    fn is_blank(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.name.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RangeModel {
    rows: Vec<RangeRow>,
    next_id: u64,
}

impl Default for RangeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeModel {
    pub fn new() -> Self {
        let mut model = Self {
            rows: Vec::new(),
            next_id: 0,
        };
        model.add(None);
        model
    }

    pub fn rows(&self) -> &[RangeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Append a row, blank unless `initial` is given.
    pub fn add(&mut self, initial: Option<Range>) -> RangeId {
        let id = RangeId(self.next_id);
        self.next_id += 1;
        let row = match initial {
            Some(range) => RangeRow {
                id,
                start: Some(range.start).filter(|start| *start >= 1),
                end: range.end,
                name: range.name,
            },
            None => RangeRow {
                id,
                start: None,
                end: None,
                name: String::new(),
            },
        };
        self.rows.push(row);
        id
    }

    pub fn remove(&mut self, id: RangeId) {
        self.rows.retain(|row| row.id != id);
        if self.rows.is_empty() {
            self.add(None);
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.add(None);
    }

    /// Replace every row with `ranges`, followed by one blank row.
    pub fn seed(&mut self, ranges: impl IntoIterator<Item = Range>) {
        self.rows.clear();
        for range in ranges {
            self.add(Some(range));
        }
        self.add(None);
        debug!(rows = self.rows.len(), "Seeded range rows");
    }

    /// A start of 0 is treated as blank.
    pub fn set_start(&mut self, id: RangeId, start: Option<u32>) {
        let start = start.filter(|value| *value >= 1);
        let grows = self.edit(id, |row| row.start = start) && start.is_some();
        if grows {
            self.grow_if_last(id);
        }
    }

    pub fn set_end(&mut self, id: RangeId, end: Option<u32>) {
        let grows = self.edit(id, |row| row.end = end) && end.is_some();
        if grows {
            self.grow_if_last(id);
        }
    }

    pub fn set_name(&mut self, id: RangeId, name: impl Into<String>) {
        let name = name.into();
        self.edit(id, |row| row.name = name);
    }

    /// Rows with a start value, in row order. Blank trailing rows drop out here.
    pub fn to_export_list(&self) -> Vec<Range> {
        self.rows
            .iter()
            .filter_map(|row| {
                row.start.map(|start| Range {
                    start,
                    end: row.end,
                    name: row.name.clone(),
                })
            })
            .collect()
    }

    pub fn is_exportable(&self) -> bool {
        self.rows.iter().any(|row| row.start.is_some())
    }

    fn edit(&mut self, id: RangeId, apply: impl FnOnce(&mut RangeRow)) -> bool {
        match self.rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                apply(row);
                true
            }
            None => false,
        }
    }

    fn grow_if_last(&mut self, id: RangeId) {
        let is_last = self.rows.last().is_some_and(|row| row.id == id);
        if is_last {
            self.add(None);
        }
    }
}

/// Parse `START[-END][:NAME]`, e.g. `3-5:Intro` or `7`.
pub fn parse_range_spec(spec: &str) -> Result<Range> {
    let (bounds, name) = match spec.split_once(':') {
        Some((bounds, name)) => (bounds, name.trim()),
        None => (spec, ""),
    };
    let (start, end) = match bounds.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (bounds, None),
    };
    let start: u32 = start
        .trim()
        .parse()
        .with_context(|| format!("invalid range start in {spec:?}"))?;
    if start == 0 {
        bail!("range start must be at least 1 in {spec:?}");
    }
    let end = match end.map(str::trim).filter(|end| !end.is_empty()) {
        Some(end) => Some(
            end.parse::<u32>()
                .map_err(|err| anyhow!("invalid range end in {spec:?}: {err}"))?,
        ),
        None => None,
    };
    Ok(Range::new(start, end, name))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct RangeFile {
    #[serde(default, rename = "range")]
    pub(crate) ranges: Vec<Range>,
}

/// Read a TOML file of `[[range]]` tables.
pub fn load_range_file(path: &Path) -> Result<Vec<Range>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ranges from {}", path.display()))?;
    let file: RangeFile = toml::from_str(&data)
        .with_context(|| format!("Invalid ranges TOML at {}", path.display()))?;
    if let Some(idx) = file.ranges.iter().position(|range| range.start == 0) {
        bail!(
            "range start must be at least 1 in {} (range #{})",
            path.display(),
            idx + 1
        );
    }
    Ok(file.ranges)
}
