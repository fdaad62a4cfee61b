//! Entry point for the chapter splitter.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Open the input as a session and fill its range rows.
//! - Preview, list, or export and write the archive.

mod archive;
mod cache;
mod cancellation;
mod config;
mod document;
mod epub_loader;
mod export;
mod extract;
mod layout;
mod outline;
mod pdf;
mod preview;
mod ranges;
mod resolver;
mod session;
mod text_utils;

use crate::cache::{CACHE_DIR, load_ranges, save_ranges};
use crate::config::load_config;
use crate::ranges::{Range, RangeModel, load_range_file, parse_range_spec};
use crate::session::{AutoDetect, Session};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Split a PDF or EPUB into one PDF per chapter, packaged as a zip.
#[derive(Debug, Parser)]
#[command(name = "chapter-splitter", version)]
struct Cli {
    /// PDF or EPUB to split.
    input: PathBuf,

    /// Seed the ranges from the document's outline or navigation.
    #[arg(long)]
    auto: bool,

    /// A range as `START[-END][:NAME]`; repeatable.
    #[arg(long = "range", value_name = "SPEC")]
    ranges: Vec<String>,

    /// TOML file with `[[range]]` tables.
    #[arg(long = "ranges", value_name = "FILE")]
    ranges_file: Option<PathBuf>,

    /// Directory for the finished archive; overrides `[output] dir`.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    #[arg(long, value_name = "FILE", default_value = "conf/config.toml")]
    config: PathBuf,

    /// Print the ranges instead of exporting.
    #[arg(long)]
    list: bool,

    /// Remove row N (1-based) from the list before exporting; repeatable.
    #[arg(long = "skip", value_name = "N")]
    skip: Vec<usize>,

    /// Print the text of one page (PDF) or chapter (EPUB) and exit.
    #[arg(long, value_name = "PAGE")]
    preview: Option<i64>,

    /// With `--preview`, how many consecutive pages to print.
    #[arg(long, value_name = "N", default_value_t = 1, requires = "preview")]
    pages: u32,
}

fn main() {
    let cli = Cli::parse();
    let reload_handle = init_tracing();
    if let Err(err) = run(cli, &reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, reload_handle: &ReloadHandle) -> Result<()> {
    let config = load_config(&cli.config);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %cli.input.display(),
        level = %config.log_level,
        "Starting chapter splitter"
    );
    if !cli.input.exists() {
        bail!("File not found: {}", cli.input.display());
    }

    let mut session = Session::load(&cli.input, None)?;
    match session.cache_stats() {
        Some(stats) => info!(
            kind = %session.kind(),
            files = stats.cached,
            failed = stats.failed,
            chapters = session.preview_total(),
            "Document loaded"
        ),
        None => info!(
            kind = %session.kind(),
            pages = session.preview_total(),
            "Document loaded"
        ),
    }

    if let Some(page) = cli.preview {
        print_preview(&mut session, page, cli.pages)?;
        return Ok(());
    }

    fill_ranges(&cli, &mut session)?;
    skip_rows(&cli.skip, &mut session);

    if cli.list {
        for row in session.ranges().to_export_list() {
            println!("{}", describe(&row));
        }
        return Ok(());
    }

    if !session.ranges().is_exportable() {
        bail!("No ranges to export; pass --range, --ranges or --auto");
    }

    let outcome = session.export(&config)?;
    let out_dir = cli
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output dir {}", out_dir.display()))?;
    let out_path = out_dir.join(&outcome.archive_name);
    fs::write(&out_path, &outcome.bytes)
        .with_context(|| format!("Failed to write archive {}", out_path.display()))?;
    info!(
        path = %out_path.display(),
        files = outcome.files.len(),
        exported = outcome.report.exported,
        skipped = outcome.report.skipped,
        failed = outcome.report.failed,
        "Archive written"
    );

    let exported = session.ranges().to_export_list();
    if let Err(err) = save_ranges(Path::new(CACHE_DIR), session.source_path(), &exported) {
        warn!("Failed to cache ranges: {err:#}");
    }
    Ok(())
}

/// Explicit ranges win, then `--auto`, then whatever was cached for this input.
fn fill_ranges(cli: &Cli, session: &mut Session) -> Result<()> {
    let mut explicit = Vec::new();
    if let Some(path) = &cli.ranges_file {
        explicit.extend(load_range_file(path)?);
    }
    for spec in &cli.ranges {
        explicit.push(parse_range_spec(spec)?);
    }

    if !explicit.is_empty() {
        info!(count = explicit.len(), "Using ranges from the command line");
        enter_rows(session.ranges_mut(), explicit);
    } else if cli.auto {
        if session.auto_detect() == AutoDetect::NoChapters {
            warn!("Automatic detection found nothing; add ranges manually");
        }
    } else if let Some(cached) = load_ranges(Path::new(CACHE_DIR), session.source_path()) {
        info!(count = cached.len(), "Resuming with cached ranges");
        session.ranges_mut().seed(cached);
    }
    Ok(())
}

/// Type each range into the trailing blank row; filling it opens the next one.
fn enter_rows(model: &mut RangeModel, ranges: Vec<Range>) {
    model.clear();
    for range in ranges {
        let Some(row) = model.rows().last().map(|row| row.id) else {
            continue;
        };
        model.set_start(row, Some(range.start));
        model.set_end(row, range.end);
        model.set_name(row, range.name);
    }
}

/// Drop rows by their 1-based position in the list as it was before removal.
fn skip_rows(positions: &[usize], session: &mut Session) {
    if positions.is_empty() {
        return;
    }
    let rows = session.ranges().rows();
    let ids: Vec<_> = positions
        .iter()
        .filter_map(|pos| pos.checked_sub(1).and_then(|idx| rows.get(idx)))
        .map(|row| row.id)
        .collect();
    if ids.len() < positions.len() {
        warn!(rows = rows.len(), "Ignoring --skip positions outside the list");
    }
    for id in ids {
        session.ranges_mut().remove(id);
    }
}

fn print_preview(session: &mut Session, page: i64, count: u32) -> Result<()> {
    let mut output = session.preview(page)?;
    for step in 0..count.max(1) {
        if step > 0 {
            let before = session.preview_page();
            output = session.preview_next()?;
            if session.preview_page() == before {
                break;
            }
        }
        match output.take() {
            Some(text) => {
                println!("--- {} ---", session.preview_page());
                println!("{text}");
            }
            None => warn!(page = session.preview_page(), "Preview was superseded"),
        }
    }
    Ok(())
}

fn describe(range: &Range) -> String {
    let end = range.end.map(|end| end.to_string()).unwrap_or_default();
    format!("{}\t{}\t{}", range.start, end, range.name)
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
