// src/extract/mod.rs

pub mod format;
pub mod rows;
pub mod schema;

use crate::model::TradeRecord;
use crate::store::{self, ArchiveLocation};
use anyhow::{Context, Result};
use calamine::{Data, Reader};
use rayon::prelude::*;
use std::fs::File;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on parallel archive workers, independent of core count.
pub const MAX_WORKERS: usize = 8;

/// Parse one spreadsheet blob into records.
///
/// Structural problems (too few rows, unresolvable essential columns) yield
/// an empty vector; only an unreadable workbook is an error, and the caller
/// treats that as per-entry recoverable.
pub fn parse_workbook(data: &[u8], loc: &ArchiveLocation) -> Result<Vec<TradeRecord>> {
    let mut workbook = format::open_workbook(data)?;

    // Release files carry their data on the first worksheet.
    let Some(first_sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook
        .worksheet_range(&first_sheet)
        .with_context(|| format!("reading worksheet `{first_sheet}`"))?;

    // Need at least a title row and a header row.
    let Some((end_row, end_col)) = range.end() else {
        return Ok(Vec::new());
    };
    if end_row < rows::HEADER_ROW {
        return Ok(Vec::new());
    }

    let header: Vec<String> = (0..=end_col)
        .map(|col| match range.get_value((rows::HEADER_ROW, col)) {
            Some(Data::Empty) | None => String::new(),
            Some(cell) => cell.to_string(),
        })
        .collect();
    let columns = schema::detect_columns(&header);
    if !columns.has_essentials() {
        warn!(
            commodity = ?columns.commodity,
            country = ?columns.country,
            "essential columns not found, rejecting sheet"
        );
        return Ok(Vec::new());
    }

    Ok(rows::normalize_rows(&range, &columns, loc))
}

/// Extract every spreadsheet entry of one archive into records.
///
/// A corrupt entry is logged and skipped; sibling entries still contribute.
#[instrument(level = "info", skip(path), fields(archive = %path.display()))]
pub fn process_archive(path: &Path) -> Result<Vec<TradeRecord>> {
    let Some(loc) = store::location_from_path(path) else {
        warn!("cannot derive year/month/series from path, skipping");
        return Ok(Vec::new());
    };

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("reading archive {}", path.display()))?;

    let mut records = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("entry #{} of {}", i, path.display()))?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_string();
        let lower = name.to_lowercase();
        if !lower.ends_with(".xls") && !lower.ends_with(".xlsx") {
            continue;
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut buf) {
            error!(entry = %name, error = %e, "failed to read entry");
            continue;
        }
        match parse_workbook(&buf, &loc) {
            Ok(mut batch) => {
                debug!(entry = %name, rows = batch.len(), "parsed spreadsheet");
                records.append(&mut batch);
            }
            Err(e) => {
                error!(entry = %name, error = %e, "failed to parse spreadsheet");
            }
        }
    }
    Ok(records)
}

/// Fan out archive processing over a bounded worker pool and collect every
/// batch. Workers share nothing; a failed archive contributes an empty batch
/// and the run carries on. Ordering is irrelevant because the cleaner
/// re-sorts canonically.
pub fn process_all(paths: &[PathBuf]) -> Result<Vec<TradeRecord>> {
    let workers = num_cpus::get().min(paths.len()).min(MAX_WORKERS).max(1);
    info!(archives = paths.len(), workers, "processing archives");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("building worker pool")?;

    let batches: Vec<Vec<TradeRecord>> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| match process_archive(path) {
                Ok(batch) => batch,
                Err(e) => {
                    error!(archive = %path.display(), error = %e, "failed to process archive");
                    Vec::new()
                }
            })
            .collect()
    });

    Ok(batches.into_iter().flatten().collect())
}
