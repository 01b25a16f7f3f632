// src/store.rs

use crate::model::SeriesType;
use anyhow::{Context, Result};
use glob::glob;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const RAW_DIR: &str = "raw";
pub const DATA_DIR: &str = "data";

/// Where an archive sits on disk, which is the sole source of its
/// year/month/series metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub year: i32,
    pub month: u32,
    pub series: SeriesType,
}

/// `raw/{import|export}/{year}/{month:02}.zip`
pub fn archive_path(raw_dir: &Path, series: SeriesType, year: i32, month: u32) -> PathBuf {
    raw_dir
        .join(series.dir_name())
        .join(year.to_string())
        .join(format!("{:02}.zip", month))
}

/// Recover `(year, month, series)` from an archive path.
///
/// Understands both the current layout `raw/import/2021/11.zip` and the
/// legacy layout `raw/2021/11.zip`; legacy archives predate the export feed
/// and are import data.
pub fn location_from_path(path: &Path) -> Option<ArchiveLocation> {
    let mut series = None;
    let mut year = None;
    let mut month = None;

    for component in path.components() {
        let part = component.as_os_str().to_str()?;
        if let Some(s) = SeriesType::from_dir_name(part) {
            series = Some(s);
        } else if part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit()) {
            year = part.parse().ok();
        } else if let Some(stem) = part.strip_suffix(".zip") {
            if !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()) {
                month = stem.parse().ok();
            }
        }
    }

    let (year, month) = (year?, month?);
    if series.is_none() {
        debug!(path = %path.display(), "legacy layout, assuming import series");
    }
    Some(ArchiveLocation {
        year,
        month,
        series: series.unwrap_or(SeriesType::Import),
    })
}

/// All archives under `raw_dir`, recursively, in path order.
pub fn find_archives(raw_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.zip", raw_dir.display());
    let mut paths = Vec::new();
    for entry in glob(&pattern).context("invalid glob pattern for archive discovery")? {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!(error = %e, "unreadable entry during archive scan"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Write to a dot-prefixed temp file in the target directory, then rename
/// over the destination, so a cancelled run never leaves a torn artifact.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("creating {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .with_context(|| format!("{} has no file name", path.display()))?;
    let tmp = parent.join(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
