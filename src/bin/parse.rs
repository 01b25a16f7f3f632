// src/bin/parse.rs

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use tradescraper::{extract, process, store};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let raw_dir = Path::new(store::RAW_DIR);
    if !raw_dir.exists() {
        error!(dir = %raw_dir.display(), "raw directory does not exist, run fetch first");
        return Ok(());
    }

    let archives = store::find_archives(raw_dir)?;
    if archives.is_empty() {
        bail!("no archives found under {}", raw_dir.display());
    }

    let records = extract::process_all(&archives)?;
    if records.is_empty() {
        bail!("no records extracted from any archive");
    }

    let cleaned = process::clean(records);
    let summary = process::summarize(&cleaned);
    info!(rows = summary.rows, range = %summary.range(), "final dataset");

    process::write::write_dataset(&cleaned, Path::new(store::DATA_DIR))?;
    info!("parsing complete");
    Ok(())
}
