// src/bin/aggregate.rs

use anyhow::Result;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use tradescraper::{aggregate, process, store};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let parquet_path = Path::new(store::DATA_DIR).join(process::write::PARQUET_NAME);
    if !parquet_path.exists() {
        error!(path = %parquet_path.display(), "canonical dataset not found, run parse first");
        return Ok(());
    }

    let records = process::read::read_dataset(&parquet_path)?;
    info!(rows = records.len(), "loaded canonical dataset");

    aggregate::write_viz_artifacts(&records, Path::new(aggregate::VIZ_DATA_DIR))?;
    info!("aggregation complete");
    Ok(())
}
