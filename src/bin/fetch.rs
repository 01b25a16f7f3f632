// src/bin/fetch.rs

use anyhow::Result;
use chrono::Local;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use tradescraper::crawl::{Crawler, MonthCursor, FAILURE_THRESHOLD, REQUEST_PAUSE};
use tradescraper::fetch::HttpArchiveSource;
use tradescraper::store;

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let source = HttpArchiveSource::new()?;
    let start = MonthCursor::preceding(Local::now().date_naive());
    let crawler = Crawler::new(source, store::RAW_DIR, FAILURE_THRESHOLD, REQUEST_PAUSE);

    let summary = crawler.run(start).await?;
    info!(
        months = summary.months_visited,
        fetched = summary.fetched,
        skipped = summary.skipped,
        failed = summary.failed,
        "fetch complete"
    );
    Ok(())
}
