// src/crawl.rs

use crate::fetch::{month_token, ArchiveSource};
use crate::model::{CrawlState, SeriesType};
use crate::store;
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A series is considered exhausted after this many consecutive misses.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Pause between month iterations that issued at least one request.
pub const REQUEST_PAUSE: Duration = Duration::from_secs(10);

/// Backward-walking month cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    pub year: i32,
    pub month: u32,
}

impl MonthCursor {
    /// The month preceding `today`, which is where every crawl starts: the
    /// portal never has data for the running month.
    pub fn preceding(today: NaiveDate) -> Self {
        MonthCursor {
            year: today.year(),
            month: today.month(),
        }
        .prev()
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            MonthCursor {
                year: self.year - 1,
                month: 12,
            }
        } else {
            MonthCursor {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn token(&self) -> String {
        month_token(self.year, self.month)
    }
}

/// Counters reported once a crawl terminates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub months_visited: u32,
    pub fetched: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Walks backward one month at a time, fetching both series per month, until
/// both failure streaks reach the threshold.
pub struct Crawler<S> {
    source: S,
    raw_dir: PathBuf,
    threshold: u32,
    pause: Duration,
}

impl<S: ArchiveSource> Crawler<S> {
    pub fn new(source: S, raw_dir: impl Into<PathBuf>, threshold: u32, pause: Duration) -> Self {
        Self {
            source,
            raw_dir: raw_dir.into(),
            threshold,
            pause,
        }
    }

    /// Runs the acquisition loop starting at `start` and going back in time.
    ///
    /// Per month and series: an artifact already on disk counts as a success
    /// and costs no request; otherwise one fetch is attempted and the outcome
    /// updates that series' streak. Months where every series was skipped do
    /// not pause, so re-running over a fully populated window is free.
    pub async fn run(&self, start: MonthCursor) -> Result<CrawlSummary> {
        let mut state = CrawlState::default();
        let mut cursor = start;
        let mut summary = CrawlSummary::default();

        info!(start = %cursor.token(), "starting crawl, going back in time");

        while !state.exhausted(self.threshold) {
            let mut made_request = false;

            for series in SeriesType::ALL {
                let path = store::archive_path(&self.raw_dir, series, cursor.year, cursor.month);
                if path.exists() {
                    debug!(series = %series, month = %cursor.token(), "already on disk, skipping");
                    state.reset(series);
                    summary.skipped += 1;
                    continue;
                }

                made_request = true;
                match self.source.fetch_month(cursor.year, cursor.month, series).await {
                    Some(bytes) => {
                        store::write_atomic(&path, &bytes)?;
                        info!(series = %series, month = %cursor.token(), path = %path.display(), "saved archive");
                        state.reset(series);
                        summary.fetched += 1;
                    }
                    None => {
                        let streak = state.record_failure(series);
                        warn!(
                            series = %series,
                            month = %cursor.token(),
                            streak,
                            threshold = self.threshold,
                            "fetch failed"
                        );
                        summary.failed += 1;
                    }
                }
            }

            summary.months_visited += 1;
            cursor = cursor.prev();

            if made_request {
                debug!(pause = ?self.pause, "pausing before next month");
                tokio::time::sleep(self.pause).await;
            }
        }

        info!(
            threshold = self.threshold,
            months = summary.months_visited,
            fetched = summary.fetched,
            skipped = summary.skipped,
            failed = summary.failed,
            "both series exhausted, stopping"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::path::Path;
    use std::sync::Mutex;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    type Call = (i32, u32, SeriesType);

    struct ScriptedSource<F> {
        script: F,
        calls: Mutex<Vec<Call>>,
    }

    impl<F: Fn(Call) -> Option<Vec<u8>> + Sync> ScriptedSource<F> {
        fn new(script: F) -> Self {
            Self {
                script,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl<F: Fn(Call) -> Option<Vec<u8>> + Sync> ArchiveSource for ScriptedSource<F> {
        async fn fetch_month(&self, year: i32, month: u32, series: SeriesType) -> Option<Vec<u8>> {
            let call = (year, month, series);
            self.calls.lock().unwrap().push(call);
            (self.script)(call)
        }
    }

    fn tiny_zip() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buf));
            writer
                .start_file("empty.xls", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"stub").unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    fn crawler<S: ArchiveSource>(source: S, raw_dir: &Path) -> Crawler<S> {
        Crawler::new(source, raw_dir, FAILURE_THRESHOLD, Duration::ZERO)
    }

    fn prefill(raw_dir: &Path, cursor: MonthCursor) {
        for series in SeriesType::ALL {
            let path = store::archive_path(raw_dir, series, cursor.year, cursor.month);
            store::write_atomic(&path, &tiny_zip()).unwrap();
        }
    }

    #[test]
    fn cursor_rolls_over_year_boundary() {
        let jan = MonthCursor {
            year: 2022,
            month: 1,
        };
        assert_eq!(
            jan.prev(),
            MonthCursor {
                year: 2021,
                month: 12
            }
        );

        let today = NaiveDate::from_ymd_opt(2022, 1, 15).unwrap();
        assert_eq!(
            MonthCursor::preceding(today),
            MonthCursor {
                year: 2021,
                month: 12
            }
        );
    }

    #[tokio::test]
    async fn failing_source_stops_after_threshold_per_series() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::new(|_| None);
        let crawler = crawler(source, dir.path());

        let start = MonthCursor {
            year: 2021,
            month: 11,
        };
        let summary = crawler.run(start).await.unwrap();

        let calls = crawler.source.calls();
        assert_eq!(calls.len(), 10);
        for series in SeriesType::ALL {
            let attempts = calls.iter().filter(|c| c.2 == series).count();
            assert_eq!(attempts, 5);
        }
        assert_eq!(summary.failed, 10);
        assert_eq!(summary.months_visited, 5);
        assert_eq!(summary.fetched, 0);
    }

    #[tokio::test]
    async fn existing_artifacts_cost_no_requests() {
        let dir = tempfile::tempdir().unwrap();
        let start = MonthCursor {
            year: 2021,
            month: 11,
        };
        // Three fully populated months, then nothing but failures.
        let mut cursor = start;
        for _ in 0..3 {
            prefill(dir.path(), cursor);
            cursor = cursor.prev();
        }

        let source = ScriptedSource::new(|_| None);
        let crawler = crawler(source, dir.path());
        let summary = crawler.run(start).await.unwrap();

        let calls = crawler.source.calls();
        // No request touches the prefilled window.
        assert!(calls.iter().all(|&(y, m, _)| (y, m) < (2021, 9)));
        assert_eq!(calls.len(), 10);
        assert_eq!(summary.skipped, 6);
    }

    #[tokio::test]
    async fn skip_resets_failure_streak() {
        let dir = tempfile::tempdir().unwrap();
        let start = MonthCursor {
            year: 2021,
            month: 11,
        };
        // Two failing months, one populated month, then failures again. If a
        // skip merely paused the streak, the run would end two months early.
        prefill(dir.path(), start.prev().prev());

        let source = ScriptedSource::new(|_| None);
        let crawler = crawler(source, dir.path());
        crawler.run(start).await.unwrap();

        let calls = crawler.source.calls();
        // 2 failing months before the skip + 5 after it, both series.
        assert_eq!(calls.len(), 14);
        let import_months: Vec<(i32, u32)> = calls
            .iter()
            .filter(|c| c.2 == SeriesType::Import)
            .map(|&(y, m, _)| (y, m))
            .collect();
        assert_eq!(
            import_months,
            vec![
                (2021, 11),
                (2021, 10),
                (2021, 8),
                (2021, 7),
                (2021, 6),
                (2021, 5),
                (2021, 4),
            ]
        );
    }

    #[tokio::test]
    async fn one_failing_series_does_not_stop_the_crawl() {
        let dir = tempfile::tempdir().unwrap();
        // Import never resolves; export succeeds for the first three months.
        let source = ScriptedSource::new(|(_, month, series)| {
            if series == SeriesType::Export && month >= 9 {
                Some(tiny_zip())
            } else {
                None
            }
        });
        let crawler = crawler(source, dir.path());

        let start = MonthCursor {
            year: 2021,
            month: 11,
        };
        crawler.run(start).await.unwrap();

        let calls = crawler.source.calls();
        let import_attempts = calls.iter().filter(|c| c.2 == SeriesType::Import).count();
        // Import keeps being retried well past its own threshold while export
        // is still delivering: 3 export successes + 5 export failures = 8.
        assert_eq!(import_attempts, 8);
    }

    #[tokio::test]
    async fn fetched_archives_land_in_series_layout() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::new(|(_, month, _)| (month == 11).then(tiny_zip));
        let crawler = crawler(source, dir.path());

        let start = MonthCursor {
            year: 2021,
            month: 11,
        };
        let summary = crawler.run(start).await.unwrap();

        assert_eq!(summary.fetched, 2);
        for series in SeriesType::ALL {
            let path = store::archive_path(dir.path(), series, 2021, 11);
            assert!(path.exists(), "missing {}", path.display());
        }
    }
}
