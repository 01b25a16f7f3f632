// src/model.rs

use serde::Serialize;
use std::fmt;

/// The two independent data streams published by the portal. Each has its own
/// acquisition cadence and failure tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SeriesType {
    Import,
    Export,
}

impl SeriesType {
    /// Crawl order: import first, then export, for every month.
    pub const ALL: [SeriesType; 2] = [SeriesType::Import, SeriesType::Export];

    /// Directory name under `raw/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            SeriesType::Import => "import",
            SeriesType::Export => "export",
        }
    }

    /// Single-character discriminator used in the portal query string.
    pub fn discriminator(self) -> char {
        match self {
            SeriesType::Import => 'I',
            SeriesType::Export => 'E',
        }
    }

    /// Value stored in the `Type` column of the canonical dataset.
    pub fn label(self) -> &'static str {
        match self {
            SeriesType::Import => "Import",
            SeriesType::Export => "Export",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "import" => Some(SeriesType::Import),
            "export" => Some(SeriesType::Export),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Import" => Some(SeriesType::Import),
            "Export" => Some(SeriesType::Export),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            SeriesType::Import => 0,
            SeriesType::Export => 1,
        }
    }
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized row of the canonical dataset.
///
/// `year`, `month` and `series_type` come from the archive's location on disk,
/// never from sheet content. The three numeric fields stay `None` whenever the
/// source cell was missing or unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradeRecord {
    pub commodity: String,
    pub country: String,
    pub port: String,
    pub year: i32,
    pub month: i32,
    pub series_type: SeriesType,
    pub quantity: Option<i64>,
    pub unit: String,
    pub inr_value: Option<i64>,
    pub usd_value: Option<i64>,
}

impl TradeRecord {
    /// A row with no quantity and no value in either currency carries no
    /// information and is dropped during cleaning.
    pub fn is_degenerate(&self) -> bool {
        self.quantity.unwrap_or(0) == 0
            && self.inr_value.unwrap_or(0) == 0
            && self.usd_value.unwrap_or(0) == 0
    }

    /// Canonical ordering key. `Type` sorts by its textual label, so Export
    /// precedes Import exactly as in the published dataset.
    pub fn sort_key(&self) -> (&str, &str, &str, i32, i32, &'static str) {
        (
            self.commodity.as_str(),
            self.country.as_str(),
            self.port.as_str(),
            self.year,
            self.month,
            self.series_type.label(),
        )
    }
}

/// Consecutive-failure streaks for both series, scoped to one crawl run.
/// A skip (artifact already on disk) resets a streak just like a success.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlState {
    streaks: [u32; 2],
}

impl CrawlState {
    pub fn failures(&self, series: SeriesType) -> u32 {
        self.streaks[series.index()]
    }

    pub fn reset(&mut self, series: SeriesType) {
        self.streaks[series.index()] = 0;
    }

    /// Returns the new streak length.
    pub fn record_failure(&mut self, series: SeriesType) -> u32 {
        let slot = &mut self.streaks[series.index()];
        *slot += 1;
        *slot
    }

    /// The crawl only stops once there is no recoverable data in *either*
    /// series: a single persistently failing series cannot end the run while
    /// the other keeps succeeding.
    pub fn exhausted(&self, threshold: u32) -> bool {
        self.streaks.iter().copied().min().unwrap_or(0) >= threshold
    }
}
