// src/aggregate.rs

use crate::model::{SeriesType, TradeRecord};
use crate::process::write::write_parquet;
use crate::store;
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const VIZ_DATA_DIR: &str = "viz/static/data";
pub const BASE_AGG_NAME: &str = "export-import-aggregated.parquet";

/// Grouping axes offered to the visualization stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    Commodity,
    Country,
    Port,
}

impl GroupMode {
    pub const ALL: [GroupMode; 3] = [GroupMode::Commodity, GroupMode::Country, GroupMode::Port];

    pub fn file_stem(self) -> &'static str {
        match self {
            GroupMode::Commodity => "commodity",
            GroupMode::Country => "country",
            GroupMode::Port => "port",
        }
    }

    /// Column name used for the grouping field in JSON artifacts.
    pub fn json_field(self) -> &'static str {
        match self {
            GroupMode::Commodity => "Commodity",
            GroupMode::Country => "Country",
            GroupMode::Port => "Port",
        }
    }

    fn key<'a>(self, record: &'a TradeRecord) -> &'a str {
        match self {
            GroupMode::Commodity => &record.commodity,
            GroupMode::Country => &record.country,
            GroupMode::Port => &record.port,
        }
    }
}

/// One `(grouping value, series)` bucket with its summed USD value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTotal {
    pub key: String,
    pub series: SeriesType,
    pub total_usd: i64,
}

/// One bucket of the base aggregation, keyed by the full dimension set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTotal {
    pub country: String,
    pub commodity: String,
    pub port: String,
    pub series: SeriesType,
    pub year: i32,
    pub total_usd: i64,
}

/// Group-by-sum on `usd_value` over one axis plus series type, optionally
/// restricted to a single year. Null USD values count as zero. Stateless;
/// the result is sorted descending by total.
pub fn totals_by_mode(
    records: &[TradeRecord],
    mode: GroupMode,
    year: Option<i32>,
) -> Vec<ModeTotal> {
    let mut sums: HashMap<(String, SeriesType), i64> = HashMap::new();
    for record in records {
        if year.is_some_and(|y| record.year != y) {
            continue;
        }
        *sums
            .entry((mode.key(record).to_string(), record.series_type))
            .or_default() += record.usd_value.unwrap_or(0);
    }

    let mut totals: Vec<ModeTotal> = sums
        .into_iter()
        .map(|((key, series), total_usd)| ModeTotal {
            key,
            series,
            total_usd,
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total_usd
            .cmp(&a.total_usd)
            .then_with(|| a.key.cmp(&b.key))
            .then_with(|| a.series.label().cmp(b.series.label()))
    });
    totals
}

/// The base aggregation backing filtered queries: every
/// `(country, commodity, port, series, year)` combination with its summed
/// USD value, sorted descending by total.
pub fn base_totals(records: &[TradeRecord]) -> Vec<BaseTotal> {
    let mut sums: HashMap<(String, String, String, SeriesType, i32), i64> = HashMap::new();
    for record in records {
        *sums
            .entry((
                record.country.clone(),
                record.commodity.clone(),
                record.port.clone(),
                record.series_type,
                record.year,
            ))
            .or_default() += record.usd_value.unwrap_or(0);
    }

    let mut totals: Vec<BaseTotal> = sums
        .into_iter()
        .map(|((country, commodity, port, series, year), total_usd)| BaseTotal {
            country,
            commodity,
            port,
            series,
            year,
            total_usd,
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total_usd.cmp(&a.total_usd).then_with(|| {
            (&a.country, &a.commodity, &a.port, a.year).cmp(&(
                &b.country,
                &b.commodity,
                &b.port,
                b.year,
            ))
        })
    });
    totals
}

fn base_batch(totals: &[BaseTotal]) -> Result<RecordBatch> {
    let schema = Arc::new(ArrowSchema::new(vec![
        Field::new("Country", DataType::Utf8, false),
        Field::new("Commodity", DataType::Utf8, false),
        Field::new("Port", DataType::Utf8, false),
        Field::new("Type", DataType::Utf8, false),
        Field::new("Year", DataType::Int32, false),
        Field::new("Total USD Value", DataType::Int64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            totals.iter().map(|t| t.country.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            totals.iter().map(|t| t.commodity.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            totals.iter().map(|t| t.port.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            totals.iter().map(|t| t.series.label()),
        )),
        Arc::new(Int32Array::from_iter_values(totals.iter().map(|t| t.year))),
        Arc::new(Int64Array::from_iter_values(
            totals.iter().map(|t| t.total_usd),
        )),
    ];
    RecordBatch::try_new(schema, columns).context("building base aggregation batch")
}

fn mode_rows(mode: GroupMode, totals: &[ModeTotal]) -> Result<Vec<Value>> {
    totals
        .iter()
        .map(|t| {
            let mut row = Map::with_capacity(3);
            row.insert(mode.json_field().to_string(), Value::String(t.key.clone()));
            row.insert("Type".to_string(), serde_json::to_value(t.series)?);
            row.insert("Total USD Value".to_string(), Value::from(t.total_usd));
            Ok(Value::Object(row))
        })
        .collect()
}

/// Write all downstream artifacts: the base aggregated parquet plus one
/// compact JSON file per (mode, year).
pub fn write_viz_artifacts(records: &[TradeRecord], viz_dir: &Path) -> Result<()> {
    fs::create_dir_all(viz_dir)?;

    let base = base_totals(records);
    let base_path = viz_dir.join(BASE_AGG_NAME);
    write_parquet(&base_batch(&base)?, &base_path, 9)?;
    let size = fs::metadata(&base_path)?.len();
    info!(path = %base_path.display(), groups = base.len(), bytes = size, "saved base aggregation");

    let years: BTreeSet<i32> = records.iter().map(|r| r.year).collect();
    let mut json_files = 0usize;
    let mut json_bytes = 0u64;
    for &year in &years {
        for mode in GroupMode::ALL {
            let totals = totals_by_mode(records, mode, Some(year));
            let rows = mode_rows(mode, &totals)?;
            let path = viz_dir.join(format!("{}-aggregated-{}.json", mode.file_stem(), year));
            store::write_atomic(&path, &serde_json::to_vec(&rows)?)?;
            json_files += 1;
            json_bytes += fs::metadata(&path)?.len();
        }
        info!(year, "saved per-year aggregation files");
    }

    info!(
        files = json_files + 1,
        json_bytes,
        years = years.len(),
        "aggregation artifacts complete"
    );
    Ok(())
}
