// src/process/write.rs

use crate::model::TradeRecord;
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{Cursor, Write as _};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PARQUET_NAME: &str = "export-import.parquet";
pub const CSV_ZIP_NAME: &str = "export-import.csv.zip";
const CSV_ENTRY_NAME: &str = "export-import.csv";

/// Arrow schema of the canonical dataset. Column names are part of the
/// published contract; downstream consumers select by name.
pub fn dataset_schema() -> Arc<ArrowSchema> {
    Arc::new(ArrowSchema::new(vec![
        Field::new("Commodity", DataType::Utf8, false),
        Field::new("Country", DataType::Utf8, false),
        Field::new("Port", DataType::Utf8, false),
        Field::new("Year", DataType::Int32, false),
        Field::new("Month", DataType::Int32, false),
        Field::new("Type", DataType::Utf8, false),
        Field::new("Quantity", DataType::Int64, true),
        Field::new("Unit", DataType::Utf8, false),
        Field::new("INR Value", DataType::Int64, true),
        Field::new("USD Value", DataType::Int64, true),
    ]))
}

pub fn to_record_batch(records: &[TradeRecord]) -> Result<RecordBatch> {
    let commodity = StringArray::from_iter_values(records.iter().map(|r| r.commodity.as_str()));
    let country = StringArray::from_iter_values(records.iter().map(|r| r.country.as_str()));
    let port = StringArray::from_iter_values(records.iter().map(|r| r.port.as_str()));
    let year = Int32Array::from_iter_values(records.iter().map(|r| r.year));
    let month = Int32Array::from_iter_values(records.iter().map(|r| r.month));
    let series = StringArray::from_iter_values(records.iter().map(|r| r.series_type.label()));
    let quantity: Int64Array = records.iter().map(|r| r.quantity).collect();
    let unit = StringArray::from_iter_values(records.iter().map(|r| r.unit.as_str()));
    let inr: Int64Array = records.iter().map(|r| r.inr_value).collect();
    let usd: Int64Array = records.iter().map(|r| r.usd_value).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(commodity),
        Arc::new(country),
        Arc::new(port),
        Arc::new(year),
        Arc::new(month),
        Arc::new(series),
        Arc::new(quantity),
        Arc::new(unit),
        Arc::new(inr),
        Arc::new(usd),
    ];
    RecordBatch::try_new(dataset_schema(), columns).context("building record batch")
}

/// Write one batch as a zstd-compressed parquet file, tmp-then-rename.
pub fn write_parquet(batch: &RecordBatch, path: &Path, zstd_level: i32) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .with_context(|| format!("{} has no file name", path.display()))?;
    let tmp = parent.join(format!(".{}.tmp", file_name));

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(zstd_level)?))
        .set_dictionary_enabled(true)
        .build();
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Persist the cleaned dataset: canonical parquet plus a CSV export packed
/// straight into a zip, no intermediate file.
pub fn write_dataset(records: &[TradeRecord], data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    let batch = to_record_batch(records)?;

    let parquet_path = data_dir.join(PARQUET_NAME);
    write_parquet(&batch, &parquet_path, 3)?;
    info!(path = %parquet_path.display(), rows = records.len(), "saved parquet dataset");

    let mut csv_buf = Vec::new();
    {
        let mut writer = arrow::csv::WriterBuilder::new()
            .with_header(true)
            .build(Cursor::new(&mut csv_buf));
        writer.write(&batch)?;
    }

    let csv_zip_path = data_dir.join(CSV_ZIP_NAME);
    let tmp = data_dir.join(format!(".{}.tmp", CSV_ZIP_NAME));
    {
        let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let mut writer = ZipWriter::new(file);
        writer.start_file(
            CSV_ENTRY_NAME,
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )?;
        writer.write_all(&csv_buf)?;
        writer.finish()?;
    }
    fs::rename(&tmp, &csv_zip_path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), csv_zip_path.display()))?;
    info!(path = %csv_zip_path.display(), "saved csv export");

    Ok(())
}
