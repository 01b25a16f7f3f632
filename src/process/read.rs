// src/process/read.rs

use crate::model::{SeriesType, TradeRecord};
use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, Int32Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Load the canonical dataset back into memory for downstream aggregation.
pub fn read_dataset(path: &Path) -> Result<Vec<TradeRecord>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {}", path.display()))?
        .build()?;

    let mut records = Vec::new();
    for batch in reader {
        append_batch(&mut records, &batch?)?;
    }
    Ok(records)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("missing or mistyped column `{name}`"))
}

fn i32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow!("missing or mistyped column `{name}`"))
}

fn i64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow!("missing or mistyped column `{name}`"))
}

fn append_batch(records: &mut Vec<TradeRecord>, batch: &RecordBatch) -> Result<()> {
    let commodity = string_column(batch, "Commodity")?;
    let country = string_column(batch, "Country")?;
    let port = string_column(batch, "Port")?;
    let year = i32_column(batch, "Year")?;
    let month = i32_column(batch, "Month")?;
    let series = string_column(batch, "Type")?;
    let quantity = i64_column(batch, "Quantity")?;
    let unit = string_column(batch, "Unit")?;
    let inr = i64_column(batch, "INR Value")?;
    let usd = i64_column(batch, "USD Value")?;

    let nullable = |array: &Int64Array, i: usize| (!array.is_null(i)).then(|| array.value(i));

    records.reserve(batch.num_rows());
    for i in 0..batch.num_rows() {
        let label = series.value(i);
        let Some(series_type) = SeriesType::from_label(label) else {
            bail!("unknown series type `{label}` in dataset");
        };
        records.push(TradeRecord {
            commodity: commodity.value(i).to_string(),
            country: country.value(i).to_string(),
            port: port.value(i).to_string(),
            year: year.value(i),
            month: month.value(i),
            series_type,
            quantity: nullable(quantity, i),
            unit: unit.value(i).to_string(),
            inr_value: nullable(inr, i),
            usd_value: nullable(usd, i),
        });
    }
    Ok(())
}
