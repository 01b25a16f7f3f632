// src/process/mod.rs

pub mod read;
pub mod write;

use crate::model::TradeRecord;
use std::collections::HashSet;
use tracing::info;

/// Merge and clean the batches of a whole run, in this order: exact-row
/// dedup, unit default repair, degeneracy filter, canonical sort. The output
/// is the authoritative dataset.
pub fn clean(records: Vec<TradeRecord>) -> Vec<TradeRecord> {
    let before = records.len();

    let mut seen = HashSet::with_capacity(records.len());
    let mut cleaned: Vec<TradeRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect();
    drop(seen);

    for record in &mut cleaned {
        if record.unit.trim().is_empty() || record.unit.eq_ignore_ascii_case("nan") {
            record.unit = "N/A".to_string();
        }
    }

    cleaned.retain(|record| !record.is_degenerate());

    cleaned.sort_by(|a, b| {
        a.sort_key().cmp(&b.sort_key()).then_with(|| {
            (a.quantity, &a.unit, a.inr_value, a.usd_value).cmp(&(
                b.quantity,
                &b.unit,
                b.inr_value,
                b.usd_value,
            ))
        })
    });

    info!(before, after = cleaned.len(), "cleaned dataset");
    cleaned
}

/// Row count and observed `(year, month)` range of a dataset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub first: Option<(i32, i32)>,
    pub last: Option<(i32, i32)>,
}

impl DatasetSummary {
    pub fn range(&self) -> String {
        match (self.first, self.last) {
            (Some((fy, fm)), Some((ly, lm))) => {
                format!("{}-{:02} to {}-{:02}", fy, fm, ly, lm)
            }
            _ => "empty".to_string(),
        }
    }
}

pub fn summarize(records: &[TradeRecord]) -> DatasetSummary {
    DatasetSummary {
        rows: records.len(),
        first: records.iter().map(|r| (r.year, r.month)).min(),
        last: records.iter().map(|r| (r.year, r.month)).max(),
    }
}
