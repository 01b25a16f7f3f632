// src/extract/rows.rs

use crate::extract::schema::ColumnIndexMap;
use crate::model::TradeRecord;
use crate::store::ArchiveLocation;
use calamine::{Data, Range};

/// Physical row layout of every release sheet: a title row, then the header,
/// then data.
pub const HEADER_ROW: u32 = 1;
pub const DATA_START_ROW: u32 = 2;

/// Commodity cells carrying these tokens are header echoes or missing-value
/// artifacts, not commodities.
const PLACEHOLDER_TOKENS: [&str; 3] = ["COMMODITY", "NAN", "NONE"];

fn text_of(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string().trim().to_string()),
    }
}

/// Permissive numeric coercion: anything that does not read as a number
/// becomes `None`, never an error. Fractional values truncate toward zero.
pub fn coerce_number(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => Some(*f as i64),
        Data::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

fn cell_at<'a>(range: &'a Range<Data>, row: u32, col: Option<usize>) -> Option<&'a Data> {
    // An unmapped column, or one past the sheet's physical width, simply has
    // no value for this row.
    let col = col?;
    range.get_value((row, col as u32))
}

fn string_field(range: &Range<Data>, row: u32, col: Option<usize>, default: &str) -> String {
    match cell_at(range, row, col).and_then(text_of) {
        Some(text) if !text.eq_ignore_ascii_case("nan") => text,
        _ => default.to_string(),
    }
}

fn numeric_field(range: &Range<Data>, row: u32, col: Option<usize>) -> Option<i64> {
    cell_at(range, row, col).and_then(coerce_number)
}

fn valid_commodity(range: &Range<Data>, row: u32, col: usize) -> Option<String> {
    let text = cell_at(range, row, Some(col)).and_then(text_of)?;
    if text.is_empty() {
        return None;
    }
    let upper = text.to_uppercase();
    if PLACEHOLDER_TOKENS.contains(&upper.as_str()) {
        return None;
    }
    Some(text)
}

/// Convert the data rows of one sheet into typed records.
///
/// Rows are gated on the commodity column before anything else is read;
/// `year`, `month` and `series_type` are injected from `loc` uniformly.
pub fn normalize_rows(
    range: &Range<Data>,
    columns: &ColumnIndexMap,
    loc: &ArchiveLocation,
) -> Vec<TradeRecord> {
    let Some(commodity_col) = columns.commodity else {
        return Vec::new();
    };
    let Some((end_row, _)) = range.end() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in DATA_START_ROW..=end_row {
        let Some(commodity) = valid_commodity(range, row, commodity_col) else {
            continue;
        };
        records.push(TradeRecord {
            commodity,
            country: string_field(range, row, columns.country, ""),
            port: string_field(range, row, columns.port, ""),
            year: loc.year,
            month: loc.month as i32,
            series_type: loc.series,
            quantity: numeric_field(range, row, columns.quantity),
            unit: string_field(range, row, columns.unit, "N/A"),
            inr_value: numeric_field(range, row, columns.inr_value),
            usd_value: numeric_field(range, row, columns.usd_value),
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::schema::detect_columns;
    use crate::model::SeriesType;

    fn sheet(rows: &[&[&str]]) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height.saturating_sub(1), width.saturating_sub(1)));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    range.set_value((r as u32, c as u32), Data::String(cell.to_string()));
                }
            }
        }
        range
    }

    fn location() -> ArchiveLocation {
        ArchiveLocation {
            year: 2021,
            month: 11,
            series: SeriesType::Import,
        }
    }

    fn standard_sheet(data_rows: &[&[&str]]) -> (Range<Data>, ColumnIndexMap) {
        let mut rows: Vec<&[&str]> = vec![
            &["Monthly Import Statistics"],
            &["S.No", "Commodity", "Country", "Port", "QTY", "Unit", "Value(INR)", "Value(US $)"],
        ];
        rows.extend_from_slice(data_rows);
        let range = sheet(&rows);
        let header: Vec<String> = (0..8)
            .map(|c| match range.get_value((HEADER_ROW, c)) {
                Some(Data::String(s)) => s.clone(),
                _ => String::new(),
            })
            .collect();
        let columns = detect_columns(&header);
        (range, columns)
    }

    #[test]
    fn normalizes_a_complete_row() {
        let (range, columns) = standard_sheet(&[&[
            "1", "COFFEE", "ITALY", "CHENNAI SEA", "1200", "KGS", "540000", "7200",
        ]]);
        let records = normalize_rows(&range, &columns, &location());
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.commodity, "COFFEE");
        assert_eq!(r.country, "ITALY");
        assert_eq!(r.port, "CHENNAI SEA");
        assert_eq!((r.year, r.month), (2021, 11));
        assert_eq!(r.series_type, SeriesType::Import);
        assert_eq!(r.quantity, Some(1200));
        assert_eq!(r.unit, "KGS");
        assert_eq!(r.inr_value, Some(540000));
        assert_eq!(r.usd_value, Some(7200));
    }

    #[test]
    fn drops_header_echoes_and_placeholders() {
        let (range, columns) = standard_sheet(&[
            &["", "COMMODITY", "", "", "", "", "", ""],
            &["", "nan", "", "", "", "", "", ""],
            &["", "None", "", "", "", "", "", ""],
            &["", "   ", "", "", "", "", "", ""],
            &["2", "TEA", "UK", "", "10", "KGS", "100", "2"],
        ]);
        let records = normalize_rows(&range, &columns, &location());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].commodity, "TEA");
    }

    #[test]
    fn unparseable_numbers_become_null_without_dropping_the_row() {
        let (range, columns) = standard_sheet(&[&[
            "1", "COFFEE", "ITALY", "", "n/a", "KGS", "540000", "oops",
        ]]);
        let records = normalize_rows(&range, &columns, &location());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, None);
        assert_eq!(records[0].usd_value, None);
        assert_eq!(records[0].inr_value, Some(540000));
    }

    #[test]
    fn fractional_and_stringy_numbers_truncate() {
        assert_eq!(coerce_number(&Data::Float(12.9)), Some(12));
        assert_eq!(coerce_number(&Data::String(" 34.5 ".into())), Some(34));
        assert_eq!(coerce_number(&Data::Int(7)), Some(7));
        assert_eq!(coerce_number(&Data::String("12,000".into())), None);
        assert_eq!(coerce_number(&Data::Empty), None);
    }

    #[test]
    fn unmapped_columns_fall_back_to_defaults() {
        let range = sheet(&[
            &["Title"],
            &["Commodity", "Country"],
            &["COFFEE", "ITALY"],
        ]);
        let columns = detect_columns(&["Commodity".into(), "Country".into()]);
        let records = normalize_rows(&range, &columns, &location());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].port, "");
        assert_eq!(records[0].unit, "N/A");
        assert_eq!(records[0].quantity, None);
        assert_eq!(records[0].inr_value, None);
        assert_eq!(records[0].usd_value, None);
    }

    #[test]
    fn short_rows_treat_mapped_columns_as_missing() {
        // Unit and value columns exist in the header but not in this row.
        let (range, columns) = standard_sheet(&[&["1", "COFFEE", "ITALY"]]);
        let records = normalize_rows(&range, &columns, &location());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].unit, "N/A");
        assert_eq!(records[0].usd_value, None);
    }

    #[test]
    fn nan_artifacts_normalize_to_field_defaults() {
        let (range, columns) = standard_sheet(&[&[
            "1", "COFFEE", "NaN", "nan", "5", "nan", "100", "2",
        ]]);
        let records = normalize_rows(&range, &columns, &location());
        assert_eq!(records[0].country, "");
        assert_eq!(records[0].port, "");
        assert_eq!(records[0].unit, "N/A");
    }
}
