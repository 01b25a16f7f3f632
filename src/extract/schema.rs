// src/extract/schema.rs

use tracing::trace;

/// Canonical fields that can be mapped onto header columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Commodity,
    Country,
    Port,
    Unit,
    Quantity,
    InrValue,
    UsdValue,
}

/// Fuzzy header rules, in priority order. Each predicate sees the cell text
/// trimmed and upper-cased; the first rule a cell satisfies claims it, and a
/// field keeps the first column it was ever assigned.
const HEADER_RULES: [(Field, fn(&str) -> bool); 7] = [
    (Field::Commodity, |h| h.contains("COMMODITY")),
    (Field::Country, |h| h.contains("COUNTRY")),
    (Field::Port, |h| h.contains("PORT")),
    (Field::Unit, |h| h == "UNIT"),
    (Field::Quantity, |h| h == "QTY"),
    (Field::InrValue, |h| {
        h.contains("INR") || h.contains("VALUE(INR)")
    }),
    (Field::UsdValue, |h| {
        h.contains("US $") || h.contains("USD") || h.contains("VALUE(US")
    }),
];

/// Per-sheet mapping from canonical field to zero-based column position.
/// Built once from the header row and discarded with the sheet.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ColumnIndexMap {
    pub commodity: Option<usize>,
    pub country: Option<usize>,
    pub port: Option<usize>,
    pub unit: Option<usize>,
    pub quantity: Option<usize>,
    pub inr_value: Option<usize>,
    pub usd_value: Option<usize>,
}

impl ColumnIndexMap {
    /// Without a commodity and a country column no valid record can be built
    /// from the sheet.
    pub fn has_essentials(&self) -> bool {
        self.commodity.is_some() && self.country.is_some()
    }

    fn slot(&mut self, field: Field) -> &mut Option<usize> {
        match field {
            Field::Commodity => &mut self.commodity,
            Field::Country => &mut self.country,
            Field::Port => &mut self.port,
            Field::Unit => &mut self.unit,
            Field::Quantity => &mut self.quantity,
            Field::InrValue => &mut self.inr_value,
            Field::UsdValue => &mut self.usd_value,
        }
    }
}

/// Scan a header row left to right and resolve the column mapping.
pub fn detect_columns(header: &[String]) -> ColumnIndexMap {
    let mut map = ColumnIndexMap::default();

    for (idx, cell) in header.iter().enumerate() {
        let text = cell.trim().to_uppercase();
        if text.is_empty() {
            continue;
        }
        for (field, matches) in HEADER_RULES {
            let slot = map.slot(field);
            if slot.is_none() && matches(&text) {
                trace!(?field, idx, header = %cell, "mapped column");
                *slot = Some(idx);
                break;
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn maps_typical_release_header() {
        let map = detect_columns(&header(&[
            "S.No",
            "Commodity Name",
            "Country of Destination",
            "QTY",
            "Unit",
            "Value(INR)",
            "Value(US $)",
        ]));
        assert_eq!(map.commodity, Some(1));
        assert_eq!(map.country, Some(2));
        assert_eq!(map.quantity, Some(3));
        assert_eq!(map.unit, Some(4));
        assert_eq!(map.inr_value, Some(5));
        assert_eq!(map.usd_value, Some(6));
        assert_eq!(map.port, None);
        assert!(map.has_essentials());
    }

    #[test]
    fn first_match_wins_per_field() {
        let map = detect_columns(&header(&["Commodity", "Commodity Code", "Country"]));
        assert_eq!(map.commodity, Some(0));
        assert_eq!(map.country, Some(2));
    }

    #[test]
    fn matching_is_case_insensitive_and_trims() {
        let map = detect_columns(&header(&["  commodity ", "country", " qty ", "unit"]));
        assert_eq!(map.commodity, Some(0));
        assert_eq!(map.country, Some(1));
        assert_eq!(map.quantity, Some(2));
        assert_eq!(map.unit, Some(3));
    }

    #[test]
    fn unit_and_qty_require_exact_match() {
        let map = detect_columns(&header(&["Unit Price", "QTY IN KGS"]));
        assert_eq!(map.unit, None);
        assert_eq!(map.quantity, None);
    }

    #[test]
    fn usd_matches_any_known_spelling() {
        for spelling in ["Value(US $)", "USD Value", "VALUE(US$)"] {
            let map = detect_columns(&header(&[spelling]));
            assert_eq!(map.usd_value, Some(0), "spelling: {spelling}");
        }
    }

    #[test]
    fn missing_country_fails_essentials() {
        let map = detect_columns(&header(&["Commodity", "QTY", "Unit"]));
        assert!(!map.has_essentials());
    }
}
